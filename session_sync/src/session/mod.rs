//! Session module for session_sync
//!
//! This module holds the session manager, the batch CRUD statements and the SELECT
//! builder used for counting and paging.

pub mod batch;
pub mod builder;
pub mod manager;

// Re-export key types
pub use batch::{exists_template, insert_template, update_template, StatementTemplate};
pub use builder::SelectBuilder;
pub use manager::Session;
