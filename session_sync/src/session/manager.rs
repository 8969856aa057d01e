//! Session: one logical connection with reference-counted transactions
//!
//! Outside a transaction every call leases a transient connection that is closed as
//! soon as the call returns. `begin_transaction` at depth 0 opens a connection and a
//! physical transaction and holds both until the matching outermost `commit` or
//! `rollback`; nested begins only bump the depth.

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::driver::{Connection, ConnectionFactory, IsolationLevel};
use crate::db::value::{Param, ResultSet, Value};
use crate::error::Result;
use crate::schema::dialect::Dialect;
use crate::session::builder::SelectBuilder;

pub(crate) enum TransactionState {
    Idle,
    Active {
        depth: usize,
        conn: Box<dyn Connection>,
    },
}

// Result of leaving one transaction level.
enum Unwind {
    NotActive,
    Nested(usize),
    Outermost(Box<dyn Connection>),
}

/// The connection one call runs on
pub(crate) enum Lease<'s> {
    /// The open transaction's connection
    Held(&'s mut Box<dyn Connection>),
    /// Opened for this call only
    Transient(Box<dyn Connection>),
}

impl Lease<'_> {
    pub(crate) fn conn(&mut self) -> &mut dyn Connection {
        match self {
            Lease::Held(conn) => &mut ***conn,
            Lease::Transient(conn) => &mut **conn,
        }
    }

    /// Close a transient connection and hand back the call's result
    ///
    /// The call's own error wins over a close error.
    pub(crate) async fn release<T>(self, result: Result<T>) -> Result<T> {
        match self {
            Lease::Held(_) => result,
            Lease::Transient(conn) => {
                let closed = conn.close().await;
                let value = result?;
                closed?;
                Ok(value)
            }
        }
    }
}

/// A unit of work against one database
pub struct Session {
    factory: Arc<dyn ConnectionFactory>,
    pub(crate) dialect: Arc<dyn Dialect>,
    state: TransactionState,
    default_isolation: IsolationLevel,
}

impl Session {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        let dialect = factory.dialect();
        Self {
            factory,
            dialect,
            state: TransactionState::Idle,
            default_isolation: IsolationLevel::default(),
        }
    }

    /// Isolation level used by [`Session::begin`]
    pub fn with_default_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.default_isolation = isolation;
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Current nesting depth, 0 when no transaction is open
    pub fn transaction_depth(&self) -> usize {
        match &self.state {
            TransactionState::Idle => 0,
            TransactionState::Active { depth, .. } => *depth,
        }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.state, TransactionState::Active { .. })
    }

    pub(crate) async fn lease(&mut self) -> Result<Lease<'_>> {
        match &mut self.state {
            TransactionState::Active { conn, .. } => Ok(Lease::Held(conn)),
            TransactionState::Idle => Ok(Lease::Transient(self.factory.open().await?)),
        }
    }

    /// Run `callback` on a leased connection
    ///
    /// Inside a transaction the callback sees the transaction's connection; otherwise a
    /// connection is opened for it and closed afterwards, on success and error alike.
    pub async fn process<T, F>(&mut self, callback: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut dyn Connection) -> BoxFuture<'c, Result<T>>,
    {
        let mut lease = self.lease().await?;
        let result = callback(lease.conn()).await;
        lease.release(result).await
    }

    /// Begin a transaction at the default isolation level
    pub async fn begin(&mut self) -> Result<usize> {
        self.begin_transaction(self.default_isolation).await
    }

    /// Enter a transaction level, returning the new depth
    ///
    /// Only the 0 → 1 transition opens a connection and a physical transaction; the
    /// isolation level of nested calls is ignored.
    pub async fn begin_transaction(&mut self, isolation: IsolationLevel) -> Result<usize> {
        if let TransactionState::Active { depth, .. } = &mut self.state {
            *depth += 1;
            debug!(depth = *depth, "Joined open transaction");
            return Ok(*depth);
        }

        let mut conn = self.factory.open().await?;
        if let Err(e) = conn.begin(isolation).await {
            if let Err(close_err) = conn.close().await {
                warn!(error = %close_err, "Failed to close connection after BEGIN failed");
            }
            return Err(e);
        }

        debug!(%isolation, "Began transaction");
        self.state = TransactionState::Active { depth: 1, conn };
        Ok(1)
    }

    /// Leave a transaction level, returning the new depth
    ///
    /// Commits and releases the connection on 1 → 0. At depth 0 this returns 0 without
    /// touching the database.
    pub async fn commit(&mut self) -> Result<usize> {
        match self.unwind() {
            Unwind::NotActive => Ok(0),
            Unwind::Nested(depth) => Ok(depth),
            Unwind::Outermost(mut conn) => {
                let committed = conn.commit().await;
                let closed = conn.close().await;
                committed?;
                closed?;
                debug!("Committed transaction");
                Ok(0)
            }
        }
    }

    /// Leave a transaction level, rolling back on 1 → 0
    ///
    /// The connection is released whether or not the rollback succeeds. With
    /// `ignore_errors` a failed rollback is logged and swallowed.
    pub async fn rollback(&mut self, ignore_errors: bool) -> Result<usize> {
        match self.unwind() {
            Unwind::NotActive => Ok(0),
            Unwind::Nested(depth) => Ok(depth),
            Unwind::Outermost(mut conn) => {
                let rolled_back = conn.rollback().await;
                let closed = conn.close().await;
                match rolled_back.and(closed) {
                    Ok(()) => {
                        debug!("Rolled back transaction");
                        Ok(0)
                    }
                    Err(e) if ignore_errors => {
                        warn!(error = %e, "Rollback failed, ignoring");
                        Ok(0)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Run `f` inside a transaction level
    ///
    /// Commits when `f` succeeds and rolls back when it fails; the error from `f` is
    /// returned unchanged.
    pub async fn transaction<T, F>(&mut self, isolation: IsolationLevel, f: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>>,
    {
        self.begin_transaction(isolation).await?;
        match f(self).await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback(true).await?;
                Err(e)
            }
        }
    }

    fn unwind(&mut self) -> Unwind {
        match std::mem::replace(&mut self.state, TransactionState::Idle) {
            TransactionState::Idle => Unwind::NotActive,
            TransactionState::Active { depth, conn } if depth > 1 => {
                self.state = TransactionState::Active {
                    depth: depth - 1,
                    conn,
                };
                Unwind::Nested(depth - 1)
            }
            TransactionState::Active { conn, .. } => Unwind::Outermost(conn),
        }
    }

    /// Run a statement, returning the affected-row count
    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        debug!(sql, params = params.len(), "execute");
        let mut lease = self.lease().await?;
        let result = lease.conn().execute(sql, params).await;
        lease.release(result).await
    }

    /// Run a query and materialize every row
    pub async fn query(&mut self, sql: &str, params: &[Param]) -> Result<ResultSet> {
        debug!(sql, params = params.len(), "query");
        let mut lease = self.lease().await?;
        let result = lease.conn().query(sql, params).await;
        lease.release(result).await
    }

    /// First column of the first row, `Value::Null` when there is none
    pub async fn scalar(&mut self, sql: &str, params: &[Param]) -> Result<Value> {
        Ok(self.query(sql, params).await?.first_value())
    }

    /// One page of a query's rows
    pub async fn query_page(
        &mut self,
        sql: &str,
        params: &[Param],
        offset: u64,
        limit: u64,
    ) -> Result<ResultSet> {
        let paged = self.dialect.paginate(sql, offset, limit);
        self.query(&paged, params).await
    }

    /// Number of rows a query returns
    pub async fn query_count(&mut self, sql: &str, params: &[Param]) -> Result<u64> {
        let inner = sql.trim().trim_end_matches(';');
        let counted = format!("SELECT COUNT(*) FROM ({}) AS count_source", inner);
        let value = self.scalar(&counted, params).await?;
        Ok(count_value(&value))
    }

    /// Number of rows matched by a SELECT builder, ignoring its ordering and paging
    pub async fn count(&mut self, select: &SelectBuilder, params: &[Param]) -> Result<u64> {
        let sql = select.count_sql(self.dialect.as_ref());
        let value = self.scalar(&sql, params).await?;
        Ok(count_value(&value))
    }

    /// Run an INSERT and return the identity value it generated
    pub async fn insert_and_get_identity(&mut self, sql: &str, params: &[Param]) -> Result<i64> {
        debug!(sql, params = params.len(), "insert returning identity");
        let dialect = self.dialect.clone();
        let mut lease = self.lease().await?;
        let result = insert_returning_id(lease.conn(), dialect.as_ref(), sql, params).await;
        lease.release(result).await
    }

    /// Delete every row of a table
    pub async fn truncate(&mut self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", self.dialect.quote_identifier(table));
        self.execute(&sql, &[]).await
    }

    /// Release the session
    ///
    /// An open transaction is rolled back. Failures are logged, never returned, and
    /// closing twice is harmless.
    pub async fn close(&mut self) {
        let TransactionState::Active { depth, mut conn } =
            std::mem::replace(&mut self.state, TransactionState::Idle)
        else {
            return;
        };

        warn!(depth, "Closing session with an open transaction, rolling back");
        if let Err(e) = conn.rollback().await {
            warn!(error = %e, "Rollback on close failed");
        }
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close connection");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let TransactionState::Active { depth, .. } = &self.state {
            warn!(depth, "Session dropped with an open transaction, discarding connection");
        }
    }
}

async fn insert_returning_id(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    sql: &str,
    params: &[Param],
) -> Result<i64> {
    conn.execute(sql, params).await?;
    let id = conn.query(dialect.last_insert_id_sql(), &[]).await?.first_value();
    Ok(id.as_i64().unwrap_or_default())
}

fn count_value(value: &Value) -> u64 {
    value
        .as_i64()
        .map(|n| u64::try_from(n).unwrap_or_default())
        .unwrap_or_default()
}
