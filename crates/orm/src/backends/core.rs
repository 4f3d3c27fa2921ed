//! Connection traits implemented by database drivers

use async_trait::async_trait;

use crate::error::OrmResult;
use crate::model::Record;

use super::Dialect;

/// Where a connection points: URL plus the dialect statements are written in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub url: String,
    pub dialect: Dialect,
}

impl ConnectionTarget {
    pub fn new(url: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            url: url.into(),
            dialect,
        }
    }
}

/// Opens connections to a target
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self, target: &ConnectionTarget) -> OrmResult<Box<dyn Connection>>;
}

/// A single open database connection
///
/// Rows come back as records keyed by the column label the statement chose,
/// which is the attribute name for every column the synthesizer selects.
#[async_trait]
pub trait Connection: Send {
    async fn query(&mut self, sql: &str) -> OrmResult<Vec<Record>>;

    /// Run a statement and return the number of affected rows
    async fn execute(&mut self, sql: &str) -> OrmResult<u64>;

    async fn begin(&mut self) -> OrmResult<()>;

    async fn commit(&mut self) -> OrmResult<()>;

    async fn rollback(&mut self) -> OrmResult<()>;

    async fn close(self: Box<Self>) -> OrmResult<()>;
}
