//! Connection provider backed by the sqlx `Any` driver
//!
//! Supports every engine compiled into sqlx (PostgreSQL, MySQL, SQLite).
//! Column values are decoded into JSON scalars; engine specific types the Any
//! driver cannot carry (native timestamps, UUIDs) should be selected as text.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::{Column, Connection as SqlxConnection, Executor, Row};
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::model::Record;

use super::{Connection, ConnectionProvider, ConnectionTarget};

/// Opens one sqlx connection per session
#[derive(Debug, Clone, Default)]
pub struct SqlxAnyProvider;

impl SqlxAnyProvider {
    pub fn new() -> Self {
        sqlx::any::install_default_drivers();
        Self
    }
}

#[async_trait]
impl ConnectionProvider for SqlxAnyProvider {
    async fn connect(&self, target: &ConnectionTarget) -> OrmResult<Box<dyn Connection>> {
        sqlx::any::install_default_drivers();
        let conn = AnyConnection::connect(&target.url)
            .await
            .map_err(|e| OrmError::Execution(format!("Failed to connect to {}: {}", target.dialect, e)))?;
        debug!(dialect = %target.dialect, "sqlx connection established");
        Ok(Box::new(SqlxAnyConnection { conn }))
    }
}

struct SqlxAnyConnection {
    conn: AnyConnection,
}

#[async_trait]
impl Connection for SqlxAnyConnection {
    async fn query(&mut self, sql: &str) -> OrmResult<Vec<Record>> {
        let rows = self.conn.fetch_all(sql).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&mut self, sql: &str) -> OrmResult<u64> {
        let result = self.conn.execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> OrmResult<()> {
        self.conn.execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> OrmResult<()> {
        self.conn.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> OrmResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn row_to_record(row: &AnyRow) -> OrmResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal()).map_err(|e| {
            OrmError::Execution(format!("Failed to decode column {}: {}", column.name(), e))
        })?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn decode_column(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return Ok(value.map(Value::Bool).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map(Value::from).unwrap_or(Value::Null));
    }
    row.try_get::<Option<String>, _>(index)
        .map(|value| value.map(Value::String).unwrap_or(Value::Null))
}
