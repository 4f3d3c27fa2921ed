//! Connection session with transaction bookkeeping

use serde_json::Value;
use tracing::debug;

use crate::error::{OrmError, OrmResult};
use crate::model::Record;

use super::{Connection, ConnectionProvider, ConnectionTarget, Dialect};

/// An open connection plus the state a repository call needs around it
pub struct Session {
    connection: Box<dyn Connection>,
    dialect: Dialect,
    in_transaction: bool,
}

impl Session {
    /// Connect to `target`; an empty URL is a configuration error
    pub async fn open(provider: &dyn ConnectionProvider, target: &ConnectionTarget) -> OrmResult<Self> {
        if target.url.trim().is_empty() {
            return Err(OrmError::ConnectionConfigurationMissing);
        }
        let connection = provider.connect(target).await?;
        debug!(dialect = %target.dialect, "Opened database session");
        Ok(Self::new(connection, target.dialect))
    }

    pub fn new(connection: Box<dyn Connection>, dialect: Dialect) -> Self {
        Self {
            connection,
            dialect,
            in_transaction: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub async fn query(&mut self, sql: &str) -> OrmResult<Vec<Record>> {
        debug!(sql, "Executing query");
        self.connection.query(sql).await
    }

    /// Run a write statement.
    ///
    /// Inserts return the key generated by the database; every other
    /// statement returns its affected row count.
    pub async fn execute_command(&mut self, sql: &str) -> OrmResult<i64> {
        debug!(sql, "Executing command");
        let affected = self.connection.execute(sql).await?;

        if !is_insert(sql) {
            return Ok(affected as i64);
        }

        let rows = self.connection.query(self.dialect.last_identity_query()).await?;
        let identity = rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(identity_value)
            .ok_or_else(|| OrmError::Execution("insert did not report a generated key".to_string()))?;

        debug!(identity, "Insert generated key");
        Ok(identity)
    }

    pub async fn begin(&mut self) -> OrmResult<()> {
        if self.in_transaction {
            return Err(OrmError::Transaction("transaction already active".to_string()));
        }
        self.connection.begin().await?;
        self.in_transaction = true;
        debug!("Transaction started");
        Ok(())
    }

    pub async fn commit(&mut self) -> OrmResult<()> {
        if !self.in_transaction {
            return Err(OrmError::Transaction("no active transaction to commit".to_string()));
        }
        self.in_transaction = false;
        self.connection
            .commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to commit transaction: {}", e)))?;
        debug!("Transaction committed");
        Ok(())
    }

    pub async fn rollback(&mut self) -> OrmResult<()> {
        if !self.in_transaction {
            return Err(OrmError::Transaction("no active transaction to roll back".to_string()));
        }
        self.in_transaction = false;
        self.connection
            .rollback()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to rollback transaction: {}", e)))?;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Close the connection, rolling back a transaction left open
    pub async fn close(mut self) -> OrmResult<()> {
        if self.in_transaction {
            self.rollback().await?;
        }
        self.connection.close().await
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}

fn identity_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
