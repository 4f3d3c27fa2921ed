//! Database backend abstractions
//!
//! SQL text is assembled by the synthesizer; backends only carry it to a
//! database and bring rows back. The [`Dialect`] decides the few places where
//! the generated text differs between engines.

pub mod core;
pub mod mock;
pub mod session;
pub mod sqlx_any;

pub use self::core::*;
pub use mock::MockProvider;
pub use session::Session;
pub use sqlx_any::SqlxAnyProvider;

use serde::{Deserialize, Serialize};

/// SQL dialect family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    SqlServer,
    MySql,
    #[default]
    PostgreSql,
    Sqlite,
}

impl Dialect {
    /// SQL Server limits rows with `SELECT TOP n`, everyone else with a
    /// trailing `LIMIT n`
    pub fn uses_top(&self) -> bool {
        matches!(self, Dialect::SqlServer)
    }

    /// Whether the `(NOLOCK)` table hint is understood
    pub fn supports_nolock(&self) -> bool {
        matches!(self, Dialect::SqlServer)
    }

    /// Query returning the key generated by the last insert on the connection
    pub fn last_identity_query(&self) -> &'static str {
        match self {
            Dialect::SqlServer => "SELECT @@IDENTITY",
            Dialect::MySql => "SELECT LAST_INSERT_ID()",
            Dialect::PostgreSql => "SELECT lastval()",
            Dialect::Sqlite => "SELECT last_insert_rowid()",
        }
    }

    /// Guess the dialect from a connection URL scheme
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme)?;
        scheme.parse().ok()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::SqlServer => write!(f, "sqlserver"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::PostgreSql => write!(f, "postgresql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgresql" | "postgres" => Ok(Dialect::PostgreSql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(format!("Unsupported SQL dialect: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("MSSQL".parse::<Dialect>().unwrap(), Dialect::SqlServer);
        assert!("oracle".parse::<Dialect>().is_err());
        assert_eq!(Dialect::MySql.to_string(), "mysql");
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
        assert_eq!(Dialect::from_url("mysql://root@localhost/app"), Some(Dialect::MySql));
        assert_eq!(Dialect::from_url("localhost"), None);
    }

    #[test]
    fn test_dialect_capabilities() {
        assert!(Dialect::SqlServer.uses_top());
        assert!(!Dialect::Sqlite.uses_top());
        assert!(!Dialect::PostgreSql.supports_nolock());
        assert_eq!(Dialect::Sqlite.last_identity_query(), "SELECT last_insert_rowid()");
    }
}
