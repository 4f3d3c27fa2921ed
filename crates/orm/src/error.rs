//! Error types for the repository layer

use thiserror::Error;

/// Errors raised while describing entities, synthesizing statements or
/// talking to a database
#[derive(Error, Debug)]
pub enum OrmError {
    #[error("Entity {0} has no table mapping")]
    MissingTableMetadata(String),

    #[error("Entity {0} has no primary key column")]
    MissingPrimaryKey(String),

    #[error("No connection string configured")]
    ConnectionConfigurationMissing,

    #[error("Statement synthesis failed: {0}")]
    StatementSynthesis(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache error: {0}")]
    Cache(#[from] tessera_cache::CacheError),
}

impl OrmError {
    /// Configuration errors abort a call before anything reaches the database
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OrmError::MissingTableMetadata(_)
                | OrmError::MissingPrimaryKey(_)
                | OrmError::ConnectionConfigurationMissing
                | OrmError::Configuration(_)
        )
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Execution(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

pub type OrmResult<T> = Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(OrmError::MissingPrimaryKey("Invoice".into()).is_configuration());
        assert!(OrmError::ConnectionConfigurationMissing.is_configuration());
        assert!(!OrmError::Execution("deadlock".into()).is_configuration());
        assert!(!OrmError::StatementSynthesis("bad join".into()).is_configuration());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            OrmError::MissingTableMetadata("Invoice".into()).to_string(),
            "Entity Invoice has no table mapping"
        );
        let err: OrmError = serde_json::from_str::<i32>("x").unwrap_err().into();
        assert!(matches!(err, OrmError::Serialization(_)));
    }
}
