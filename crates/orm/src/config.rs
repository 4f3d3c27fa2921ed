//! Repository configuration and builder

use std::path::PathBuf;

use service_builder::builder;

use crate::backends::{ConnectionTarget, Dialect};
use crate::error::{OrmError, OrmResult};

pub const ENV_DATABASE_URL: &str = "TESSERA_DATABASE_URL";
pub const ENV_DIALECT: &str = "TESSERA_DIALECT";
pub const ENV_REPLICA_URLS: &str = "TESSERA_REPLICA_URLS";
pub const ENV_LOG_PATH: &str = "TESSERA_LOG_PATH";

/// Settings shared by every call a repository makes
#[derive(Debug, Clone)]
#[builder]
pub struct RepositoryConfig {
    /// Primary database URL
    #[builder(getter, default = "String::new()")]
    pub connection_string: String,

    #[builder(getter, default = "Dialect::PostgreSql")]
    pub dialect: Dialect,

    /// Secondary databases receiving a copy of every write
    #[builder(getter, default = "Vec::new()")]
    pub replica_connection_strings: Vec<String>,

    /// Directory receiving one file per failed replica write
    #[builder(getter, default = "None")]
    pub log_path: Option<PathBuf>,

    /// Reuse one connection across calls instead of reconnecting each time
    #[builder(getter, default = "false")]
    pub keep_connected: bool,

    /// Default for the read-uncommitted table hint on reads
    #[builder(getter, default = "false")]
    pub read_uncommitted: bool,

    /// Serve plain reads of cacheable entities from the result cache
    #[builder(getter, default = "true")]
    pub use_cache: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            dialect: Dialect::PostgreSql,
            replica_connection_strings: Vec::new(),
            log_path: None,
            keep_connected: false,
            read_uncommitted: false,
            use_cache: true,
        }
    }
}

impl RepositoryConfig {
    /// Read configuration from `TESSERA_*` environment variables.
    ///
    /// The dialect defaults to the one implied by the URL scheme.
    pub fn from_env() -> OrmResult<Self> {
        let connection_string =
            std::env::var(ENV_DATABASE_URL).map_err(|_| OrmError::ConnectionConfigurationMissing)?;

        let dialect = match std::env::var(ENV_DIALECT) {
            Ok(name) => name.parse::<Dialect>().map_err(OrmError::Configuration)?,
            Err(_) => Dialect::from_url(&connection_string).unwrap_or_default(),
        };

        let replica_connection_strings = std::env::var(ENV_REPLICA_URLS)
            .map(|urls| split_urls(&urls))
            .unwrap_or_default();

        let config = Self {
            connection_string,
            dialect,
            replica_connection_strings,
            log_path: std::env::var(ENV_LOG_PATH).ok().map(PathBuf::from),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(OrmError::ConnectionConfigurationMissing);
        }
        if self.replica_connection_strings.iter().any(|url| url.trim().is_empty()) {
            return Err(OrmError::Configuration("replica connection string is empty".to_string()));
        }
        Ok(())
    }

    pub fn primary_target(&self) -> ConnectionTarget {
        ConnectionTarget::new(self.connection_string.clone(), self.dialect)
    }

    pub fn replica_targets(&self) -> Vec<ConnectionTarget> {
        self.replica_connection_strings
            .iter()
            .map(|url| ConnectionTarget::new(url.clone(), self.dialect))
            .collect()
    }

    /// Configuration used by the repository that repeats a write on `url`
    pub fn for_replica(&self, url: &str) -> Self {
        Self {
            connection_string: url.to_string(),
            replica_connection_strings: Vec::new(),
            keep_connected: false,
            use_cache: false,
            ..self.clone()
        }
    }
}

impl RepositoryConfigBuilder {
    pub fn url(self, url: impl Into<String>) -> Self {
        self.connection_string(url.into())
    }

    pub fn replicas<I, S>(self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replica_connection_strings(urls.into_iter().map(Into::into).collect())
    }

    pub fn failure_log_dir(self, path: impl Into<PathBuf>) -> Self {
        self.log_path(Some(path.into()))
    }

    pub fn build_config(self) -> RepositoryConfig {
        self.build_with_defaults().unwrap_or_default()
    }
}

fn split_urls(urls: &str) -> Vec<String> {
    urls.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RepositoryConfig::builder()
            .url("sqlite::memory:")
            .dialect(Dialect::Sqlite)
            .replicas(["sqlite://replica-a.db", "sqlite://replica-b.db"])
            .keep_connected(true)
            .build_config();

        assert_eq!(config.get_connection_string(), "sqlite::memory:");
        assert_eq!(*config.get_dialect(), Dialect::Sqlite);
        assert_eq!(config.replica_targets().len(), 2);
        assert!(*config.get_keep_connected());
        assert!(*config.get_use_cache());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_connection_string() {
        let config = RepositoryConfig::default();
        assert!(matches!(config.validate(), Err(OrmError::ConnectionConfigurationMissing)));

        let config = RepositoryConfig::builder()
            .url("sqlite::memory:")
            .replicas([" "])
            .build_config();
        assert!(matches!(config.validate(), Err(OrmError::Configuration(_))));
    }

    #[test]
    fn test_replica_config_never_fans_out() {
        let config = RepositoryConfig::builder()
            .url("mysql://primary/app")
            .dialect(Dialect::MySql)
            .replicas(["mysql://replica/app"])
            .keep_connected(true)
            .build_config();

        let replica = config.for_replica("mysql://replica/app");
        assert_eq!(replica.connection_string, "mysql://replica/app");
        assert!(replica.replica_connection_strings.is_empty());
        assert!(!replica.keep_connected);
        assert!(!replica.use_cache);
        assert_eq!(replica.dialect, Dialect::MySql);
    }

    #[test]
    fn test_split_urls() {
        assert_eq!(split_urls("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_urls("").is_empty());
    }
}
