//! Replica fan-out
//!
//! Every primary write is repeated on each replica by a detached task. The
//! task walks the replicas one after another, opening a fresh connection per
//! replica, and reports failures to a [`FailureLog`] instead of the caller.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backends::ConnectionProvider;
use crate::config::RepositoryConfig;
use crate::gateway::{Gateway, WriteRequest};
use crate::model::EntityDescriptor;
use crate::relationships::CompositionStatus;

/// A write that could not be repeated on a replica
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaFailure {
    pub operation: String,
    pub entity: String,
    pub target: String,
    /// blake3 digest of the written record, hex encoded
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub payload: Value,
}

impl ReplicaFailure {
    pub fn new(
        descriptor: &EntityDescriptor,
        request: &WriteRequest,
        target: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let payload = Value::Object(request.record.clone());
        Self {
            operation: request.action.to_string(),
            entity: descriptor.type_name.to_string(),
            target: target.into(),
            content_hash: content_hash(&payload),
            timestamp: Utc::now(),
            error: error.into(),
            payload,
        }
    }

    /// `<operation>_<hash>_<ticks>.log`
    pub fn file_name(&self) -> String {
        let ticks = self
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| self.timestamp.timestamp_micros());
        format!("{}_{}_{}.log", self.operation, self.content_hash, ticks)
    }
}

fn content_hash(payload: &Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    hex::encode(blake3::hash(&bytes).as_bytes())
}

/// Destination for replica failures
#[async_trait]
pub trait FailureLog: Send + Sync {
    async fn record(&self, failure: &ReplicaFailure);
}

/// Reports failures as structured `error` events
#[derive(Debug, Clone, Default)]
pub struct TracingFailureLog;

#[async_trait]
impl FailureLog for TracingFailureLog {
    async fn record(&self, failure: &ReplicaFailure) {
        error!(
            operation = %failure.operation,
            entity = %failure.entity,
            replica = %failure.target,
            content_hash = %failure.content_hash,
            timestamp = %failure.timestamp,
            error = %failure.error,
            "Replica write failed"
        );
    }
}

/// Writes one JSON file per failure into a directory
#[derive(Debug, Clone)]
pub struct FileFailureLog {
    directory: PathBuf,
}

impl FileFailureLog {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }

    async fn write(&self, failure: &ReplicaFailure) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(failure.file_name());
        let contents = serde_json::to_vec_pretty(failure)?;
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

#[async_trait]
impl FailureLog for FileFailureLog {
    async fn record(&self, failure: &ReplicaFailure) {
        match self.write(failure).await {
            Ok(path) => {
                warn!(replica = %failure.target, path = %path.display(), "Replica write failed, logged to file")
            }
            Err(e) => {
                error!(error = %e, directory = %self.directory.display(), "Could not write replica failure log");
                TracingFailureLog.record(failure).await;
            }
        }
    }
}

/// Repeats primary writes on the configured replicas
#[derive(Clone)]
pub struct ReplicaFanout {
    provider: Arc<dyn ConnectionProvider>,
    config: Arc<RepositoryConfig>,
    failure_log: Arc<dyn FailureLog>,
}

impl ReplicaFanout {
    /// Failures go to a [`FileFailureLog`] when a log directory is configured,
    /// to tracing otherwise
    pub fn new(provider: Arc<dyn ConnectionProvider>, config: Arc<RepositoryConfig>) -> Self {
        let failure_log: Arc<dyn FailureLog> = match config.get_log_path() {
            Some(directory) => Arc::new(FileFailureLog::new(directory.clone())),
            None => Arc::new(TracingFailureLog),
        };
        Self {
            provider,
            config,
            failure_log,
        }
    }

    pub fn with_failure_log(mut self, failure_log: Arc<dyn FailureLog>) -> Self {
        self.failure_log = failure_log;
        self
    }

    pub fn targets(&self) -> &[String] {
        self.config.get_replica_connection_strings()
    }

    /// Launch the background task repeating `request` on every replica
    pub fn propagate(&self, descriptor: Arc<EntityDescriptor>, request: WriteRequest) -> JoinHandle<()> {
        let fanout = self.clone();
        debug!(
            entity = descriptor.type_name,
            action = %request.action,
            replicas = fanout.targets().len(),
            "Scheduling replica writes"
        );

        tokio::spawn(async move {
            for target in fanout.targets() {
                fanout.replicate(target, &descriptor, &request).await;
            }
        })
    }

    async fn replicate(&self, target: &str, descriptor: &Arc<EntityDescriptor>, request: &WriteRequest) {
        let replica = Gateway::replica(Arc::clone(&self.provider), self.config.for_replica(target));

        let failure = match replica.write(Arc::clone(descriptor), request.clone()).await {
            Ok(outcome) => match outcome.composition {
                CompositionStatus::RolledBack { error } => Some(format!("composition rolled back: {}", error)),
                _ => {
                    info!(entity = descriptor.type_name, action = %request.action, "Replica write completed");
                    None
                }
            },
            Err(e) => Some(e.to_string()),
        };

        if let Some(error) = failure {
            let failure = ReplicaFailure::new(descriptor, request, target, error);
            self.failure_log.record(&failure).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{describe, ColumnSchema, Entity, EntitySchema};
    use crate::model::record::to_record;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Parcel {
        id: i64,
        label: Option<String>,
    }

    impl Entity for Parcel {
        fn schema() -> EntitySchema {
            EntitySchema::new()
                .table("parcel")
                .column(ColumnSchema::key("id"))
                .column(ColumnSchema::new("label"))
        }
    }

    fn failure() -> ReplicaFailure {
        let descriptor = describe::<Parcel>().unwrap();
        let record = to_record(&Parcel {
            id: 0,
            label: Some("fragile".into()),
        })
        .unwrap();
        ReplicaFailure::new(&descriptor, &WriteRequest::create(record, false), "mock://replica", "refused")
    }

    #[test]
    fn test_failure_hash_is_stable() {
        let a = failure();
        let b = failure();
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
        assert_eq!(a.operation, "create");
        assert_eq!(a.entity, "Parcel");
    }

    #[test]
    fn test_failure_file_name() {
        let failure = failure();
        let name = failure.file_name();
        assert!(name.starts_with(&format!("create_{}_", failure.content_hash)));
        assert!(name.ends_with(".log"));
    }

    #[tokio::test]
    async fn test_file_failure_log_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileFailureLog::new(dir.path().join("replicas"));
        let failure = failure();

        log.record(&failure).await;

        let path = dir.path().join("replicas").join(failure.file_name());
        let contents: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(contents["target"], "mock://replica");
        assert_eq!(contents["payload"]["label"], "fragile");
    }
}
