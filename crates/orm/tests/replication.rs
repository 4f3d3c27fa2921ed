use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tessera_orm::{
    ColumnSchema, Dialect, Entity, EntitySchema, FailureLog, MockProvider, ReplicaFailure, Repository,
    RepositoryConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Invoice {
    id: i64,
    number: Option<String>,
    paid: bool,
}

impl Entity for Invoice {
    fn schema() -> EntitySchema {
        EntitySchema::new()
            .table("invoice")
            .column(ColumnSchema::key("id"))
            .column(ColumnSchema::new("number").filterable())
            .column(ColumnSchema::new("paid"))
    }
}

#[derive(Default)]
struct CollectingLog {
    failures: Mutex<Vec<ReplicaFailure>>,
}

#[async_trait]
impl FailureLog for CollectingLog {
    async fn record(&self, failure: &ReplicaFailure) {
        self.failures.lock().push(failure.clone());
    }
}

const PRIMARY: &str = "mock://primary";
const REPLICA_A: &str = "mock://replica-a";
const REPLICA_B: &str = "mock://replica-b";

fn replicated_config() -> RepositoryConfig {
    RepositoryConfig::builder()
        .url(PRIMARY)
        .dialect(Dialect::Sqlite)
        .replicas([REPLICA_A, REPLICA_B])
        .build_config()
}

fn invoice(number: &str) -> Invoice {
    Invoice {
        number: Some(number.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_writes_are_repeated_on_every_replica() {
    let provider = MockProvider::new();
    let log = Arc::new(CollectingLog::default());
    let repository: Repository<Invoice> = Repository::new(replicated_config(), Arc::new(provider.clone()))
        .unwrap()
        .with_failure_log(log.clone());

    let outcome = repository.create(&invoice("INV-1"), false).await.unwrap();
    outcome.replication.unwrap().await.unwrap();

    let insert = "INSERT INTO invoice (number, paid) VALUES ('INV-1', 0)";
    for url in [PRIMARY, REPLICA_A, REPLICA_B] {
        assert_eq!(provider.executed_on(url)[0], insert);
    }
    assert!(log.failures.lock().is_empty());
}

#[tokio::test]
async fn test_replica_failure_is_logged_and_isolated() {
    let provider = MockProvider::new();
    provider.refuse(REPLICA_A);
    let log = Arc::new(CollectingLog::default());
    let repository: Repository<Invoice> = Repository::new(replicated_config(), Arc::new(provider.clone()))
        .unwrap()
        .with_failure_log(log.clone());

    let edited = Invoice {
        id: 3,
        paid: true,
        ..invoice("INV-3")
    };
    let outcome = repository.edit(&edited, None, false).await.unwrap();
    assert_eq!(outcome.affected, 1);
    outcome.replication.unwrap().await.unwrap();

    let failures = log.failures.lock().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].operation, "edit");
    assert_eq!(failures[0].target, REPLICA_A);
    assert_eq!(failures[0].content_hash.len(), 64);
    assert!(provider.executed_on(REPLICA_A).is_empty());
    assert_eq!(
        provider.executed_on(REPLICA_B),
        vec!["UPDATE invoice SET number = 'INV-3', paid = 1 WHERE invoice.id = 3"]
    );
}

#[tokio::test]
async fn test_failed_primary_write_is_not_replicated() {
    let provider = MockProvider::new();
    provider.fail_on("DELETE");
    let log = Arc::new(CollectingLog::default());
    let config = RepositoryConfig::builder()
        .url(PRIMARY)
        .dialect(Dialect::Sqlite)
        .replicas([REPLICA_A])
        .build_config();
    let repository: Repository<Invoice> = Repository::new(config, Arc::new(provider.clone()))
        .unwrap()
        .with_failure_log(log.clone());

    let created = repository.create(&invoice("INV-9"), false).await.unwrap();
    created.replication.unwrap().await.unwrap();
    assert!(log.failures.lock().is_empty());

    assert!(repository.delete(&Invoice { id: 1, ..Default::default() }, false).await.is_err());
    assert_eq!(log.failures.lock().len(), 0);
    assert_eq!(provider.executed_on(REPLICA_A).len(), 2);
}

#[tokio::test]
async fn test_failures_are_written_to_the_log_directory() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new();
    provider.refuse(REPLICA_B);
    let config = RepositoryConfig::builder()
        .url(PRIMARY)
        .dialect(Dialect::Sqlite)
        .replicas([REPLICA_B])
        .failure_log_dir(dir.path())
        .build_config();
    let repository: Repository<Invoice> = Repository::new(config, Arc::new(provider)).unwrap();

    let outcome = repository.create(&invoice("INV-7"), false).await.unwrap();
    outcome.replication.unwrap().await.unwrap();

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("create_"));
    assert!(files[0].ends_with(".log"));
}
