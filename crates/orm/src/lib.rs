//! # tessera-orm: metadata-driven entity repository
//!
//! Entities declare their table mapping once through [`EntitySchema`]. From
//! that declaration the repository synthesizes SQL for every CRUD operation,
//! loads and writes one level of related entities, keeps a result cache
//! coherent and repeats writes on replica databases in the background.
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use tessera_orm::{ColumnSchema, Entity, EntitySchema, Repository, RepositoryConfig};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Customer {
//!     id: i64,
//!     name: Option<String>,
//! }
//!
//! impl Entity for Customer {
//!     fn schema() -> EntitySchema {
//!         EntitySchema::new()
//!             .table("customer")
//!             .column(ColumnSchema::key("id"))
//!             .column(ColumnSchema::new("name").filterable())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let config = RepositoryConfig::from_env().unwrap();
//! let repository = Repository::<Customer>::connect(config).unwrap();
//!
//! let created = repository
//!     .create(&Customer { name: Some("ada".into()), ..Default::default() }, false)
//!     .await
//!     .unwrap();
//! let found = repository.get_by_key(created.key.unwrap_or_default(), false).await.unwrap();
//! assert!(found.is_some());
//! # });
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod model;
pub mod query;
pub mod relationships;
pub mod replication;
pub mod repository;

pub use backends::{Connection, ConnectionProvider, ConnectionTarget, Dialect, MockProvider, Session, SqlxAnyProvider};
pub use config::*;
pub use error::*;
pub use gateway::{Gateway, WriteOutcome, WriteRequest};
pub use model::*;
pub use query::{Action, OrderDirection, QueryOptions};
pub use relationships::CompositionStatus;
pub use replication::{FailureLog, FileFailureLog, ReplicaFailure, ReplicaFanout, TracingFailureLog};
pub use repository::Repository;

pub use tessera_cache::{CacheConfig, CacheKey, CacheStats, ResultCache};
