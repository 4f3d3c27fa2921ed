//! Typed repository facade
//!
//! `Repository<T>` turns entities into records, hands them to the [`Gateway`]
//! and turns the resulting rows back into entities. Filters are partially
//! populated instances: every attribute left at its default value is ignored.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tessera_cache::ResultCache;
use tracing::{debug, warn};

use crate::backends::{ConnectionProvider, SqlxAnyProvider};
use crate::config::RepositoryConfig;
use crate::error::{OrmError, OrmResult};
use crate::gateway::{Gateway, WriteOutcome, WriteRequest};
use crate::model::record::{from_record, to_record};
use crate::model::{describe, Entity, EntityDescriptor, Record};
use crate::query::{Action, QueryOptions};
use crate::relationships::CompositionStatus;
use crate::replication::FailureLog;

pub struct Repository<T: Entity> {
    gateway: Gateway,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    /// Create a repository; fails when the entity declaration or the
    /// configuration is invalid
    pub fn new(config: RepositoryConfig, provider: Arc<dyn ConnectionProvider>) -> OrmResult<Self> {
        describe::<T>()?;
        Ok(Self {
            gateway: Gateway::new(config, provider)?,
            _entity: PhantomData,
        })
    }

    /// Repository over the sqlx `Any` driver
    pub fn connect(config: RepositoryConfig) -> OrmResult<Self> {
        Self::new(config, Arc::new(SqlxAnyProvider::new()))
    }

    /// Serve plain reads from `cache`. Ignored when the configuration turns
    /// caching off.
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.gateway = self.gateway.with_cache(cache);
        self
    }

    /// Use the process-wide result cache
    pub fn with_shared_cache(self) -> Self {
        self.with_cache(tessera_cache::shared_cache())
    }

    pub fn with_failure_log(mut self, failure_log: Arc<dyn FailureLog>) -> Self {
        self.gateway = self.gateway.with_failure_log(failure_log);
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        self.gateway.config()
    }

    pub fn descriptor(&self) -> OrmResult<Arc<EntityDescriptor>> {
        describe::<T>()
    }

    /// Base query options for this repository's dialect
    pub fn options(&self) -> QueryOptions {
        self.gateway.options()
    }

    /// First entity matching `filter` by equality
    pub async fn get(&self, filter: &T, load_composition: bool) -> OrmResult<Option<T>> {
        let descriptor = self.descriptor()?;
        let rows = self
            .gateway
            .read(&descriptor, Action::Get, &to_record(filter)?, &self.options(), load_composition)
            .await?;
        rows.into_iter().next().map(from_record).transpose()
    }

    pub async fn get_by_key(&self, key: impl Into<Value>, load_composition: bool) -> OrmResult<Option<T>> {
        let descriptor = self.descriptor()?;
        let mut filter = Record::new();
        filter.insert(descriptor.key().attribute.clone(), key.into());

        let rows = self
            .gateway
            .read(&descriptor, Action::Get, &filter, &self.options(), load_composition)
            .await?;
        rows.into_iter().next().map(from_record).transpose()
    }

    /// Every entity matching `filter`; text attributes match by substring
    pub async fn list(&self, filter: &T, load_composition: bool) -> OrmResult<Vec<T>> {
        self.list_with(filter, self.options(), load_composition).await
    }

    pub async fn list_with(&self, filter: &T, options: QueryOptions, load_composition: bool) -> OrmResult<Vec<T>> {
        let descriptor = self.descriptor()?;
        let rows = self
            .gateway
            .read(&descriptor, Action::List, &to_record(filter)?, &options, load_composition)
            .await?;
        entities(rows)
    }

    /// Entities whose filterable attributes contain `criteria`.
    ///
    /// Issues a single List where every filterable attribute carries the
    /// criteria, so the substring matches are OR-ed together.
    pub async fn search(&self, criteria: &str, options: QueryOptions, load_composition: bool) -> OrmResult<Vec<T>> {
        let descriptor = self.descriptor()?;
        let attributes = descriptor.filterable_attributes();
        if attributes.is_empty() {
            return Err(OrmError::Configuration(format!(
                "{} declares no filterable attributes",
                descriptor.type_name
            )));
        }

        let filter: Record = attributes
            .into_iter()
            .map(|attribute| (attribute.to_string(), Value::String(criteria.to_string())))
            .collect();
        debug!(entity = descriptor.type_name, criteria, "Searching filterable attributes");

        let rows = self
            .gateway
            .read(&descriptor, Action::List, &filter, &options, load_composition)
            .await?;
        entities(rows)
    }

    pub async fn count(&self, filter: &T) -> OrmResult<i64> {
        let descriptor = self.descriptor()?;
        self.gateway
            .scalar(&descriptor, Action::Count, &to_record(filter)?, &self.options())
            .await
    }

    /// Highest key among the entities matching `filter`, 0 when none match
    pub async fn max_key(&self, filter: &T) -> OrmResult<i64> {
        let descriptor = self.descriptor()?;
        self.gateway
            .scalar(&descriptor, Action::Max, &to_record(filter)?, &self.options())
            .await
    }

    /// Insert `entity`, and its recordable relations when `compose` is set
    pub async fn create(&self, entity: &T, compose: bool) -> OrmResult<WriteOutcome> {
        let descriptor = self.descriptor()?;
        self.gateway
            .write(descriptor, WriteRequest::create(to_record(entity)?, compose))
            .await
    }

    /// Insert every entity inside one transaction.
    ///
    /// The first failure rolls the whole batch back and is returned.
    pub async fn create_range(&self, entities: &[T], compose: bool) -> OrmResult<Vec<WriteOutcome>> {
        let owns_transaction = !self.gateway.in_transaction().await;
        if owns_transaction {
            self.gateway.begin().await?;
        }

        let mut outcomes = Vec::with_capacity(entities.len());
        for entity in entities {
            let result = match self.create(entity, compose).await {
                Ok(outcome) => match &outcome.composition {
                    CompositionStatus::RolledBack { error } => {
                        Err(OrmError::Transaction(format!("composition rolled back: {}", error)))
                    }
                    _ => Ok(outcome),
                },
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if owns_transaction && self.gateway.in_transaction().await {
                        if let Err(rollback) = self.gateway.rollback().await {
                            warn!(error = %rollback, "Failed to roll back batch insert");
                        }
                    }
                    return Err(e);
                }
            }
        }

        if owns_transaction {
            self.gateway.commit().await?;
        }
        Ok(outcomes)
    }

    /// Update the entity identified by `filter`, or by the key of `entity`
    /// when no filter is given
    pub async fn edit(&self, entity: &T, filter: Option<&T>, compose: bool) -> OrmResult<WriteOutcome> {
        let descriptor = self.descriptor()?;
        let filter = filter.map(to_record).transpose()?;
        self.gateway
            .write(descriptor, WriteRequest::edit(to_record(entity)?, filter, compose))
            .await
    }

    /// Delete every entity matching `filter`.
    ///
    /// With `compose` set, the relations carried by `filter` are written
    /// back the same way a composed create or edit writes them.
    pub async fn delete(&self, filter: &T, compose: bool) -> OrmResult<WriteOutcome> {
        let descriptor = self.descriptor()?;
        self.gateway
            .write(descriptor, WriteRequest::delete(to_record(filter)?, compose))
            .await
    }

    /// Start a transaction spanning the following calls until commit or rollback
    pub async fn begin(&self) -> OrmResult<()> {
        self.gateway.begin().await
    }

    pub async fn commit(&self) -> OrmResult<()> {
        self.gateway.commit().await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        self.gateway.rollback().await
    }

    pub async fn in_transaction(&self) -> bool {
        self.gateway.in_transaction().await
    }

    /// Release the held connection
    pub async fn close(&self) -> OrmResult<()> {
        self.gateway.close().await
    }
}

impl WriteOutcome {
    /// The written record as an entity
    pub fn entity<T: Entity>(&self) -> OrmResult<T> {
        from_record(self.record.clone())
    }
}

fn entities<T: Entity>(rows: Vec<Record>) -> OrmResult<Vec<T>> {
    rows.into_iter().map(from_record).collect()
}
