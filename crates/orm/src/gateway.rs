//! Record-level repository engine
//!
//! The gateway owns everything a typed repository shares across calls: the
//! connection provider, the held session (keep-connected mode or an open
//! transaction), the result cache and the replica fan-out. It works on
//! [`Record`]s so replica tasks can drive it without knowing the entity type.

use std::sync::Arc;

use serde_json::Value;
use tessera_cache::{CacheKey, ResultCache};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backends::{ConnectionProvider, Session};
use crate::config::RepositoryConfig;
use crate::error::{OrmError, OrmResult};
use crate::executor::{fetch, scalar};
use crate::model::{EntityDescriptor, Record};
use crate::query::{restricts, synthesize, Action, QueryOptions};
use crate::relationships::{fill_composition, parse_composition, persist_composition, CompositionStatus};
use crate::replication::{FailureLog, ReplicaFanout};

/// A Create, Edit or Delete to run against one database
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub action: Action,
    /// Values written by Create and Edit; the predicate source for Delete
    pub record: Record,
    /// Explicit predicate for Edit and Delete
    pub filter: Option<Record>,
    /// Persist the recordable relations carried by `record`
    pub compose: bool,
}

impl WriteRequest {
    pub fn create(record: Record, compose: bool) -> Self {
        Self {
            action: Action::Create,
            record,
            filter: None,
            compose,
        }
    }

    pub fn edit(record: Record, filter: Option<Record>, compose: bool) -> Self {
        Self {
            action: Action::Edit,
            record,
            filter,
            compose,
        }
    }

    pub fn delete(record: Record, compose: bool) -> Self {
        Self {
            action: Action::Delete,
            record,
            filter: None,
            compose,
        }
    }
}

/// Result of a primary write
#[derive(Debug)]
pub struct WriteOutcome {
    pub action: Action,
    /// Generated key on Create, the targeted key on Edit and Delete when known
    pub key: Option<Value>,
    /// Rows touched by the primary statement
    pub affected: i64,
    pub composition: CompositionStatus,
    /// The written record, with its generated key on Create
    pub record: Record,
    /// Background task repeating the write on the replicas
    pub replication: Option<JoinHandle<()>>,
}

pub struct Gateway {
    provider: Arc<dyn ConnectionProvider>,
    config: Arc<RepositoryConfig>,
    cache: Option<Arc<ResultCache>>,
    fanout: Option<ReplicaFanout>,
    held: Mutex<Option<Session>>,
}

impl Gateway {
    /// Gateway for the primary database. Replica fan-out is enabled when the
    /// configuration lists replica connection strings.
    pub fn new(config: RepositoryConfig, provider: Arc<dyn ConnectionProvider>) -> OrmResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let fanout = if config.get_replica_connection_strings().is_empty() {
            None
        } else {
            Some(ReplicaFanout::new(Arc::clone(&provider), Arc::clone(&config)))
        };

        Ok(Self {
            provider,
            config,
            cache: None,
            fanout,
            held: Mutex::new(None),
        })
    }

    /// Gateway repeating a write on one replica: no cache, no further fan-out
    pub fn replica(provider: Arc<dyn ConnectionProvider>, config: RepositoryConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            cache: None,
            fanout: None,
            held: Mutex::new(None),
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        if *self.config.get_use_cache() {
            self.cache = Some(cache);
        }
        self
    }

    pub fn with_failure_log(mut self, failure_log: Arc<dyn FailureLog>) -> Self {
        self.fanout = self.fanout.map(|fanout| fanout.with_failure_log(failure_log));
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Options carrying the configured dialect and read hint
    pub fn options(&self) -> QueryOptions {
        QueryOptions::new(*self.config.get_dialect()).with_read_uncommitted(*self.config.get_read_uncommitted())
    }

    /// Run a Get or List, serving it from the cache when possible
    pub async fn read(
        &self,
        descriptor: &EntityDescriptor,
        action: Action,
        filter: &Record,
        options: &QueryOptions,
        load_composition: bool,
    ) -> OrmResult<Vec<Record>> {
        let cache_key = self.cache_key(descriptor, action, filter, options, load_composition)?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(cached) = cache.get(key) {
                debug!(entity = descriptor.type_name, %action, "Served from result cache");
                return Ok(records_of(cached));
            }
        }

        let mut guard = self.held.lock().await;
        let mut session = self.checkout(&mut guard).await?;
        let result = Self::read_rows(&mut session, descriptor, action, filter, options, load_composition).await;
        self.checkin(&mut guard, session).await;
        let rows = result?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            let value = match action {
                Action::Get => rows.first().cloned().map(Value::Object),
                _ => Some(Value::Array(rows.iter().cloned().map(Value::Object).collect())),
            };
            if let Some(value) = value {
                cache.put(key, value, Some(descriptor.key().attribute.as_str()));
            }
        }

        Ok(rows)
    }

    /// Run a Count or Max
    pub async fn scalar(
        &self,
        descriptor: &EntityDescriptor,
        action: Action,
        filter: &Record,
        options: &QueryOptions,
    ) -> OrmResult<i64> {
        let mut guard = self.held.lock().await;
        let mut session = self.checkout(&mut guard).await?;
        let result = scalar(&mut session, descriptor, action, filter, options).await;
        self.checkin(&mut guard, session).await;
        result
    }

    /// Run a write, then its composition, cache invalidation and replica
    /// fan-out, in that order
    pub async fn write(&self, descriptor: Arc<EntityDescriptor>, request: WriteRequest) -> OrmResult<WriteOutcome> {
        let options = self.options();

        let mut guard = self.held.lock().await;
        let mut session = self.checkout(&mut guard).await?;
        let result = Self::apply(&mut session, &descriptor, &request, &options).await;
        self.checkin(&mut guard, session).await;
        drop(guard);
        let mut outcome = result?;

        self.invalidate(&descriptor, &request, &outcome.record);

        if let Some(fanout) = &self.fanout {
            outcome.replication = Some(fanout.propagate(Arc::clone(&descriptor), request));
        }

        info!(
            entity = descriptor.type_name,
            action = %outcome.action,
            affected = outcome.affected,
            "Write completed"
        );
        Ok(outcome)
    }

    pub async fn begin(&self) -> OrmResult<()> {
        let mut guard = self.held.lock().await;
        let mut session = self.checkout(&mut guard).await?;
        let result = session.begin().await;
        self.checkin(&mut guard, session).await;
        result
    }

    pub async fn commit(&self) -> OrmResult<()> {
        let mut guard = self.held.lock().await;
        let mut session = guard
            .take()
            .ok_or_else(|| OrmError::Transaction("no active transaction to commit".to_string()))?;
        let result = session.commit().await;
        self.checkin(&mut guard, session).await;
        result
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        let mut guard = self.held.lock().await;
        let mut session = guard
            .take()
            .ok_or_else(|| OrmError::Transaction("no active transaction to roll back".to_string()))?;
        let result = session.rollback().await;
        self.checkin(&mut guard, session).await;
        result
    }

    pub async fn in_transaction(&self) -> bool {
        self.held
            .lock()
            .await
            .as_ref()
            .is_some_and(Session::in_transaction)
    }

    /// Close the held session, rolling back a transaction left open
    pub async fn close(&self) -> OrmResult<()> {
        match self.held.lock().await.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    async fn read_rows(
        session: &mut Session,
        descriptor: &EntityDescriptor,
        action: Action,
        filter: &Record,
        options: &QueryOptions,
        load_composition: bool,
    ) -> OrmResult<Vec<Record>> {
        let mut rows = fetch(session, descriptor, action, filter, options).await?;
        if action == Action::Get {
            rows.truncate(1);
        }

        if load_composition && !descriptor.relations.is_empty() {
            let related_options = options.plain();
            for row in &mut rows {
                fill_composition(session, descriptor, row, &related_options).await?;
            }
        }
        Ok(rows)
    }

    async fn apply(
        session: &mut Session,
        descriptor: &EntityDescriptor,
        request: &WriteRequest,
        options: &QueryOptions,
    ) -> OrmResult<WriteOutcome> {
        let mut record = request.record.clone();
        let key_attribute = descriptor.key().attribute.clone();

        let (key, affected) = match request.action {
            Action::Create => {
                let sql = synthesize(descriptor, Action::Create, &record, None, options)?;
                let generated = session.execute_command(&sql).await?;
                record.insert(key_attribute.clone(), Value::from(generated));
                (Some(Value::from(generated)), 1)
            }
            Action::Edit => {
                let filter = match &request.filter {
                    Some(filter) => filter.clone(),
                    None => descriptor.key_filter(&record),
                };
                ensure_restricted(descriptor, Action::Edit, &filter)?;

                let sql = synthesize(descriptor, Action::Edit, &record, Some(&filter), options)?;
                let affected = session.execute_command(&sql).await?;
                let key = descriptor
                    .key_value(&filter)
                    .or_else(|| descriptor.key_value(&record))
                    .cloned();
                if let Some(key) = &key {
                    record.insert(key_attribute.clone(), key.clone());
                }
                (key, affected)
            }
            Action::Delete => {
                let filter = request.filter.as_ref().unwrap_or(&record);
                ensure_restricted(descriptor, Action::Delete, filter)?;

                let sql = synthesize(descriptor, Action::Delete, &record, Some(filter), options)?;
                let affected = session.execute_command(&sql).await?;
                (descriptor.key_value(filter).cloned(), affected)
            }
            action => {
                return Err(OrmError::StatementSynthesis(format!(
                    "{} is not a write action",
                    action
                )))
            }
        };

        let composition = if request.compose {
            match parse_composition(session, descriptor, &record, request.action, request.filter.as_ref(), options).await
            {
                Ok(statements) => persist_composition(session, &statements).await,
                Err(e) => {
                    warn!(entity = descriptor.type_name, error = %e, "Composition planning failed");
                    CompositionStatus::RolledBack { error: e.to_string() }
                }
            }
        } else {
            CompositionStatus::Skipped
        };

        Ok(WriteOutcome {
            action: request.action,
            key,
            affected,
            composition,
            record,
            replication: None,
        })
    }

    fn invalidate(&self, descriptor: &EntityDescriptor, request: &WriteRequest, written: &Record) {
        let cache = match &self.cache {
            Some(cache) if descriptor.cacheable => cache,
            _ => return,
        };

        match request.action {
            Action::Edit => {
                let filter = request.filter.as_ref().unwrap_or(&request.record);
                if descriptor.key_value(filter).is_none() {
                    let purged = cache.purge(descriptor.type_id);
                    debug!(entity = descriptor.type_name, purged, "Edit without key, purged cached results");
                    return;
                }
                for action in [Action::Get, Action::List] {
                    if let Ok(key) = fingerprint(descriptor, action, filter) {
                        cache.del(&key, false);
                    }
                }
                let refreshed = cache.refresh(
                    descriptor.type_id,
                    &descriptor.key().attribute,
                    &Value::Object(written.clone()),
                );
                debug!(entity = descriptor.type_name, refreshed, "Propagated edit into cache");
            }
            _ => {
                let purged = cache.purge(descriptor.type_id);
                debug!(entity = descriptor.type_name, purged, "Purged cached results");
            }
        }
    }

    fn cache_key(
        &self,
        descriptor: &EntityDescriptor,
        action: Action,
        filter: &Record,
        options: &QueryOptions,
        load_composition: bool,
    ) -> OrmResult<Option<CacheKey>> {
        if self.cache.is_none() || !descriptor.cacheable || load_composition || !options.is_plain() {
            return Ok(None);
        }
        Ok(Some(fingerprint(descriptor, action, filter)?))
    }

    async fn checkout(&self, held: &mut MutexGuard<'_, Option<Session>>) -> OrmResult<Session> {
        match held.take() {
            Some(session) => Ok(session),
            None => Session::open(self.provider.as_ref(), &self.config.primary_target()).await,
        }
    }

    /// Keep the session for the next call when connected mode is on or a
    /// transaction is open; close it otherwise
    async fn checkin(&self, held: &mut MutexGuard<'_, Option<Session>>, session: Session) {
        if *self.config.get_keep_connected() || session.in_transaction() {
            **held = Some(session);
            return;
        }
        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close database session");
        }
    }
}

fn fingerprint(descriptor: &EntityDescriptor, action: Action, filter: &Record) -> OrmResult<CacheKey> {
    Ok(CacheKey::for_filter(descriptor.type_id, &(action.to_string(), filter))?)
}

fn ensure_restricted(descriptor: &EntityDescriptor, action: Action, filter: &Record) -> OrmResult<()> {
    if restricts(descriptor, action, filter) {
        return Ok(());
    }
    Err(OrmError::StatementSynthesis(format!(
        "{} on {} needs a key or filter value",
        action, descriptor.type_name
    )))
}

fn records_of(value: Value) -> Vec<Record> {
    match value {
        Value::Object(record) => vec![record],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_of_accepts_single_and_many() {
        assert_eq!(records_of(json!({"id": 1})).len(), 1);
        assert_eq!(records_of(json!([{"id": 1}, {"id": 2}, 3])).len(), 2);
        assert!(records_of(json!(null)).is_empty());
    }

    #[test]
    fn test_write_request_constructors() {
        let mut record = Record::new();
        record.insert("id".to_string(), json!(4));

        let delete = WriteRequest::delete(record.clone(), false);
        assert_eq!(delete.action, Action::Delete);
        assert!(!delete.compose);
        assert!(WriteRequest::delete(record.clone(), true).compose);

        let edit = WriteRequest::edit(record.clone(), Some(record), true);
        assert_eq!(edit.action, Action::Edit);
        assert!(edit.filter.is_some());
    }
}
