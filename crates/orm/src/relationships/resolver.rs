//! One-level relation loading and composed-write planning

use serde_json::Value;
use tracing::{debug, warn};

use crate::backends::Session;
use crate::error::{OrmError, OrmResult};
use crate::executor::{fetch, fetch_one};
use crate::model::record::is_unset;
use crate::model::{Cardinality, EntityDescriptor, Intermediary, Record, RelationDescriptor};
use crate::query::{persistence_action, synthesize, Action, QueryOptions};

/// Outcome of persisting the relations of a written entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionStatus {
    /// Composition was not requested or produced no statements
    Skipped,
    /// Every statement ran inside one committed transaction
    Committed { statements: usize },
    /// Composition failed and its transaction was rolled back. The primary
    /// write is not affected.
    RolledBack { error: String },
}

impl CompositionStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, CompositionStatus::Committed { .. })
    }
}

/// Load every declared relation of `record` in place.
///
/// Related entities are loaded without their own relations.
pub async fn fill_composition(
    session: &mut Session,
    descriptor: &EntityDescriptor,
    record: &mut Record,
    options: &QueryOptions,
) -> OrmResult<()> {
    for relation in &descriptor.relations {
        let target = relation.target.describe()?;

        match relation.cardinality {
            Cardinality::OneToOne => {
                let foreign_key = match record.get(&relation.foreign_key_attribute) {
                    Some(value) if !is_unset(value) => value.clone(),
                    _ => continue,
                };
                let mut filter = Record::new();
                filter.insert(target.key().attribute.clone(), foreign_key);

                if let Some(found) = fetch_one(session, &target, &filter, options).await? {
                    record.insert(relation.attribute.clone(), Value::Object(found));
                }
            }
            Cardinality::OneToMany => {
                let children = match descriptor.key_value(record).cloned() {
                    Some(owner_key) => {
                        let mut filter = Record::new();
                        filter.insert(relation.foreign_key_attribute.clone(), owner_key);
                        fetch(session, &target, Action::List, &filter, options).await?
                    }
                    None => Vec::new(),
                };
                record.insert(
                    relation.attribute.clone(),
                    Value::Array(children.into_iter().map(Value::Object).collect()),
                );
            }
            Cardinality::ManyToMany => {
                let intermediary = intermediary_of(relation)?;
                let link_descriptor = intermediary.entity.describe()?;
                let link_foreign_key = link_foreign_key(&link_descriptor)?;

                let mut related = Vec::new();
                if let Some(owner_key) = descriptor.key_value(record).cloned() {
                    let mut filter = Record::new();
                    filter.insert(link_foreign_key, owner_key);
                    let links = fetch(session, &link_descriptor, Action::List, &filter, options).await?;

                    for link in links {
                        let far_key = match link.get(intermediary.key_attribute) {
                            Some(value) if !is_unset(value) => value.clone(),
                            _ => continue,
                        };
                        let mut filter = Record::new();
                        filter.insert(target.key().attribute.clone(), far_key);
                        if let Some(found) = fetch_one(session, &target, &filter, options).await? {
                            related.push(Value::Object(found));
                        }
                    }
                }
                record.insert(relation.attribute.clone(), Value::Array(related));
            }
        }
    }

    Ok(())
}

/// Statements persisting the recordable relations of `record`.
///
/// Children with an unset key are inserted, the others updated by key. The
/// owner key comes from `filter` on edits and from `record` otherwise, and is
/// copied into each child's foreign key column. Many-to-many items are written
/// as intermediary rows, reusing an existing row when one already links both
/// ends. When any statement is an insert the whole list is reversed.
pub async fn parse_composition(
    session: &mut Session,
    descriptor: &EntityDescriptor,
    record: &Record,
    action: Action,
    filter: Option<&Record>,
    options: &QueryOptions,
) -> OrmResult<Vec<String>> {
    let parent = match (action, filter) {
        (Action::Edit, Some(filter)) => filter,
        _ => record,
    };
    let owner_key = descriptor
        .key_value(parent)
        .or_else(|| descriptor.key_value(record))
        .cloned();

    let mut statements = Vec::new();

    for relation in descriptor.relations.iter().filter(|relation| relation.recordable) {
        let value = match record.get(&relation.attribute) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        let target = relation.target.describe()?;

        match (relation.cardinality, value) {
            (Cardinality::ManyToMany, Value::Array(items)) => {
                let intermediary = intermediary_of(relation)?;
                let link_descriptor = intermediary.entity.describe()?;

                for item in items.iter().filter_map(Value::as_object) {
                    let mut link = link_descriptor.new_record();
                    link.insert(
                        intermediary.key_attribute.to_string(),
                        target.key_value(item).cloned().unwrap_or(Value::Null),
                    );
                    assign_foreign_key(&link_descriptor, &mut link, owner_key.as_ref());

                    if let Some(existing) = fetch_one(session, &link_descriptor, &link, &options.plain()).await? {
                        link = existing;
                    }
                    statements.push(child_statement(&link_descriptor, &link, options)?);
                }
            }
            (_, Value::Array(items)) => {
                for item in items.iter().filter_map(Value::as_object) {
                    let mut child = item.clone();
                    assign_foreign_key(&target, &mut child, owner_key.as_ref());
                    statements.push(child_statement(&target, &child, options)?);
                }
            }
            (_, Value::Object(item)) => {
                let mut child = item.clone();
                assign_foreign_key(&target, &mut child, owner_key.as_ref());
                statements.push(child_statement(&target, &child, options)?);
            }
            _ => {}
        }
    }

    if statements.iter().any(|sql| sql.starts_with("INSERT")) {
        statements.reverse();
    }

    debug!(entity = descriptor.type_name, statements = statements.len(), "Planned composition");
    Ok(statements)
}

/// Run composition statements in one transaction.
///
/// Joins the session's transaction when one is already open; a failure then
/// rolls back that transaction as well.
pub async fn persist_composition(session: &mut Session, statements: &[String]) -> CompositionStatus {
    if statements.is_empty() {
        return CompositionStatus::Skipped;
    }

    let owns_transaction = !session.in_transaction();
    if owns_transaction {
        if let Err(e) = session.begin().await {
            return CompositionStatus::RolledBack { error: e.to_string() };
        }
    }

    for sql in statements {
        if let Err(e) = session.execute_command(sql).await {
            warn!(error = %e, sql = %sql, "Composition statement failed, rolling back");
            if let Err(rollback) = session.rollback().await {
                warn!(error = %rollback, "Composition rollback failed");
            }
            return CompositionStatus::RolledBack { error: e.to_string() };
        }
    }

    if owns_transaction {
        if let Err(e) = session.commit().await {
            return CompositionStatus::RolledBack { error: e.to_string() };
        }
    }

    CompositionStatus::Committed {
        statements: statements.len(),
    }
}

fn child_statement(descriptor: &EntityDescriptor, child: &Record, options: &QueryOptions) -> OrmResult<String> {
    match persistence_action(descriptor, child) {
        Action::Edit => {
            let filter = descriptor.key_filter(child);
            synthesize(descriptor, Action::Edit, child, Some(&filter), options)
        }
        action => synthesize(descriptor, action, child, None, options),
    }
}

fn assign_foreign_key(descriptor: &EntityDescriptor, child: &mut Record, owner_key: Option<&Value>) {
    if let (Some(foreign_key), Some(owner_key)) = (descriptor.foreign_key(), owner_key) {
        child.insert(foreign_key.attribute.clone(), owner_key.clone());
    }
}

fn intermediary_of(relation: &RelationDescriptor) -> OrmResult<&Intermediary> {
    relation.intermediary.as_ref().ok_or_else(|| {
        OrmError::Configuration(format!(
            "many-to-many relation '{}' has no intermediary entity",
            relation.attribute
        ))
    })
}

fn link_foreign_key(link_descriptor: &EntityDescriptor) -> OrmResult<String> {
    link_descriptor
        .foreign_key()
        .map(|column| column.attribute.clone())
        .ok_or_else(|| {
            OrmError::Configuration(format!(
                "intermediary {} declares no foreign key column",
                link_descriptor.type_name
            ))
        })
}
