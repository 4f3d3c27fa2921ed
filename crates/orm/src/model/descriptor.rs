//! Validated entity descriptors and the process-wide descriptor registry

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::error::{OrmError, OrmResult};

use super::schema::{Aggregation, ColumnSchema, EntitySchema, JoinConfig, RelationDescriptor};
use super::{record, Entity, Record};

/// Aggregate column: `<FUNCTION>(<table>.<source_column>)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateColumn {
    pub aggregation: Aggregation,
    pub source_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub attribute: String,
    pub column: String,
    pub alias: Option<String>,
    pub primary_key: bool,
    pub foreign_key: bool,
    pub filterable: bool,
    pub timestamp: bool,
    pub aggregate: Option<AggregateColumn>,
    pub join: Option<JoinConfig>,
}

impl ColumnDescriptor {
    fn from_schema(schema: ColumnSchema) -> Self {
        let column = schema.column.unwrap_or_else(|| schema.attribute.clone());
        Self {
            attribute: schema.attribute,
            column,
            alias: schema.alias,
            primary_key: schema.primary_key,
            foreign_key: schema.foreign_key,
            filterable: schema.filterable,
            timestamp: schema.timestamp,
            aggregate: schema.aggregation.map(|(aggregation, source_column)| AggregateColumn {
                aggregation,
                source_column,
            }),
            join: schema.join,
        }
    }

    /// Stored in the owner table, so it takes part in inserts and updates
    pub fn is_persisted(&self) -> bool {
        self.aggregate.is_none() && self.join.is_none()
    }

    /// Label the column carries in result sets
    pub fn output_name(&self) -> &str {
        self.alias
            .as_deref()
            .or_else(|| self.join.as_ref().and_then(|join| join.alias.as_deref()))
            .unwrap_or(&self.attribute)
    }

    /// Whether a row label refers to this column
    pub fn answers_to(&self, label: &str) -> bool {
        label.eq_ignore_ascii_case(&self.attribute)
            || label.eq_ignore_ascii_case(self.output_name())
            || (self.is_persisted() && label.eq_ignore_ascii_case(&self.column))
    }
}

/// Everything the synthesizer and the relation resolver need to know about
/// an entity type
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    pub cacheable: bool,
    key_index: usize,
    foreign_key_index: Option<usize>,
    template: Record,
}

impl EntityDescriptor {
    /// Validate a schema.
    ///
    /// `template` is the default instance of the type as a record.
    pub fn from_schema(
        schema: EntitySchema,
        type_id: TypeId,
        type_name: &'static str,
        template: Record,
    ) -> OrmResult<Self> {
        let table = schema
            .table
            .filter(|table| !table.trim().is_empty())
            .ok_or_else(|| OrmError::MissingTableMetadata(type_name.to_string()))?;

        let columns: Vec<ColumnDescriptor> =
            schema.columns.into_iter().map(ColumnDescriptor::from_schema).collect();

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.attribute.as_str()) {
                return Err(OrmError::Configuration(format!(
                    "{} maps attribute '{}' more than once",
                    type_name, column.attribute
                )));
            }
        }

        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index)
            .collect();
        let key_index = match keys.as_slice() {
            [] => return Err(OrmError::MissingPrimaryKey(type_name.to_string())),
            [index] => *index,
            _ => {
                return Err(OrmError::Configuration(format!(
                    "{} declares more than one primary key",
                    type_name
                )))
            }
        };
        if !columns[key_index].is_persisted() {
            return Err(OrmError::Configuration(format!(
                "{} primary key '{}' must be stored in the entity table",
                type_name, columns[key_index].attribute
            )));
        }

        let foreign_key_index = columns.iter().position(|column| column.foreign_key);

        Ok(Self {
            type_id,
            type_name,
            table,
            columns,
            relations: schema.relations,
            cacheable: schema.cacheable,
            key_index,
            foreign_key_index,
            template,
        })
    }

    pub fn key(&self) -> &ColumnDescriptor {
        &self.columns[self.key_index]
    }

    pub fn foreign_key(&self) -> Option<&ColumnDescriptor> {
        self.foreign_key_index.map(|index| &self.columns[index])
    }

    pub fn column(&self, attribute: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.attribute == attribute)
    }

    pub fn relation(&self, attribute: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|relation| relation.attribute == attribute)
    }

    /// Columns stored in the entity table
    pub fn persisted_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|column| column.is_persisted())
    }

    /// Attributes a free-text search is matched against
    pub fn filterable_attributes(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| {
                column.filterable || column.join.as_ref().is_some_and(|join| join.filterable)
            })
            .map(|column| column.attribute.as_str())
            .collect()
    }

    /// `<table>.<column>` for a column stored in the entity table
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.table, column)
    }

    /// Default instance as a record
    pub fn new_record(&self) -> Record {
        self.template.clone()
    }

    /// Record carrying only the key of `source`
    pub fn key_filter(&self, source: &Record) -> Record {
        let mut filter = Record::new();
        let key = &self.key().attribute;
        filter.insert(key.clone(), source.get(key).cloned().unwrap_or(Value::Null));
        filter
    }

    pub fn key_value<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        record
            .get(&self.key().attribute)
            .filter(|value| !record::is_unset(value))
    }

    pub(crate) fn template(&self) -> &Record {
        &self.template
    }
}

static DESCRIPTORS: Lazy<DashMap<TypeId, Arc<EntityDescriptor>>> = Lazy::new(DashMap::new);

/// Descriptor of `T`, derived on first use and shared afterwards
pub fn describe<T: Entity>() -> OrmResult<Arc<EntityDescriptor>> {
    let type_id = TypeId::of::<T>();
    if let Some(descriptor) = DESCRIPTORS.get(&type_id) {
        return Ok(Arc::clone(descriptor.value()));
    }

    let type_name = short_type_name(std::any::type_name::<T>());
    let template = record::to_record(&T::default())?;
    let descriptor = Arc::new(EntityDescriptor::from_schema(
        T::schema(),
        type_id,
        type_name,
        template,
    )?);
    debug!(entity = type_name, table = %descriptor.table, "Registered entity descriptor");

    let stored = DESCRIPTORS.entry(type_id).or_insert(descriptor);
    Ok(Arc::clone(stored.value()))
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}
