//! Declarative schema builders
//!
//! Entities describe their mapping once through these builders; the result is
//! validated into an [`EntityDescriptor`](super::EntityDescriptor) and cached
//! for the life of the process.

use std::fmt;

use super::EntityRef;

/// Aggregate function applied to a source column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Sum,
    Count,
    Min,
    Max,
    Average,
}

impl Aggregation {
    pub fn function(&self) -> &'static str {
        match self {
            Aggregation::Sum => "SUM",
            Aggregation::Count => "COUNT",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
            Aggregation::Average => "AVG",
        }
    }
}

/// Mandatory joins render as `INNER JOIN`, optional ones as `LEFT JOIN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinKind {
    Mandatory,
    #[default]
    Optional,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Mandatory => write!(f, "INNER JOIN"),
            JoinKind::Optional => write!(f, "LEFT JOIN"),
        }
    }
}

/// Junction table crossed on the way to a joined table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    /// Junction column matched against the owner's key column
    pub owner_column: String,
    /// Junction column matched against the joined table's foreign key column
    pub target_column: String,
}

/// Column read from another table through a join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    pub table: String,
    pub column: String,
    pub alias: Option<String>,
    /// Owner-side column of the join condition
    pub key_column: String,
    /// Joined-side column of the join condition
    pub foreign_key_column: String,
    pub junction: Option<Junction>,
    pub kind: JoinKind,
    pub filterable: bool,
}

impl JoinConfig {
    pub fn new(table: impl Into<String>, column: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            alias: None,
            key_column: String::new(),
            foreign_key_column: String::new(),
            junction: None,
            kind,
            filterable: false,
        }
    }

    pub fn mandatory(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(table, column, JoinKind::Mandatory)
    }

    pub fn optional(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(table, column, JoinKind::Optional)
    }

    /// Join condition `<owner>.<key_column> = <table>.<foreign_key_column>`
    pub fn on(mut self, key_column: impl Into<String>, foreign_key_column: impl Into<String>) -> Self {
        self.key_column = key_column.into();
        self.foreign_key_column = foreign_key_column.into();
        self
    }

    pub fn through(
        mut self,
        table: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.junction = Some(Junction {
            table: table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
        });
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }
}

/// Declaration of one mapped attribute
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub(crate) attribute: String,
    pub(crate) column: Option<String>,
    pub(crate) alias: Option<String>,
    pub(crate) primary_key: bool,
    pub(crate) foreign_key: bool,
    pub(crate) filterable: bool,
    pub(crate) timestamp: bool,
    pub(crate) aggregation: Option<(Aggregation, String)>,
    pub(crate) join: Option<JoinConfig>,
}

impl ColumnSchema {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            column: None,
            alias: None,
            primary_key: false,
            foreign_key: false,
            filterable: false,
            timestamp: false,
            aggregation: None,
            join: None,
        }
    }

    /// Shorthand for the primary key attribute
    pub fn key(attribute: impl Into<String>) -> Self {
        Self::new(attribute).primary_key()
    }

    /// Physical column name, when it differs from the attribute
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column = Some(name.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Column holding the owner's key when this entity is a child
    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Date-time column; `YYYY-MM-DD HH:MM:SS` values read back in ISO form
    pub fn timestamp(mut self) -> Self {
        self.timestamp = true;
        self
    }

    pub fn aggregate(mut self, aggregation: Aggregation, source_column: impl Into<String>) -> Self {
        self.aggregation = Some((aggregation, source_column.into()));
        self
    }

    pub fn joined(mut self, join: JoinConfig) -> Self {
        self.join = Some(join);
        self
    }
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// Entity standing between both ends of a many-to-many relation
#[derive(Debug, Clone, Copy)]
pub struct Intermediary {
    pub entity: EntityRef,
    /// Intermediary attribute holding the far entity's key
    pub key_attribute: &'static str,
}

/// A nested attribute holding related entities
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub attribute: String,
    pub cardinality: Cardinality,
    /// One-to-one: owner attribute holding the related key.
    /// One-to-many: related attribute receiving the owner's key.
    pub foreign_key_attribute: String,
    pub target: EntityRef,
    pub intermediary: Option<Intermediary>,
    /// Whether composed writes persist this relation
    pub recordable: bool,
}

impl RelationDescriptor {
    pub fn one_to_one(attribute: impl Into<String>, target: EntityRef, foreign_key_attribute: impl Into<String>) -> Self {
        Self::new(attribute, Cardinality::OneToOne, target, foreign_key_attribute)
    }

    pub fn one_to_many(attribute: impl Into<String>, target: EntityRef, foreign_key_attribute: impl Into<String>) -> Self {
        Self::new(attribute, Cardinality::OneToMany, target, foreign_key_attribute)
    }

    /// Many-to-many through `intermediary`, whose `key_attribute` holds the
    /// target's key and whose foreign key column holds the owner's key
    pub fn many_to_many(attribute: impl Into<String>, target: EntityRef, intermediary: EntityRef, key_attribute: &'static str) -> Self {
        let mut relation = Self::new(attribute, Cardinality::ManyToMany, target, String::new());
        relation.intermediary = Some(Intermediary {
            entity: intermediary,
            key_attribute,
        });
        relation
    }

    fn new(attribute: impl Into<String>, cardinality: Cardinality, target: EntityRef, foreign_key_attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            cardinality,
            foreign_key_attribute: foreign_key_attribute.into(),
            target,
            intermediary: None,
            recordable: true,
        }
    }

    /// Load the relation eagerly but never write it back
    pub fn load_only(mut self) -> Self {
        self.recordable = false;
        self
    }
}

/// Mapping of an entity type
#[derive(Debug, Clone, Default)]
pub struct EntitySchema {
    pub(crate) table: Option<String>,
    pub(crate) columns: Vec<ColumnSchema>,
    pub(crate) relations: Vec<RelationDescriptor>,
    pub(crate) cacheable: bool,
}

impl EntitySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Serve plain `Get`/`List` calls from the result cache
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }
}
