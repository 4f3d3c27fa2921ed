//! Statement kinds and query modifiers

use std::collections::BTreeMap;
use std::fmt;

use crate::backends::Dialect;

/// What a synthesized statement does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    List,
    Count,
    Max,
    Create,
    Edit,
    Delete,
}

impl Action {
    pub fn is_read(&self) -> bool {
        matches!(self, Action::Get | Action::List | Action::Count | Action::Max)
    }

    /// Reads that may turn text predicates into `LIKE` matches
    pub fn allows_fuzzy(&self) -> bool {
        matches!(self, Action::List | Action::Count)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Get => "get",
            Action::List => "list",
            Action::Count => "count",
            Action::Max => "max",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Modifiers applied on top of the entity and filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Maximum number of rows, 0 for no limit
    pub limit: usize,
    pub sort: Vec<String>,
    pub direction: OrderDirection,
    pub group: Vec<String>,
    /// Attributes to select, empty for all
    pub visible: Vec<String>,
    /// Attribute name to inclusive `[low, high]` bounds
    pub ranges: BTreeMap<String, (f64, f64)>,
    pub dialect: Dialect,
    pub read_uncommitted: bool,
}

impl QueryOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort<I, S>(mut self, attributes: I, direction: OrderDirection) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = attributes.into_iter().map(Into::into).collect();
        self.direction = direction;
        self
    }

    pub fn with_group<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_visible<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visible = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_range(mut self, attribute: impl Into<String>, low: f64, high: f64) -> Self {
        self.ranges.insert(attribute.into(), (low, high));
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_read_uncommitted(mut self, read_uncommitted: bool) -> Self {
        self.read_uncommitted = read_uncommitted;
        self
    }

    /// Same dialect and hint, no modifiers
    pub fn plain(&self) -> Self {
        Self::new(self.dialect).with_read_uncommitted(self.read_uncommitted)
    }

    /// No modifier changes which rows or columns come back
    pub fn is_plain(&self) -> bool {
        self.limit == 0
            && self.sort.is_empty()
            && self.group.is_empty()
            && self.visible.is_empty()
            && self.ranges.is_empty()
    }
}
