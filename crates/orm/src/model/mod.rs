//! Entity model: the [`Entity`] trait, schema builders and descriptors
//!
//! An entity is a plain serde struct that declares its table mapping through
//! [`EntitySchema`]. Descriptors are derived from that declaration once per
//! type and shared for the life of the process.

pub mod descriptor;
pub mod record;
pub mod schema;

pub use descriptor::{describe, AggregateColumn, ColumnDescriptor, EntityDescriptor};
pub use schema::*;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::OrmResult;

/// Dynamic form of an entity instance: attribute name to JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A type persisted by a repository
///
/// `Default` must produce the "unset" instance: keys at zero and optional
/// attributes at `None`. Filters are written as partially populated instances.
pub trait Entity:
    Serialize + DeserializeOwned + Default + Clone + fmt::Debug + Send + Sync + 'static
{
    fn schema() -> EntitySchema;
}

/// Typed handle to another entity type, used by relation declarations
#[derive(Clone, Copy)]
pub struct EntityRef {
    type_name: fn() -> &'static str,
    describe: fn() -> OrmResult<Arc<EntityDescriptor>>,
}

impl EntityRef {
    pub fn of<T: Entity>() -> Self {
        Self {
            type_name: std::any::type_name::<T>,
            describe: describe::<T>,
        }
    }

    pub fn describe(&self) -> OrmResult<Arc<EntityDescriptor>> {
        (self.describe)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.type_name()).finish()
    }
}
