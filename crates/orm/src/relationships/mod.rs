//! Relation graph resolution
//!
//! Relations are resolved one level deep: related entities are loaded and
//! written, but their own relations are left alone.

pub mod resolver;

pub use resolver::{fill_composition, parse_composition, persist_composition, CompositionStatus};
