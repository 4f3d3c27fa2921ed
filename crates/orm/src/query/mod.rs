//! Statement synthesis

pub mod literal;
pub mod synthesizer;
pub mod types;

pub use synthesizer::{persistence_action, restricts, synthesize};
pub use types::*;
