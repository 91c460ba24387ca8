//! PackStream value model.
//!
//! The byte-level encoding belongs to the connection layer. What reaches the
//! driver is already a tree of [`PackStreamValue`]s; graph entities arrive as
//! tagged structures:
//!
//! - **Node**: id, labels, properties
//! - **Relationship**: id, start_id, end_id, type, properties
//! - **UnboundRelationship**: id, type, properties
//! - **Path**: nodes, unbound relationships, signed index sequence

pub mod marker;
pub mod types;

pub use marker::*;
pub use types::{PackStreamStructure, PackStreamValue};
