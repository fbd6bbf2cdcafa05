//! Domain building blocks shared by every kvgen crate.
//!
//! Holds the opaque workflow graph model, the per-workflow node-id
//! conventions and parameter substitution, generation metadata, and
//! the naming/seed helpers used when persisting results.

pub mod error;
pub mod metadata;
pub mod naming;
pub mod seed;
pub mod templates;
pub mod types;
pub mod workflow;
