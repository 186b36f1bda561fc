//! Flint Core - Foundational types for the Flint animator
//!
//! This crate provides the core types that all other Flint crates depend on:
//! - `EntityId` - Host-assigned entity identifiers
//! - `NameHash` - Case-insensitive 32-bit name hashing
//! - `Variant`, `ParamMap` - Typed parameters carried by events and actions
//! - Error types and Result alias

mod error;
mod hash;
mod id;
mod variant;

pub use error::{FlintError, Result};
pub use hash::{NameHash, NameTable};
pub use id::EntityId;
pub use variant::{ParamMap, Variant, DATA_KEY};
