//! External document construction.
//!
//! - [`SchemaBuilder`] evaluates a provider's mappings and merges their output
//! - [`merge`] holds the deep-merge and null-stripping rules
//! - [`address`] validates the addresses a document will be keyed on

pub mod address;
pub mod builder;
pub mod merge;

pub use address::{InvalidAddress, validate_addresses};
pub use builder::SchemaBuilder;

use serde_json::{Map, Value};

/// An object as the external directory understands it. Built fresh on every sync.
pub type ExternalDocument = Map<String, Value>;
