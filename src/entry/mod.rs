//! Entry binding: the narrow interface to a record source
//!
//! A source declares its top-level fields, hands out read handles for them,
//! and moves a cursor over entries. The walker engine never advances the
//! cursor itself.

mod fixture;
mod materialize;

pub use fixture::{FixtureError, FixtureSource, TreeFile, TreeSpec};

use serde::{Deserialize, Serialize};

use crate::errors::WalkResult;
use crate::memory::{Address, Memory};

/// One dimension of a leaf field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionDecl {
    Fixed(usize),
    /// Length read from another field of the same entry
    Counter { counter: String },
}

/// Declared top-level field of a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Leaf dimensions, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dims: Vec<DimensionDecl>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            dims: Vec::new(),
        }
    }

    pub fn with_dims(mut self, dims: Vec<DimensionDecl>) -> Self {
        self.dims = dims;
        self
    }
}

/// Read handle for a bound field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(pub usize);

/// Record source the walker tree is bound to.
///
/// `advance` loads the entry under the cursor and moves the cursor forward;
/// handle addresses refer to the most recently loaded entry.
pub trait EntrySource {
    /// Top-level fields in declaration order
    fn declarations(&self) -> &[FieldDecl];

    /// Binds a declared field and returns its read handle.
    fn bind(&mut self, field: &str, type_name: &str) -> WalkResult<FieldHandle>;

    /// Live address of a bound field in the current entry
    fn address(&self, handle: FieldHandle) -> WalkResult<Address>;

    /// Memory of the current entry
    fn memory(&self) -> &dyn Memory;

    fn has_next(&self) -> bool;

    fn advance(&mut self) -> WalkResult<()>;

    fn num_entries(&self) -> u64;

    /// Moves the cursor so the next `advance` loads `entry`.
    fn seek(&mut self, entry: u64) -> WalkResult<()>;
}
