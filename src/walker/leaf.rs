//! Leaf dimension chains
//!
//! A leaf root is a primitive with zero or more dimensions, outermost first.
//! Fixed dimensions are known at discovery; a counter dimension is read from
//! its counter field for every record. Values are stored flat, so the chain
//! is walked iteratively over the per-record lengths.

use std::fmt;

use super::primitive::PrimitiveKind;
use crate::entry::{EntrySource, FieldHandle};
use crate::errors::{WalkError, WalkResult};

/// One dimension of a leaf root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafDimension {
    Fixed(usize),
    Counter {
        field: String,
        handle: FieldHandle,
        kind: PrimitiveKind,
    },
}

impl LeafDimension {
    /// Length of this dimension in the current entry.
    pub fn length(&self, source: &dyn EntrySource) -> WalkResult<usize> {
        match self {
            LeafDimension::Fixed(n) => Ok(*n),
            LeafDimension::Counter {
                field,
                handle,
                kind,
            } => {
                let addr = source.address(*handle)?;
                let value = kind.read(source.memory(), addr)?;
                value.as_count().ok_or_else(|| {
                    WalkError::invalid_argument(format!(
                        "Counter '{}' holds {:?}, not a length",
                        field, value
                    ))
                })
            }
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, LeafDimension::Counter { .. })
    }
}

impl fmt::Display for LeafDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafDimension::Fixed(n) => write!(f, "[{}]", n),
            LeafDimension::Counter { field, .. } => write!(f, "[{}]", field),
        }
    }
}

/// One step of a dimension walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafStep {
    /// A sequence of the given length begins
    Open(usize),
    /// Flat index of the next value
    Item(usize),
    Close,
}

/// Walks nested sequences of the given lengths, outermost first.
///
/// With no dimensions the walk is a single `Item(0)`.
pub fn walk_dimensions(
    lengths: &[usize],
    mut visit: impl FnMut(LeafStep) -> WalkResult<()>,
) -> WalkResult<()> {
    if lengths.is_empty() {
        return visit(LeafStep::Item(0));
    }

    let innermost = lengths.len() - 1;
    let mut positions = vec![0usize; lengths.len()];
    let mut depth = 0;
    let mut flat = 0;

    visit(LeafStep::Open(lengths[0]))?;
    loop {
        if positions[depth] == lengths[depth] {
            visit(LeafStep::Close)?;
            if depth == 0 {
                return Ok(());
            }
            depth -= 1;
            positions[depth] += 1;
        } else if depth == innermost {
            visit(LeafStep::Item(flat))?;
            flat += 1;
            positions[depth] += 1;
        } else {
            depth += 1;
            positions[depth] = 0;
            visit(LeafStep::Open(lengths[depth]))?;
        }
    }
}
