//! Type-walker engine
//!
//! A walker tree is built from runtime type names once per discovery
//! session, resolved against live records, and then used to emit a schema
//! and per-record values.
//!
//! # Lifecycle
//!
//! 1. Construct: [`DiscoverySession::build`] parses a type name and builds
//!    a [`FieldWalker`]. Named record types are built at most once per
//!    session and aliased through [`RecordId`].
//! 2. Resolve: pointer, back-reference and dynamic-array walkers pin their
//!    concrete record type on the first non-null live instance.
//! 3. Emit: schema once, values once per record. Emission never mutates
//!    the tree.

mod binary;
mod describe;
mod leaf;
mod primitive;
mod resolve;
mod schema;
mod session;
mod text;
mod tree;
mod typename;

pub use leaf::{walk_dimensions, LeafDimension, LeafStep};
pub use primitive::{PrimitiveKind, StringKind, Widened};
pub use schema::SchemaShape;
pub use session::{DiscoverySession, MemberWalker, RecordId, RecordWalker};
pub use tree::{RootBody, RootWalker, TreeWalker};
pub use typename::{DynamicForm, TypeExpr};

use crate::memory::{POINTER_SIZE, TREF_SIZE, VECTOR_SIZE};

/// Resolution state of a lazily typed walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Resolved,
}

/// Nullable pointer to an inner walker
#[derive(Debug, Clone)]
pub struct PointerWalker {
    pub target: FieldWalker,
    pub state: Resolution,
}

/// The closed set of walker kinds
#[derive(Debug, Clone)]
pub enum WalkerKind {
    Primitive(PrimitiveKind),
    String(StringKind),
    Record(RecordId),
    Pointer(Box<PointerWalker>),
    /// Weak reference by uid; the target class is pinned on first sample
    BackRef { target: Option<RecordId> },
    Vector(Box<FieldWalker>),
    BitVector,
    Array(Box<FieldWalker>, usize),
    /// Heterogeneous container whose elements must share one class
    Dynamic {
        form: DynamicForm,
        target: Option<RecordId>,
    },
}

/// One node of the walker tree
#[derive(Debug, Clone)]
pub struct FieldWalker {
    pub field_name: String,
    /// Normalized type name
    pub type_name: String,
    pub kind: WalkerKind,
}

impl FieldWalker {
    pub fn new(field_name: impl Into<String>, type_name: impl Into<String>, kind: WalkerKind) -> Self {
        Self {
            field_name: field_name.into(),
            type_name: type_name.into(),
            kind,
        }
    }

    /// The type this walker walks; aliased records share it.
    pub fn identity(&self) -> &str {
        &self.type_name
    }

    /// Byte size of one value in live memory
    pub fn size(&self, session: &DiscoverySession) -> usize {
        match &self.kind {
            WalkerKind::Primitive(kind) => kind.size(),
            WalkerKind::String(kind) => kind.size(),
            WalkerKind::Record(id) => session.record(*id).size,
            WalkerKind::Pointer(_) => POINTER_SIZE,
            WalkerKind::BackRef { .. } => TREF_SIZE,
            WalkerKind::Vector(_) | WalkerKind::BitVector | WalkerKind::Dynamic { .. } => {
                VECTOR_SIZE
            }
            WalkerKind::Array(inner, n) => inner.size(session) * n,
        }
    }

    /// True for walkers that carry no fields at all; such members are skipped.
    pub fn is_empty(&self, session: &DiscoverySession) -> bool {
        match &self.kind {
            WalkerKind::Record(id) => session.record(*id).is_empty(),
            WalkerKind::Array(inner, _) | WalkerKind::Vector(inner) => inner.is_empty(session),
            _ => false,
        }
    }

    /// True when this walker and everything reachable from it is resolved.
    pub fn is_resolved(&self, session: &DiscoverySession) -> bool {
        session.is_resolved(self)
    }
}
