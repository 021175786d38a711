//! Schema instruction stream
//!
//! Walkers describe their schema two ways: as a nested JSON document and as
//! a flat, depth-first sequence of `(instruction, word)` pairs handed to a
//! [`SchemaBuilder`]. [`SchemaAssembler`] turns the flat stream back into the
//! nested document.

mod assembler;
mod opcode;

pub use assembler::SchemaAssembler;
pub use opcode::{OpcodeRecorder, SchemaBuilder, SchemaElement};
