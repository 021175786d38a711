//! tree2avro - walks runtime-typed columnar trees and streams them as Avro
//!
//! Construct, resolve, emit:
//! - `walker` builds a walker tree from declared type names
//! - nullable fields are pinned from the first non-null sample
//! - the resolved tree emits a schema document, an opcode stream, JSON
//!   records, or Avro-encoded records

pub mod avro;
pub mod cli;
pub mod convert;
pub mod dictionary;
pub mod entry;
pub mod errors;
pub mod memory;
pub mod observability;
pub mod schema;
pub mod walker;
