//! Avro binary encoding and object container files

pub mod codec;
pub mod container;
pub mod encoding;

pub use codec::Codec;
pub use container::{Block, ContainerReader, ContainerWriter, DEFAULT_BLOCK_SIZE};
pub use encoding::Decoder;
