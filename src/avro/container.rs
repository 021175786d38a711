//! Avro object container files
//!
//! Layout:
//! - magic `Obj\x01`
//! - metadata map (`avro.schema`, `avro.codec`)
//! - 16-byte sync marker
//! - blocks of `(record count, byte size, data, sync marker)`
//!
//! The writer buffers encoded records and flushes a block once the buffer
//! reaches the block size. Dropping a writer finalizes it.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::Value;

use super::codec::Codec;
use super::encoding::{encode_bytes, encode_long, encode_string, Decoder};
use crate::errors::{WalkError, WalkResult};
use crate::observability::{log_event_with_fields, Event};

pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1];
pub const SYNC_SIZE: usize = 16;
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Streaming container writer
pub struct ContainerWriter<W: Write> {
    writer: Option<W>,
    codec: Codec,
    sync: [u8; SYNC_SIZE],
    block_size: usize,
    buffer: Vec<u8>,
    pending: u64,
    records: u64,
    blocks: u64,
    closed: bool,
}

impl<W: Write> ContainerWriter<W> {
    /// Writes the header immediately.
    pub fn new(writer: W, schema: &Value, codec: Codec, block_size: usize) -> WalkResult<Self> {
        Self::with_sync(writer, schema, codec, block_size, rand::random())
    }

    /// Writer with a caller-chosen sync marker
    pub fn with_sync(
        mut writer: W,
        schema: &Value,
        codec: Codec,
        block_size: usize,
        sync: [u8; SYNC_SIZE],
    ) -> WalkResult<Self> {
        if block_size == 0 {
            return Err(WalkError::invalid_argument("Block size must be > 0"));
        }

        let mut header = Vec::with_capacity(256);
        header.extend_from_slice(&MAGIC);
        encode_long(&mut header, 2);
        encode_string(&mut header, "avro.schema");
        encode_bytes(&mut header, schema.to_string().as_bytes());
        encode_string(&mut header, "avro.codec");
        encode_bytes(&mut header, codec.name().as_bytes());
        encode_long(&mut header, 0);
        header.extend_from_slice(&sync);
        writer
            .write_all(&header)
            .map_err(|e| WalkError::io("Cannot write container header", e))?;

        log_event_with_fields(
            Event::ContainerHeaderWritten,
            &[("codec", codec.name()), ("block_size", &block_size.to_string())],
        );

        Ok(Self {
            writer: Some(writer),
            codec,
            sync,
            block_size,
            buffer: Vec::with_capacity(block_size),
            pending: 0,
            records: 0,
            blocks: 0,
            closed: false,
        })
    }

    /// Adds one encoded record.
    pub fn append(&mut self, record: &[u8]) -> WalkResult<()> {
        if self.closed {
            return Err(WalkError::io_failure("Container already closed"));
        }
        self.buffer.extend_from_slice(record);
        self.pending += 1;
        self.records += 1;
        if self.buffer.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> WalkResult<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| WalkError::io_failure("Container already closed"))?;

        let data = self.codec.compress(&self.buffer)?;
        let mut block = Vec::with_capacity(data.len() + 2 * 10 + SYNC_SIZE);
        encode_long(&mut block, self.pending as i64);
        encode_long(&mut block, data.len() as i64);
        block.extend_from_slice(&data);
        block.extend_from_slice(&self.sync);
        writer
            .write_all(&block)
            .map_err(|e| WalkError::io("Cannot write container block", e))?;

        log_event_with_fields(
            Event::BlockFlushed,
            &[
                ("records", &self.pending.to_string()),
                ("bytes", &data.len().to_string()),
            ],
        );

        self.blocks += 1;
        self.pending = 0;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the last block and the underlying writer. Later calls do nothing.
    pub fn close(&mut self) -> WalkResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_block()?;
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| WalkError::io("Cannot flush container", e))?;
        }
        log_event_with_fields(
            Event::ContainerClosed,
            &[
                ("records", &self.records.to_string()),
                ("blocks", &self.blocks.to_string()),
            ],
        );
        self.closed = true;
        Ok(())
    }

    /// Flushes the last block and hands back the underlying writer.
    pub fn finish(mut self) -> WalkResult<W> {
        self.close()?;
        self.writer
            .take()
            .ok_or_else(|| WalkError::io_failure("Container already closed"))
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Blocks written so far
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }
}

impl<W: Write> Drop for ContainerWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

/// One decoded block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub count: u64,
    /// Decompressed record bytes
    pub data: Vec<u8>,
}

/// Reads back a whole container held in memory.
#[derive(Debug)]
pub struct ContainerReader {
    metadata: BTreeMap<String, Vec<u8>>,
    codec: Codec,
    sync: [u8; SYNC_SIZE],
    blocks: Vec<Block>,
}

impl ContainerReader {
    pub fn parse(data: &[u8]) -> WalkResult<Self> {
        let mut dec = Decoder::new(data);
        if dec.take(MAGIC.len())? != MAGIC {
            return Err(WalkError::io_failure("Not an Avro container: bad magic"));
        }

        let mut metadata = BTreeMap::new();
        loop {
            let mut count = dec.long()?;
            if count == 0 {
                break;
            }
            if count < 0 {
                count = -count;
                dec.long()?;
            }
            for _ in 0..count {
                let key = dec.string()?;
                let value = dec.bytes()?.to_vec();
                metadata.insert(key, value);
            }
        }

        let codec = match metadata.get("avro.codec") {
            Some(name) => String::from_utf8_lossy(name).parse()?,
            None => Codec::Null,
        };

        let mut sync = [0u8; SYNC_SIZE];
        sync.copy_from_slice(dec.take(SYNC_SIZE)?);

        let mut blocks = Vec::new();
        while !dec.is_empty() {
            let count = dec.long()?;
            let size = dec.long()?;
            let count = u64::try_from(count)
                .map_err(|_| WalkError::io_failure("Negative block count"))?;
            let size = usize::try_from(size)
                .map_err(|_| WalkError::io_failure("Negative block size"))?;
            let data = codec.decompress(dec.take(size)?)?;
            if dec.take(SYNC_SIZE)? != sync {
                return Err(WalkError::io_failure(format!(
                    "Sync marker mismatch after block {}",
                    blocks.len()
                )));
            }
            blocks.push(Block { count, data });
        }

        Ok(Self {
            metadata,
            codec,
            sync,
            blocks,
        })
    }

    pub fn metadata(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(Vec::as_slice)
    }

    /// The writer schema stored in the header
    pub fn schema(&self) -> WalkResult<Value> {
        let raw = self
            .metadata("avro.schema")
            .ok_or_else(|| WalkError::io_failure("Container has no avro.schema"))?;
        serde_json::from_slice(raw)
            .map_err(|e| WalkError::io_failure(format!("Malformed avro.schema: {}", e)))
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn sync(&self) -> &[u8; SYNC_SIZE] {
        &self.sync
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Total records over all blocks
    pub fn record_count(&self) -> u64 {
        self.blocks.iter().map(|b| b.count).sum()
    }
}
