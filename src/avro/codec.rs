//! Block compression codecs of the container format

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::errors::{WalkError, WalkResult};

/// Codec named in the `avro.codec` header entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Null,
    /// Raw deflate (RFC 1951), no zlib header
    Deflate,
}

impl Codec {
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
        }
    }

    pub fn compress(&self, data: &[u8]) -> WalkResult<Vec<u8>> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| WalkError::io("Deflate failed", e))?;
                encoder.finish().map_err(|e| WalkError::io("Deflate failed", e))
            }
        }
    }

    pub fn decompress(&self, data: &[u8]) -> WalkResult<Vec<u8>> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut out = Vec::new();
                DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| WalkError::io("Inflate failed", e))?;
                Ok(out)
            }
        }
    }
}

impl FromStr for Codec {
    type Err = WalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            other => Err(WalkError::invalid_argument(format!(
                "Unknown codec '{}' (expected null or deflate)",
                other
            ))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
