//! Serialization Codec Module
//!
//! Converts typed payloads to and from their stored byte representation,
//! transparently compressing payloads above a configurable threshold.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Payload ==
/// Stored form of a cache payload.
///
/// The two variants make decompression dispatch exhaustive: a payload is
/// either its plain JSON form or a gzip of its JSON text, never an untyped
/// value with a marker flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// JSON form stored directly inside the namespace blob
    Plain(serde_json::Value),
    /// Gzip of the payload's JSON text
    Compressed(Vec<u8>),
}

impl Payload {
    // == Size ==
    /// Exact byte length of the stored form.
    ///
    /// This is the number used for quota accounting and eviction scoring:
    /// the JSON text length for plain payloads, the compressed length for
    /// compressed ones.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Payload::Plain(value) => serde_json::to_vec(value)
                .map(|bytes| bytes.len() as u64)
                .unwrap_or(0),
            Payload::Compressed(bytes) => bytes.len() as u64,
        }
    }

    /// Returns true if the payload is stored compressed.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }
}

// == Serialization Codec ==
/// Encodes typed values into [`Payload`]s and back.
#[derive(Debug, Clone)]
pub struct SerializationCodec {
    /// Master switch for compression
    compression_enabled: bool,
    /// Serialized payloads larger than this are compressed
    compression_threshold: usize,
}

impl SerializationCodec {
    // == Constructor ==
    /// Creates a codec with explicit compression settings.
    pub fn new(compression_enabled: bool, compression_threshold: usize) -> Self {
        Self {
            compression_enabled,
            compression_threshold,
        }
    }

    /// Creates a codec from cache configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.compression_enabled,
            config.compression_threshold_bytes,
        )
    }

    // == Encode ==
    /// Serializes a value into its stored form.
    ///
    /// Serialization failure rejects the write. Compression failure does
    /// not: the payload silently falls back to its plain form.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Payload> {
        let json = serde_json::to_value(value)
            .map_err(|err| CacheError::Serialization(err.to_string()))?;
        let text = serde_json::to_vec(&json)
            .map_err(|err| CacheError::Serialization(err.to_string()))?;

        if self.compression_enabled && text.len() > self.compression_threshold {
            match compress(&text) {
                Ok(compressed) => return Ok(Payload::Compressed(compressed)),
                Err(err) => {
                    debug!(%err, "payload compression failed, storing uncompressed");
                }
            }
        }

        Ok(Payload::Plain(json))
    }

    // == Decode ==
    /// Decodes a stored payload back into a typed value.
    ///
    /// Any failure here means the stored bytes no longer describe a `T`;
    /// the cache store treats that as corruption and purges the entry.
    pub fn decode<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T> {
        match payload {
            Payload::Plain(value) => serde_json::from_value(value.clone())
                .map_err(|err| CacheError::Deserialization(err.to_string())),
            Payload::Compressed(bytes) => {
                let text = decompress(bytes)
                    .map_err(|err| CacheError::Deserialization(err.to_string()))?;
                serde_json::from_slice(&text)
                    .map_err(|err| CacheError::Deserialization(err.to_string()))
            }
        }
    }
}

impl Default for SerializationCodec {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

// == Compression Helpers ==
fn compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
