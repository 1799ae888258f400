//! Payload codecs.
//!
//! A codec turns an application value into the opaque bytes carried by a
//! frame and back. The hub calls [`Codec::serialize`] once per broadcast,
//! never once per target connection.
//!
//! # Codecs
//!
//! | Codec | Tag | Value |
//! |-------|-----|-------|
//! | [`ByteCodec`] | `byte` | [`Bytes`] passed through unchanged |
//! | [`JsonCodec`] | `json` | any `T: Serialize + DeserializeOwned` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

// ============================================================================
// Codec
// ============================================================================

/// Converts values to and from wire payloads.
pub trait Codec: Send + Sync {
    /// Value type this codec encodes.
    type Value;

    /// Encodes a value into a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] or [`Error::Json`] if the value cannot be encoded.
    fn serialize(&self, value: &Self::Value) -> Result<Bytes>;

    /// Decodes a payload into a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] or [`Error::Json`] if the payload is malformed.
    fn deserialize(&self, payload: &[u8]) -> Result<Self::Value>;

    /// Short tag naming the encoding.
    fn type_tag(&self) -> &'static str;
}

// ============================================================================
// ByteCodec
// ============================================================================

/// Identity codec for raw byte payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCodec;

impl Codec for ByteCodec {
    type Value = Bytes;

    #[inline]
    fn serialize(&self, value: &Bytes) -> Result<Bytes> {
        Ok(value.clone())
    }

    #[inline]
    fn deserialize(&self, payload: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(payload))
    }

    #[inline]
    fn type_tag(&self) -> &'static str {
        "byte"
    }
}

// ============================================================================
// JsonCodec
// ============================================================================

/// JSON codec backed by `serde_json`.
pub struct JsonCodec<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Creates a JSON codec for `T`.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for JsonCodec<T> {}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn serialize(&self, value: &T) -> Result<Bytes> {
        let encoded = serde_json::to_vec(value)?;
        Ok(Bytes::from(encoded))
    }

    fn deserialize(&self, payload: &[u8]) -> Result<T> {
        if payload.is_empty() {
            return Err(Error::codec(self.type_tag(), "empty payload"));
        }
        Ok(serde_json::from_slice(payload)?)
    }

    #[inline]
    fn type_tag(&self) -> &'static str {
        "json"
    }
}

// ============================================================================
// Tests
// ============================================================================
