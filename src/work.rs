//! Legacy getwork payload encoding
//!
//! A getwork payload is the 80-byte pure block header, SHA-256 padded out to
//! two 64-byte blocks, with every 4-byte word byte-reversed. Getwork mining
//! software depends on this exact layout.

use crate::utils::decode_hex_param;
use crate::{Error, Result};
use bitcoin::block::Header;
use bitcoin::consensus::encode::{deserialize, serialize};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a getwork payload in bytes
pub const WORK_SIZE: usize = 128;

/// Size of a serialized pure block header
pub const HEADER_SIZE: usize = 80;

/// A 128-byte getwork payload
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WorkPayload([u8; WORK_SIZE]);

impl WorkPayload {
    /// Create a payload from raw bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != WORK_SIZE {
            return Err(Error::invalid_payload_size(format!(
                "expected {} bytes, got {}",
                WORK_SIZE,
                slice.len()
            )));
        }
        let mut bytes = [0u8; WORK_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Get the payload as bytes
    pub fn as_bytes(&self) -> &[u8; WORK_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&decode_hex_param("data", s)?)
    }
}

impl fmt::Debug for WorkPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkPayload").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for WorkPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for WorkPayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for WorkPayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Apply SHA-256 message padding to the first `len` bytes of `buf`.
///
/// Writes the 0x80 marker, zero fill and a big-endian bit length into the
/// last four bytes of the final 64-byte block. Returns the number of blocks.
/// `buf` must hold at least `64 * blocks` bytes.
pub fn format_hash_blocks(buf: &mut [u8], len: usize) -> usize {
    let blocks = 1 + (len + 8) / 64;
    let end = 64 * blocks;
    buf[len..end].fill(0);
    buf[len] = 0x80;
    BigEndian::write_u32(&mut buf[end - 4..end], (len * 8) as u32);
    blocks
}

/// Reverse the byte order of every 4-byte word in place
pub fn swap_word_endianness(data: &mut [u8]) -> Result<()> {
    if data.len() % 4 != 0 {
        return Err(Error::invalid_payload_size(format!(
            "{} bytes is not a whole number of words",
            data.len()
        )));
    }
    swap_words(data);
    Ok(())
}

fn swap_words(data: &mut [u8]) {
    for word in data.chunks_exact_mut(4) {
        let value = BigEndian::read_u32(word);
        LittleEndian::write_u32(word, value);
    }
}

/// Pad and swap an arbitrary serialized prefix into a work payload
pub fn encode_bytes(serialized: &[u8]) -> WorkPayload {
    let len = serialized.len();
    let blocks = 1 + (len + 8) / 64;
    let mut buf = vec![0u8; (64 * blocks).max(WORK_SIZE)];
    buf[..len].copy_from_slice(serialized);
    format_hash_blocks(&mut buf, len);
    buf.truncate(WORK_SIZE);
    swap_words(&mut buf);

    let mut bytes = [0u8; WORK_SIZE];
    bytes.copy_from_slice(&buf);
    WorkPayload(bytes)
}

/// Encode a block header as a getwork payload
pub fn encode(header: &Header) -> WorkPayload {
    encode_bytes(&serialize(header))
}

/// Recover the pure block header from a getwork payload.
///
/// Only the first 80 bytes are consulted; anything shorter is rejected.
pub fn decode(work: &[u8]) -> Result<Header> {
    if work.len() < HEADER_SIZE {
        return Err(Error::invalid_payload_size(format!(
            "need at least {} bytes, got {}",
            HEADER_SIZE,
            work.len()
        )));
    }
    let mut data = [0u8; HEADER_SIZE];
    data.copy_from_slice(&work[..HEADER_SIZE]);
    swap_words(&mut data);
    deserialize(&data).map_err(|e| Error::invalid_payload_size(e.to_string()))
}
