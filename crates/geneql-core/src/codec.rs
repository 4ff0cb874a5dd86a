// Plan envelope encoding/decoding
//
// Envelope format (binary):
// [magic: "GQLP"] [format: u8] [length: u32 LE] [payload bytes] [crc32: u32 LE]
//
// The payload is the bincode encoding of the `Plan`. The CRC covers the
// format byte and the payload.

use crate::query::plan::Plan;
use crc32fast::Hasher;
use thiserror::Error;

/// Leading bytes of every encoded plan
pub const MAGIC: &[u8; 4] = b"GQLP";

/// Current payload format
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 4;
const TRAILER_LEN: usize = 4;

/// Plan envelope errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to serialize plan: {0}")]
    Serialization(String),

    #[error("plan envelope truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("not a plan envelope")]
    BadMagic,

    #[error("unsupported plan format {0}")]
    UnsupportedFormat(u8),

    #[error("plan checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("{0} trailing bytes after plan envelope")]
    TrailingBytes(usize),
}

fn checksum(format: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[format]);
    hasher.update(payload);
    hasher.finalize()
}

impl Plan {
    /// Encode into a framed, checksummed envelope
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let payload =
            bincode::serialize(self).map_err(|e| CodecError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| CodecError::Serialization("plan exceeds 4 GiB".to_string()))?;

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        frame.extend_from_slice(MAGIC);
        frame.push(FORMAT_VERSION);
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&checksum(FORMAT_VERSION, &payload).to_le_bytes());

        Ok(frame)
    }

    /// Decode and verify an envelope produced by [`Plan::encode`]
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN + TRAILER_LEN,
                available: data.len(),
            });
        }
        if &data[..4] != MAGIC {
            return Err(CodecError::BadMagic);
        }

        let format = data[4];
        if format != FORMAT_VERSION {
            return Err(CodecError::UnsupportedFormat(format));
        }

        let length = u32::from_le_bytes([data[5], data[6], data[7], data[8]]) as usize;
        let total = HEADER_LEN + length + TRAILER_LEN;
        if data.len() < total {
            return Err(CodecError::Truncated {
                needed: total,
                available: data.len(),
            });
        }
        if data.len() > total {
            return Err(CodecError::TrailingBytes(data.len() - total));
        }

        let payload = &data[HEADER_LEN..HEADER_LEN + length];
        let crc_offset = HEADER_LEN + length;
        let expected = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);
        let actual = checksum(format, payload);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }

        bincode::deserialize(payload).map_err(|e| CodecError::Serialization(e.to_string()))
    }
}
