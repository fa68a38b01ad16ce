//! Compact difficulty decoding
//!
//! Expands the 32-bit "nBits" encoding into a full 256-bit target, with the
//! same negative/overflow detection the reference node applies.

use crate::{Error, Result};
use bitcoin::pow::{CompactTarget, Target};

/// Decode compact difficulty bits into a target.
///
/// Fails with [`Error::MalformedDifficulty`] if the encoding is negative,
/// overflows 256 bits, or expands to zero.
pub fn decode(bits: CompactTarget) -> Result<Target> {
    let compact = bits.to_consensus();
    let size = (compact >> 24) as usize;
    let mut word = compact & 0x007f_ffff;

    let mut le = [0u8; 32];
    if size <= 3 {
        word >>= 8 * (3 - size);
        le[..4].copy_from_slice(&word.to_le_bytes());
    } else {
        for (i, byte) in word.to_le_bytes().iter().take(3).enumerate() {
            let idx = i + size - 3;
            if idx < le.len() {
                le[idx] = *byte;
            }
        }
    }

    if word != 0 && compact & 0x0080_0000 != 0 {
        return Err(Error::malformed_difficulty(compact, "negative"));
    }
    let overflow =
        word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    if overflow {
        return Err(Error::malformed_difficulty(compact, "overflow"));
    }
    if le.iter().all(|b| *b == 0) {
        return Err(Error::malformed_difficulty(compact, "zero target"));
    }

    le.reverse();
    Ok(Target::from_be_bytes(le))
}

/// Big-endian hex rendering used in mining replies
pub fn to_hex(target: &Target) -> String {
    hex::encode(target.to_be_bytes())
}
