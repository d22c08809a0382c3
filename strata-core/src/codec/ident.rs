//! Identifier packing into two machine words
//!
//! An identifier's first 8 characters go into the high word and the next 8
//! into the low word, each as a base-65 number: digit 0 is padding, digits
//! 1..=64 index the alphabet `0-9A-Za-z-_`. 65^8 < 2^64, so a full chunk
//! always fits. Characters beyond [`MAX_IDENTIFIER_LEN`] are dropped.

use crate::core::{CodecError, IdentifierField};

/// Characters kept per word
pub const CHUNK_LEN: usize = 8;

/// Characters that survive encoding; longer identifiers are truncated
pub const MAX_IDENTIFIER_LEN: usize = 2 * CHUNK_LEN;

const RADIX: u64 = 65;

const ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

#[inline]
fn digit_of(ch: char) -> Option<u64> {
    let idx = match ch {
        '0'..='9' => ch as u64 - '0' as u64,
        'A'..='Z' => ch as u64 - 'A' as u64 + 10,
        'a'..='z' => ch as u64 - 'a' as u64 + 36,
        '-' => 62,
        '_' => 63,
        _ => return None,
    };
    Some(idx + 1)
}

fn unpack_chunk(mut word: u64, out: &mut String) {
    let mut digits = [0u8; CHUNK_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = (word % RADIX) as u8;
        word /= RADIX;
    }
    // Padding only ever trails; stop at the first zero digit
    for digit in digits {
        if digit == 0 {
            break;
        }
        out.push(ALPHABET[(digit - 1) as usize] as char);
    }
}

/// Pack an identifier into (high, low) words.
///
/// Characters past [`MAX_IDENTIFIER_LEN`] are ignored, counted in chars the
/// same way as [`truncated`]. An out-of-alphabet character within the kept
/// prefix is an error.
pub fn pack(id: &str, field: IdentifierField) -> Result<(u64, u64), CodecError> {
    let mut words = [0u64; 2];
    let mut chars = id.chars();
    for word in words.iter_mut() {
        for _ in 0..CHUNK_LEN {
            let digit = match chars.next() {
                Some(ch) => digit_of(ch).ok_or(CodecError::InvalidIdentifier { field, ch })?,
                None => 0,
            };
            *word = *word * RADIX + digit;
        }
    }
    Ok((words[0], words[1]))
}

/// Inverse of [`pack`] for the kept prefix
pub fn unpack(hi: u64, lo: u64) -> String {
    let mut out = String::with_capacity(MAX_IDENTIFIER_LEN);
    unpack_chunk(hi, &mut out);
    if out.len() == CHUNK_LEN {
        unpack_chunk(lo, &mut out);
    }
    out
}

/// The part of `id` that survives a pack/unpack cycle
pub fn truncated(id: &str) -> &str {
    match id.char_indices().nth(MAX_IDENTIFIER_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
