//! The LZ byte-stream codec used for level archives.
//!
//! A compressed payload is a tag byte (`0x11`), a 24-bit little-endian uncompressed size
//! (zero means a 32-bit size follows, for very large buffers), then a stream of tokens.
//! Each group of eight tokens is prefixed by a flag byte, read MSB-first: a clear bit is
//! a single literal byte, a set bit is a back-reference into the output produced so far.
//! Back-references use the classic three-tier encoding keyed on the high nibble of their
//! first byte:
//!
//! | first nibble | token size | length          |
//! |--------------|------------|-----------------|
//! | 2..=15       | 2 bytes    | nibble + 1      |
//! | 0            | 3 bytes    | 17..=272        |
//! | 1            | 4 bytes    | 273..=65808     |
//!
//! Distances are 12 bits, stored minus one (window of 4096 bytes).

use std::cmp::min;

use super::{read, ParseError};

/// Tag byte identifying a compressed payload.
pub const LZ_TAG: u8 = 0x11;

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 0x111 + 0xFFFF;
const MAX_DISTANCE: usize = 0x1000;

/// Whether a buffer looks like a compressed payload (as opposed to a raw archive).
#[inline]
pub fn is_compressed(data: &[u8]) -> bool {
    data.first() == Some(&LZ_TAG)
}

/// Decompresses an LZ payload.
///
/// Decompression stops exactly at the declared uncompressed length. Truncated streams,
/// back-references behind the start of the output, and matches that would overrun the
/// declared length are all hard errors, never silent partial results.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut ptr = 0;

    let tag = read(data, &mut ptr, 1)?[0];
    if tag != LZ_TAG {
        return Err(ParseError::UnknownCompressionTag(tag));
    }

    let hdr = read(data, &mut ptr, 3)?;
    let mut size = u32::from_le_bytes([hdr[0], hdr[1], hdr[2], 0]) as usize;
    if size == 0 {
        // Extended 32-bit size. Can unwrap the slice-to-array conversion because the
        // success of `read` guarantees the length.
        size = u32::from_le_bytes(read(data, &mut ptr, 4)?.try_into().unwrap()) as usize;
    }

    let mut out = Vec::with_capacity(size);
    while out.len() < size {
        let flag = read(data, &mut ptr, 1)?[0];

        for bit in (0..8).rev() {
            // The final flag byte may only be partially used
            if out.len() >= size {
                break;
            }

            if flag & (1 << bit) == 0 {
                out.push(read(data, &mut ptr, 1)?[0]);
                continue;
            }

            let b1 = read(data, &mut ptr, 1)?[0];
            let (len, dist) = match b1 >> 4 {
                0 => {
                    let b = read(data, &mut ptr, 2)?;
                    let len = (((b1 & 0xF) as usize) << 4 | (b[0] >> 4) as usize) + 0x11;
                    let dist = (((b[0] & 0xF) as usize) << 8 | b[1] as usize) + 1;
                    (len, dist)
                }
                1 => {
                    let b = read(data, &mut ptr, 3)?;
                    let len = (((b1 & 0xF) as usize) << 12
                        | (b[0] as usize) << 4
                        | (b[1] >> 4) as usize)
                        + 0x111;
                    let dist = (((b[1] & 0xF) as usize) << 8 | b[2] as usize) + 1;
                    (len, dist)
                }
                nibble => {
                    let b2 = read(data, &mut ptr, 1)?[0];
                    let len = nibble as usize + 1;
                    let dist = (((b1 & 0xF) as usize) << 8 | b2 as usize) + 1;
                    (len, dist)
                }
            };

            if dist > out.len() {
                return Err(ParseError::BadBackReference { offset: ptr, distance: dist });
            }
            if out.len() + len > size {
                return Err(ParseError::BadDeclaredSize { declared: size, produced: out.len() + len });
            }

            // Byte-by-byte so self-overlapping references repeat correctly
            let start = out.len() - dist;
            for i in 0..len {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }

    Ok(out)
}

/// Compresses a buffer into an LZ payload that [`decompress`] (and the console) will
/// reproduce exactly.
///
/// Match selection is greedy longest-match; the format only requires that the round trip
/// is lossless, not that any particular token stream is produced.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);

    out.push(LZ_TAG);
    if data.is_empty() || data.len() >= 0x1000000 {
        // Extended size form (also used for empty input, where a 24-bit zero would
        // itself read as the extended-size marker)
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    } else {
        let len = data.len() as u32;
        out.extend_from_slice(&[len as u8, (len >> 8) as u8, (len >> 16) as u8]);
    }

    let mut pos = 0;
    while pos < data.len() {
        let flag_at = out.len();
        out.push(0);

        let mut flag = 0u8;
        for bit in (0..8).rev() {
            if pos >= data.len() {
                break;
            }

            let (len, dist) = longest_match(data, pos);
            if len < MIN_MATCH {
                out.push(data[pos]);
                pos += 1;
                continue;
            }

            flag |= 1 << bit;
            let d = dist - 1;
            if len <= 0x10 {
                out.push(((len - 1) << 4) as u8 | (d >> 8) as u8);
                out.push(d as u8);
            } else if len <= 0x110 {
                let l = len - 0x11;
                out.push((l >> 4) as u8);
                out.push(((l & 0xF) << 4) as u8 | (d >> 8) as u8);
                out.push(d as u8);
            } else {
                let l = len - 0x111;
                out.push(0x10 | (l >> 12) as u8);
                out.push((l >> 4) as u8);
                out.push(((l & 0xF) << 4) as u8 | (d >> 8) as u8);
                out.push(d as u8);
            }
            pos += len;
        }
        out[flag_at] = flag;
    }

    out
}

/// Finds the longest window match for the bytes at `pos`. Returns `(0, 0)` when not even
/// a minimum-length match exists.
fn longest_match(data: &[u8], pos: usize) -> (usize, usize) {
    let max_len = min(MAX_MATCH, data.len() - pos);
    if max_len < MIN_MATCH {
        return (0, 0);
    }
    let max_dist = min(MAX_DISTANCE, pos);

    let (mut best_len, mut best_dist) = (0, 0);
    for dist in 1..=max_dist {
        let mut n = 0;
        // The match source may overlap `pos`; the decompressor copies byte-by-byte, so
        // comparing against the uncompressed input is still exact
        while n < max_len && data[pos - dist + n] == data[pos + n] {
            n += 1;
        }
        if n > best_len {
            best_len = n;
            best_dist = dist;
            if n == max_len {
                break;
            }
        }
    }
    (best_len, best_dist)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(data: &[u8]) {
        let packed = compress(data);
        assert!(is_compressed(&packed));
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn round_trip_empty() {
        round_trip(&[]);
    }

    #[test]
    fn round_trip_short_literals() {
        round_trip(b"abcdefg");
    }

    #[test]
    fn round_trip_repetitive() {
        round_trip(&[0xAB; 4000]);
        round_trip(b"course!course!course!course!course!xyz");
    }

    #[test]
    fn round_trip_long_matches() {
        // Long enough to exercise the 3- and 4-byte match tokens
        let data = vec![7u8; 70_000];
        round_trip(&data);
    }

    #[test]
    fn round_trip_mixed() {
        let mut data = Vec::new();
        let mut x: u32 = 0x1234_5678;
        for i in 0..6000 {
            // cheap xorshift noise with periodic runs mixed in
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            if i % 7 == 0 {
                data.extend_from_slice(&[0u8; 11]);
            }
            data.push(x as u8);
        }
        round_trip(&data);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let packed = compress(b"hello hello hello hello");
        assert!(decompress(&packed[..packed.len() - 3]).is_err());
    }

    #[test]
    fn bad_back_reference_is_an_error() {
        // One flag byte with the first bit set, then a 2-byte match reaching behind
        // the start of the output
        let payload = [LZ_TAG, 8, 0, 0, 0x80, 0x20, 0x10];
        assert!(matches!(
            decompress(&payload),
            Err(ParseError::BadBackReference { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            decompress(&[0x40, 1, 0, 0, 0xAA]),
            Err(ParseError::UnknownCompressionTag(0x40))
        ));
    }
}
