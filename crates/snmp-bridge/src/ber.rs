// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// BER (X.690) primitives for the SNMP subset.
//
// All parsing is bounds-checked: malformed input returns Err, never panics.

use crate::codec::{DecodeError, EncodeError};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OBJECT_IDENTIFIER: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;

// Application class (SMIv2)
pub const TAG_IP_ADDRESS: u8 = 0x40;
pub const TAG_COUNTER32: u8 = 0x41;
pub const TAG_GAUGE32: u8 = 0x42;
pub const TAG_TIMETICKS: u8 = 0x43;
pub const TAG_OPAQUE: u8 = 0x44;
pub const TAG_COUNTER64: u8 = 0x46;

// Context class, primitive (varbind exceptions)
pub const TAG_NO_SUCH_OBJECT: u8 = 0x80;
pub const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
pub const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Longest length prefix accepted (0x84 + 4 bytes).
const MAX_LENGTH_OCTETS: usize = 4;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over a BER buffer.
///
/// `base` is the absolute offset of `buf[0]` in the original datagram so
/// errors from nested readers still point at the right byte.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            base: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Absolute offset of the cursor.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Result<u8, DecodeError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::Truncated(self.offset()))
    }

    /// Read one TLV. Returns the tag and a reader over its contents.
    pub fn read_tlv(&mut self) -> Result<(u8, Reader<'a>), DecodeError> {
        let tag_offset = self.offset();
        let tag = self.peek_tag()?;
        if tag & 0x1f == 0x1f {
            // High-tag-number form never appears in SNMP.
            return Err(DecodeError::UnexpectedTag {
                offset: tag_offset,
                expected: "low-number tag",
                found: tag,
            });
        }
        self.pos += 1;

        let len = self.read_length()?;
        if len > self.remaining() {
            return Err(DecodeError::Truncated(self.offset()));
        }

        let content = Reader {
            buf: &self.buf[self.pos..self.pos + len],
            pos: 0,
            base: self.offset(),
        };
        self.pos += len;
        Ok((tag, content))
    }

    /// Read one TLV and require a specific tag.
    pub fn expect(&mut self, tag: u8, what: &'static str) -> Result<Reader<'a>, DecodeError> {
        let offset = self.offset();
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(DecodeError::UnexpectedTag {
                offset,
                expected: what,
                found,
            });
        }
        Ok(content)
    }

    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let offset = self.offset();
        let first = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::Truncated(offset))?;
        self.pos += 1;

        if first < 0x80 {
            return Ok(first as usize);
        }

        // 0x80 is the indefinite form, not allowed in SNMP.
        let n = (first & 0x7f) as usize;
        if n == 0 || n > MAX_LENGTH_OCTETS {
            return Err(DecodeError::InvalidLength(offset));
        }
        if n > self.remaining() {
            return Err(DecodeError::Truncated(self.offset()));
        }

        let mut len = 0usize;
        for _ in 0..n {
            len = (len << 8) | self.buf[self.pos] as usize;
            self.pos += 1;
        }
        Ok(len)
    }

    /// Consume the rest of the buffer.
    pub fn bytes(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        out
    }

    /// Error out if anything is left in this reader.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.remaining()))
        }
    }

    pub fn read_i64(&mut self, tag: u8, what: &'static str) -> Result<i64, DecodeError> {
        let mut content = self.expect(tag, what)?;
        decode_i64(content.bytes())
    }
}

// ---------------------------------------------------------------------------
// Content decoders
// ---------------------------------------------------------------------------

/// Two's complement, big-endian, 1 to 8 octets.
pub fn decode_i64(bytes: &[u8]) -> Result<i64, DecodeError> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(DecodeError::InvalidInteger);
    }
    let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in bytes {
        value = (value << 8) | b as i64;
    }
    Ok(value)
}

/// Unsigned, big-endian. A ninth octet is allowed only as a leading zero.
pub fn decode_u64(bytes: &[u8]) -> Result<u64, DecodeError> {
    let bytes = match bytes {
        [] => return Err(DecodeError::InvalidInteger),
        [0, rest @ ..] if rest.len() == 8 => rest,
        b if b.len() > 8 => return Err(DecodeError::InvalidInteger),
        b => b,
    };
    if bytes.len() < 8 && bytes[0] & 0x80 != 0 {
        // Negative encoding for an unsigned type.
        return Err(DecodeError::IntegerOutOfRange("unsigned"));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Unsigned 32-bit application value (Counter32, Gauge32, TimeTicks).
///
/// Some agents drop the leading zero on values of 2^31 and above, so up to
/// four octets are read as unsigned whatever the high bit.
pub fn decode_u32(bytes: &[u8], what: &'static str) -> Result<u32, DecodeError> {
    if (1..=4).contains(&bytes.len()) {
        return Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32));
    }
    u32::try_from(decode_u64(bytes)?).map_err(|_| DecodeError::IntegerOutOfRange(what))
}

/// Decode OID contents into dotted form (no leading dot).
pub fn decode_oid(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::InvalidOid);
    }

    let mut arcs: Vec<u64> = Vec::with_capacity(bytes.len() + 1);
    let mut value: u64 = 0;
    let mut in_progress = false;
    for &b in bytes {
        if value > (u64::MAX >> 7) {
            return Err(DecodeError::InvalidOid);
        }
        value = (value << 7) | (b & 0x7f) as u64;
        in_progress = true;
        if b & 0x80 == 0 {
            if arcs.is_empty() {
                let (first, second) = match value {
                    v if v < 40 => (0, v),
                    v if v < 80 => (1, v - 40),
                    v => (2, v - 80),
                };
                arcs.push(first);
                arcs.push(second);
            } else {
                arcs.push(value);
            }
            // Sub-identifiers are limited to 32 bits (RFC 2578).
            if arcs.last().is_some_and(|&arc| arc > u32::MAX as u64) {
                return Err(DecodeError::InvalidOid);
            }
            value = 0;
            in_progress = false;
        }
    }
    if in_progress {
        // Last sub-identifier had its continuation bit set.
        return Err(DecodeError::InvalidOid);
    }

    Ok(arcs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

pub fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

/// Minimal two's complement encoding.
pub fn encode_i64(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let b = bytes[start];
        let next_high = bytes[start + 1] & 0x80;
        if (b == 0x00 && next_high == 0) || (b == 0xff && next_high != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

/// Minimal unsigned encoding, with a leading zero when the high bit is set.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    let mut out = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Encode a dotted OID (leading dot allowed) into BER contents.
pub fn encode_oid(oid: &str) -> Result<Vec<u8>, EncodeError> {
    let invalid = || EncodeError::InvalidOid(oid.to_string());

    let arcs = parse_oid(oid).ok_or_else(invalid)?;
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return Err(invalid());
    }

    let first = arcs[0] as u64 * 40 + arcs[1] as u64;
    let mut out = Vec::with_capacity(arcs.len() + 4);
    push_subidentifier(&mut out, first);
    for &arc in &arcs[2..] {
        push_subidentifier(&mut out, arc as u64);
    }
    Ok(out)
}

fn push_subidentifier(out: &mut Vec<u8>, mut value: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (idx, b) in tmp.iter().enumerate().skip(i) {
        out.push(if idx == last { *b } else { *b | 0x80 });
    }
}

/// Parse a dotted-numeric OID into arcs. Returns `None` if malformed.
pub fn parse_oid(oid: &str) -> Option<Vec<u32>> {
    let trimmed = oid.strip_prefix('.').unwrap_or(oid);
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .split('.')
        .map(|arc| {
            if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                arc.parse::<u32>().ok()
            }
        })
        .collect()
}
