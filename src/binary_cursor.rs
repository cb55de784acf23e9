//! Endianness-aware primitive reads over a borrowed byte buffer.
//!
//! The read position is owned by the caller and passed in on every call, so
//! several cursors with different byte orders can walk the same buffer (the
//! file meta group is always little endian, the data set that follows may
//! not be).
//!
//! Reads never panic on malformed input: a read that would run past the end
//! of the buffer yields a zero value and still advances the position by the
//! nominal width. Callers that need to distinguish truncation check
//! [`BinaryCursor::remaining`] before reading.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Clone, Copy, Debug)]
pub struct BinaryCursor<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl<'a> BinaryCursor<'a> {
    pub fn new(bytes: &'a [u8], little_endian: bool) -> Self {
        Self {
            bytes,
            little_endian,
        }
    }

    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes left after `offset`, zero once the offset ran past the end.
    pub fn remaining(&self, offset: usize) -> usize {
        self.bytes.len().saturating_sub(offset)
    }

    /// Borrow `width` bytes at `offset` and advance, or `None` if they are not
    /// all present.
    #[inline]
    fn take(&self, offset: &mut usize, width: usize) -> Option<&'a [u8]> {
        let start = *offset;
        *offset = start.saturating_add(width);
        let end = start.checked_add(width)?;
        self.bytes.get(start..end)
    }

    pub fn read_byte(&self, offset: &mut usize) -> u8 {
        self.take(offset, 1).map_or(0, |b| b[0])
    }

    pub fn read_short(&self, offset: &mut usize) -> u16 {
        match self.take(offset, 2) {
            Some(b) if self.little_endian => LittleEndian::read_u16(b),
            Some(b) => BigEndian::read_u16(b),
            None => 0,
        }
    }

    pub fn read_int(&self, offset: &mut usize) -> i32 {
        match self.take(offset, 4) {
            Some(b) if self.little_endian => LittleEndian::read_i32(b),
            Some(b) => BigEndian::read_i32(b),
            None => 0,
        }
    }

    /// Unsigned view of [`read_int`](Self::read_int), used for value lengths.
    pub fn read_uint(&self, offset: &mut usize) -> u32 {
        self.read_int(offset) as u32
    }

    pub fn read_float(&self, offset: &mut usize) -> f32 {
        match self.take(offset, 4) {
            Some(b) if self.little_endian => LittleEndian::read_f32(b),
            Some(b) => BigEndian::read_f32(b),
            None => 0.0,
        }
    }

    pub fn read_double(&self, offset: &mut usize) -> f64 {
        match self.take(offset, 8) {
            Some(b) if self.little_endian => LittleEndian::read_f64(b),
            Some(b) => BigEndian::read_f64(b),
            None => 0.0,
        }
    }

    /// Decode `length` bytes as UTF-8 (lossy), dropping a terminating NUL and
    /// any trailing padding.
    pub fn read_string(&self, offset: &mut usize, length: usize) -> String {
        let Some(raw) = self.take(offset, length) else {
            return String::new();
        };
        let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
        String::from_utf8_lossy(raw)
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string()
    }

    /// Read a 16-bit lookup table and keep the high byte of every entry.
    ///
    /// Returns `None` for an odd `length` or a region past the end of the
    /// buffer; the offset advances by `length` either way.
    pub fn read_lut(&self, offset: &mut usize, length: usize) -> Option<Vec<u8>> {
        let raw = self.take(offset, length)?;
        if length % 2 != 0 {
            return None;
        }
        Some(
            raw.chunks_exact(2)
                .map(|entry| {
                    let value = if self.little_endian {
                        LittleEndian::read_u16(entry)
                    } else {
                        BigEndian::read_u16(entry)
                    };
                    (value >> 8) as u8
                })
                .collect(),
        )
    }

    /// Copy `length` raw bytes, zero-filled past the end of the buffer.
    pub fn read_bytes(&self, offset: &mut usize, length: usize) -> Vec<u8> {
        let start = (*offset).min(self.bytes.len());
        let end = offset.saturating_add(length).min(self.bytes.len());
        let mut out = self.bytes[start..end].to_vec();
        out.resize(length, 0);
        *offset = offset.saturating_add(length);
        out
    }

    pub fn skip(&self, offset: &mut usize, length: usize) {
        *offset = offset.saturating_add(length);
    }
}
