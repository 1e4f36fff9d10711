//! Forward-only read cursor over an encoded buffer.

use crate::error::DecodeError;
use crate::varint;

/// A read position within a borrowed buffer.
///
/// Every read is bounds-checked; nothing ever moves the position backwards.
/// Sub-cursors created with [`Cursor::split`] keep reporting offsets relative
/// to the outermost buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, base: 0 }
    }

    /// Offset of the next unread byte, counted from the start of the outermost buffer.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes consumed from this cursor's own buffer.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.buf.get(self.pos).ok_or(DecodeError::TruncatedInput {
            needed: 1,
            remaining: 0,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Takes the next `len` bytes.
    pub fn take(&mut self, len: u64) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= remaining)
            .ok_or(DecodeError::TruncatedInput { needed: len, remaining })?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N as u64)?);
        Ok(out)
    }

    /// Splits off the next `len` bytes as an independent cursor.
    pub fn split(&mut self, len: u64) -> Result<Cursor<'a>, DecodeError> {
        let base = self.offset();
        let buf = self.take(len)?;
        Ok(Cursor { buf, pos: 0, base })
    }

    pub fn read_unsigned(&mut self) -> Result<u64, DecodeError> {
        let (value, consumed) =
            varint::decode_unsigned(self.buf, self.pos).map_err(|err| self.rebase(err))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_varint(&mut self) -> Result<i64, DecodeError> {
        Ok(varint::unzigzag(self.read_unsigned()?))
    }

    fn rebase(&self, err: DecodeError) -> DecodeError {
        match err {
            DecodeError::TruncatedVarint { offset } => {
                DecodeError::TruncatedVarint { offset: self.base + offset }
            }
            DecodeError::VarintOverflow { offset } => {
                DecodeError::VarintOverflow { offset: self.base + offset }
            }
            other => other,
        }
    }
}
