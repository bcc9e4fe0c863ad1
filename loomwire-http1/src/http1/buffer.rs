//! Append-only message storage.
//!
//! While a message is being accumulated, fields are addressed by [`Span`]s
//! (offset and length) instead of references, so growing the buffer never
//! invalidates anything already captured. Once a region stops growing the
//! buffer is frozen and spans turn into [`Bytes`] views that share ownership
//! of the frozen storage.

use bytes::{Bytes, BytesMut};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn extend(&mut self, len: usize) {
        self.len += len;
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug, Default)]
pub struct BackingBuffer {
    bytes: BytesMut,
}

impl BackingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `fragment` and returns the offset it was written at.
    pub fn append(&mut self, fragment: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(fragment);
        offset
    }

    pub fn freeze(self) -> FrozenBuffer {
        FrozenBuffer {
            bytes: self.bytes.freeze(),
        }
    }
}

/// A backing buffer that no longer accepts appends.
#[derive(Debug, Clone, Default)]
pub struct FrozenBuffer {
    bytes: Bytes,
}

impl FrozenBuffer {
    pub fn view(&self, span: Span) -> Result<Bytes, ParseError> {
        if span.end() > self.bytes.len() {
            return Err(ParseError::Defect(format!(
                "span {}..{} outside buffer of {} bytes",
                span.offset,
                span.end(),
                self.bytes.len()
            )));
        }
        Ok(self.bytes.slice(span.offset..span.end()))
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
