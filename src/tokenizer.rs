//! Delimiter based line splitting with a hard cap on line length

use alloc::vec::Vec;

use bytes::{Buf, Bytes, BytesMut};

use crate::{
    constants::{DEFAULT_DELIMITER, MAX_LINE_LENGTH},
    errors::LineTooLong,
};

/// Buffers bytes until a delimiter shows up and hands back everything before it.
///
/// Lines are never truncated, a line that grows past the limit (terminated or not) is an error and the buffer is dropped.
#[derive(Debug, Clone)]
pub struct LineTokenizer {
    buffer: BytesMut,
    delimiter: Bytes,
    max_line_length: usize,
    // everything before this offset is known not to start a delimiter
    searched: usize,
}

impl Default for LineTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTokenizer {
    /// Splits on `\r` with lines of up to 1 MiB
    pub fn new() -> Self {
        Self::with_delimiter(Bytes::from_static(DEFAULT_DELIMITER), MAX_LINE_LENGTH)
    }

    /// An empty `delimiter` falls back to the default
    pub fn with_delimiter(delimiter: impl Into<Bytes>, max_line_length: usize) -> Self {
        let mut delimiter = delimiter.into();
        if delimiter.is_empty() {
            delimiter = Bytes::from_static(DEFAULT_DELIMITER);
        }

        Self {
            buffer: BytesMut::new(),
            delimiter,
            max_line_length,
            searched: 0,
        }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Bytes waiting for a delimiter
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    // decoders write straight into the line buffer, appending never invalidates `searched`
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.searched = 0;
    }

    fn find_delimiter(&self) -> Option<usize> {
        let haystack = &self.buffer[self.searched..];
        let found = match self.delimiter.as_ref() {
            [byte] => memchr::memchr(*byte, haystack),
            delimiter => memchr::memmem::find(haystack, delimiter),
        }?;
        Some(self.searched + found)
    }

    // trailing bytes that could still turn into a delimiter once more data arrives
    fn partial_delimiter_len(&self) -> usize {
        (1..self.delimiter.len())
            .rev()
            .find(|&len| self.buffer.ends_with(&self.delimiter[..len]))
            .unwrap_or(0)
    }

    /// Takes the next complete line out of the buffer, without its delimiter.
    /// Returns [None] when no delimiter has arrived yet.
    pub fn next_line(&mut self) -> Result<Option<Bytes>, LineTooLong> {
        let limit = LineTooLong {
            limit: self.max_line_length,
        };

        match self.find_delimiter() {
            Some(line_end) => {
                self.searched = 0;
                let line = self.buffer.split_to(line_end).freeze();
                self.buffer.advance(self.delimiter.len());

                if line.len() > self.max_line_length {
                    self.clear();
                    return Err(limit);
                }
                Ok(Some(line))
            }
            None => {
                if self.buffer.len() - self.partial_delimiter_len() > self.max_line_length {
                    self.clear();
                    return Err(limit);
                }
                // a delimiter may straddle the end of the buffer
                self.searched = self
                    .buffer
                    .len()
                    .saturating_sub(self.delimiter.len() - 1);
                Ok(None)
            }
        }
    }

    /// Appends `bytes` and drains every line that is now complete
    pub fn extract(&mut self, bytes: &[u8]) -> Result<Vec<Bytes>, LineTooLong> {
        self.extend(bytes);
        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            lines.push(line);
        }
        Ok(lines)
    }
}
