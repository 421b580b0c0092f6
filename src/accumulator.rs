//! Turns decoded body bytes into complete items

use bytes::{Buf, Bytes, BytesMut};
use bytes_utils::Str;

use crate::{constants::DECODE_STEP, decoder::Decoder, errors::ItemError, tokenizer::LineTokenizer};

fn validate_bytes(val: Bytes) -> Result<Str, core::str::Utf8Error> {
    match core::str::from_utf8(val.as_ref()) {
        Ok(_) => Ok(unsafe { Str::from_inner_unchecked(val) }),
        Err(e) => Err(e),
    }
}

fn trim_ascii_whitespace(line: Bytes) -> Bytes {
    let Some(start) = line.iter().position(|b| !b.is_ascii_whitespace()) else {
        return Bytes::new();
    };
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(line.len(), |pos| pos + 1);
    line.slice(start..end)
}

/// Per-connection item buffer: bytes go in through the [`Decoder`], complete lines come out as items.
///
/// Blank lines are keep-alives and never come out as items. Fed bytes are only decoded while no complete line is
/// buffered, a step at a time, so the line buffer stays within one decode step of the line limit no matter how well
/// the body compresses.
#[derive(Debug, Default)]
pub struct ItemAccumulator {
    decoder: Decoder,
    tokenizer: LineTokenizer,
    undecoded: BytesMut,
}

impl ItemAccumulator {
    pub fn new(decoder: Decoder, tokenizer: LineTokenizer) -> Self {
        Self {
            decoder,
            tokenizer,
            undecoded: BytesMut::new(),
        }
    }

    pub fn with_decoder(decoder: Decoder) -> Self {
        Self::new(decoder, LineTokenizer::new())
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Partial item waiting for its terminator
    pub fn pending(&self) -> &[u8] {
        self.tokenizer.pending()
    }

    /// Received bytes the decoder has not been given yet
    pub fn undecoded(&self) -> &[u8] {
        &self.undecoded
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.undecoded.extend_from_slice(bytes);
    }

    fn decode_step(&mut self) -> Result<(), ItemError> {
        let end = self.undecoded.len().min(DECODE_STEP);
        let used = self
            .decoder
            .decode_step(&self.undecoded[..end], self.tokenizer.buffer_mut())?;

        if used == 0 {
            tracing::debug!(
                bytes = self.undecoded.len(),
                "ignoring data after the end of the encoded body"
            );
            self.undecoded.clear();
        } else {
            self.undecoded.advance(used);
        }
        Ok(())
    }

    /// Next complete, non-blank item. Returns [None] once everything fed so far is decoded and the buffer only holds
    /// a partial line.
    pub fn next_item(&mut self) -> Result<Option<Str>, ItemError> {
        loop {
            match self.tokenizer.next_line()? {
                Some(line) => {
                    let line = trim_ascii_whitespace(line);
                    if line.is_empty() {
                        tracing::trace!("skipping keep-alive line");
                        continue;
                    }
                    return Ok(Some(validate_bytes(line)?));
                }
                None if self.undecoded.is_empty() => return Ok(None),
                None => self.decode_step()?,
            }
        }
    }

    /// Drops whatever partial item is buffered
    pub fn reset(&mut self) {
        self.undecoded.clear();
        self.tokenizer.clear();
    }
}
