//! Undoing the response's `Content-Encoding` before the bytes reach the tokenizer

use bytes::BytesMut;

#[cfg(feature = "gzip")]
pub use crate::errors::DecodeError;
use crate::{errors::ItemError, status::ContentEncoding};

/// Turns raw body bytes into line-ready bytes
#[derive(Debug, Default)]
pub enum Decoder {
    /// The body is used as is
    #[default]
    Passthrough,
    /// The body is a single gzip member inflated as it arrives
    #[cfg(feature = "gzip")]
    Gzip(GzipDecoder),
}

impl Decoder {
    /// Picks the decoder for an encoding. Without the `gzip` feature everything is passed through.
    pub fn for_encoding(encoding: ContentEncoding) -> Self {
        match encoding {
            ContentEncoding::Identity => Decoder::Passthrough,
            #[cfg(feature = "gzip")]
            ContentEncoding::Gzip => Decoder::Gzip(GzipDecoder::new()),
            #[cfg(not(feature = "gzip"))]
            ContentEncoding::Gzip => {
                tracing::warn!("gzip body received without the gzip feature, passing it through");
                Decoder::Passthrough
            }
        }
    }

    pub fn encoding(&self) -> ContentEncoding {
        match self {
            Decoder::Passthrough => ContentEncoding::Identity,
            #[cfg(feature = "gzip")]
            Decoder::Gzip(_) => ContentEncoding::Gzip,
        }
    }

    /// Decodes a prefix of `input` into `out` and returns how many input bytes it used.
    ///
    /// Gzip output from one call is capped by the inflater's window, so a caller checking `out` between calls never
    /// holds more than one step of decompressed data past its own limit. Zero means the decoder takes no more input.
    pub fn decode_step(&mut self, input: &[u8], out: &mut BytesMut) -> Result<usize, ItemError> {
        match self {
            Decoder::Passthrough => {
                out.extend_from_slice(input);
                Ok(input.len())
            }
            #[cfg(feature = "gzip")]
            Decoder::Gzip(gzip) => gzip.decode_step(input, out).map_err(ItemError::from),
        }
    }

    /// Decodes all of `input` in one go, with no bound on how much lands in `out`
    pub fn decode_into(&mut self, mut input: &[u8], out: &mut BytesMut) -> Result<(), ItemError> {
        while !input.is_empty() {
            let used = self.decode_step(input, out)?;
            if used == 0 {
                tracing::debug!(bytes = input.len(), "ignoring data after the end of the encoded body");
                break;
            }
            input = &input[used..];
        }
        Ok(())
    }
}

/// Streaming gzip inflater, input can be split anywhere including inside the header
#[cfg(feature = "gzip")]
pub struct GzipDecoder {
    inner: flate2::write::GzDecoder<Vec<u8>>,
}

#[cfg(feature = "gzip")]
impl core::fmt::Debug for GzipDecoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GzipDecoder")
            .field("buffered", &self.inner.get_ref().len())
            .finish()
    }
}

#[cfg(feature = "gzip")]
impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "gzip")]
impl GzipDecoder {
    pub fn new() -> Self {
        Self {
            inner: flate2::write::GzDecoder::new(Vec::new()),
        }
    }

    /// One bounded inflate step, see [`Decoder::decode_step`]
    pub fn decode_step(&mut self, input: &[u8], out: &mut BytesMut) -> Result<usize, DecodeError> {
        use std::io::Write;

        let used = self.inner.write(input)?;
        // the inflater holds output back until the next write unless flushed
        self.inner.flush()?;

        let decoded = self.inner.get_mut();
        out.extend_from_slice(decoded);
        decoded.clear();
        Ok(used)
    }
}
