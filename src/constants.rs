use core::time::Duration;

pub(crate) const CR: u8 = b'\r';

/// Line terminator the stream is tokenized on unless configured otherwise
pub const DEFAULT_DELIMITER: &[u8] = &[CR];
/// Longest line the tokenizer will buffer before giving up on the stream, 1 MiB
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Most encoded input handed to the decoder between line-length checks
pub(crate) const DECODE_STEP: usize = 16 * 1024;

pub(crate) const START: Duration = Duration::from_millis(250);
pub(crate) const INCREMENT: Duration = Duration::from_millis(250);
pub(crate) const MAX_DELAY: Duration = Duration::from_secs(16);
pub(crate) const MAX_RECONNECTS: u32 = 10;
pub(crate) const MAX_TIMEOUT: Duration = Duration::from_secs(320);
