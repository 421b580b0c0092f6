//! Mapping of response status codes and encodings onto what the stream should do next

/// What a response status means for the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// 200, the body is the stream
    Success,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 406
    NotAcceptable,
    /// 413
    PayloadTooLarge,
    /// 416
    RangeNotSatisfiable,
    /// 420, the server wants us to calm down
    RateLimited,
    /// Any status without a meaning of its own
    ProtocolError(u16),
}

impl Outcome {
    pub fn classify(status_code: u16) -> Self {
        match status_code {
            200 => Outcome::Success,
            401 => Outcome::Unauthorized,
            403 => Outcome::Forbidden,
            404 => Outcome::NotFound,
            406 => Outcome::NotAcceptable,
            413 => Outcome::PayloadTooLarge,
            416 => Outcome::RangeNotSatisfiable,
            420 => Outcome::RateLimited,
            other => Outcome::ProtocolError(other),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success => 200,
            Outcome::Unauthorized => 401,
            Outcome::Forbidden => 403,
            Outcome::NotFound => 404,
            Outcome::NotAcceptable => 406,
            Outcome::PayloadTooLarge => 413,
            Outcome::RangeNotSatisfiable => 416,
            Outcome::RateLimited => 420,
            Outcome::ProtocolError(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Shorthand for [`Outcome::classify`]
pub fn classify(status_code: u16) -> Outcome {
    Outcome::classify(status_code)
}

/// Body encodings the stream knows how to undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Reads a `Content-Encoding` header value, only an exact `gzip` selects [`ContentEncoding::Gzip`]
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("gzip") => ContentEncoding::Gzip,
            _ => ContentEncoding::Identity,
        }
    }
}
