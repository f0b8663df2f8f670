// src/utils/error.rs

use std::fmt;

/// The primary error type for all operations in the XTC encoder library.
#[derive(Debug)]
pub enum XtcError {
    /// An error occurred during I/O operations (e.g., file not found, permission denied).
    Io(std::io::Error),
    /// An option value is outside its enumerated or clamped range.
    InvalidOption(String),
    /// An upstream source produced no frame or a frame that could not be decoded.
    FrameDecode(String),
    /// A container file failed structural validation (magic, offsets, index).
    MalformedContainer(String),
    /// A page chunk inside a container is truncated or inconsistent.
    MalformedChunk(String),
    /// The conversion was cancelled cooperatively.
    Cancelled,
    /// A large buffer could not be allocated even after releasing pooled memory.
    ResourceExhausted(String),
    /// An internal invariant was violated while assembling output. Always a bug.
    InternalInvariant(String),
}

impl std::error::Error for XtcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XtcError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for XtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XtcError::Io(err) => write!(f, "I/O error: {}", err),
            XtcError::InvalidOption(msg) => write!(f, "Invalid option: {}", msg),
            XtcError::FrameDecode(msg) => write!(f, "Frame decode failure: {}", msg),
            XtcError::MalformedContainer(msg) => write!(f, "Malformed container: {}", msg),
            XtcError::MalformedChunk(msg) => write!(f, "Malformed chunk: {}", msg),
            XtcError::Cancelled => write!(f, "Conversion cancelled"),
            XtcError::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            XtcError::InternalInvariant(msg) => write!(f, "Internal invariant violated: {}", msg),
        }
    }
}

impl From<std::io::Error> for XtcError {
    fn from(err: std::io::Error) -> Self {
        XtcError::Io(err)
    }
}

/// A specialized `Result` type for XTC operations.
pub type Result<T> = std::result::Result<T, XtcError>;
