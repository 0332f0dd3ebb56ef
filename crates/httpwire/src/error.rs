//! Errors related to this crate.

use std::fmt::Display;

use thiserror::Error;

use crate::nomutil::NomParseError;

/// General purpose error.
///
/// Every variant is terminal for the stream or read that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// Input did not match the expected grammar.
    #[error("malformed syntax")]
    MalformedSyntax(#[from] ParseError),

    /// Structurally invalid message framing.
    #[error("protocol violation")]
    ProtocolViolation(#[from] Violation),

    /// Unrecognized transfer or content coding name.
    #[error("unsupported coding `{0}`")]
    UnsupportedCoding(String),

    /// Decoded body would exceed the configured maximum length.
    #[error("read limit of {limit} bytes exceeded")]
    ReadLimitExceeded {
        /// The configured maximum.
        limit: u64,
    },

    /// IO error from the underlying byte source.
    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        // Stream wrappers box our own errors inside io::Error.
        if !error.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Self::Io(error);
        }

        let kind = error.kind();

        match error.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io(std::io::Error::new(kind, other)),
            None => Self::Io(kind.into()),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(error) => error,
            Error::ReadLimitExceeded { .. } => {
                std::io::Error::new(std::io::ErrorKind::Other, error)
            }
            Error::ProtocolViolation(Violation::Truncated) => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, error)
            }
            _ => std::io::Error::new(std::io::ErrorKind::InvalidData, error),
        }
    }
}

/// Kinds of framing violations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Source ended before the framing said the message was complete.
    #[error("truncation detected")]
    Truncated,

    /// Chunk data was not followed by an empty line.
    #[error("invalid chunk termination")]
    InvalidChunkTermination,

    /// Continuation line appeared before any header.
    #[error("cannot parse headers: continuation line without a preceding header")]
    OrphanContinuation,

    /// Content-Length values disagree.
    #[error("conflicting content-length values")]
    ConflictingContentLength,

    /// Line or header section exceeded the configured length limit.
    #[error("line too long")]
    LineTooLong,
}

/// Error during parsing indicating malformed or invalid character sequences.
#[derive(Debug, Error)]
pub struct ParseError(ParseErrorImpl);

impl ParseError {
    /// Offset where the final error occurred in the input.
    pub fn offset(&self) -> u64 {
        match &self.0 {
            ParseErrorImpl::Nom(error) => error.offset(),
            ParseErrorImpl::Other(_) => 0,
        }
    }

    /// A segment of the input near where the error occurred.
    pub fn input(&self) -> &[u8] {
        match &self.0 {
            ParseErrorImpl::Nom(error) => error.input(),
            ParseErrorImpl::Other(_) => b"",
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            ParseErrorImpl::Nom(error) => error.fmt(f),
            ParseErrorImpl::Other(message) => f.write_str(message),
        }
    }
}

impl From<NomParseError> for ParseError {
    fn from(error: NomParseError) -> Self {
        Self(ParseErrorImpl::Nom(error))
    }
}

impl From<&str> for ParseError {
    fn from(error: &str) -> Self {
        Self(ParseErrorImpl::Other(error.to_string()))
    }
}

impl From<String> for ParseError {
    fn from(error: String) -> Self {
        Self(ParseErrorImpl::Other(error))
    }
}

#[derive(Debug)]
enum ParseErrorImpl {
    Nom(NomParseError),
    Other(String),
}

/// Formats an error chain to a string.
///
/// This function can be used to express error messages that pass outside
/// the Rust boundary.
pub fn format_to_string<E: std::error::Error>(error: E) -> String {
    let mut message = String::new();

    message.push_str(&error.to_string());

    let mut child_error = error.source();

    while let Some(error) = child_error {
        message.push_str(": ");
        message.push_str(&error.to_string());

        child_error = error.source();
    }

    message
}
