//! Maximum length enforcement for body streams.
use std::io::{BufRead, Read};

use crate::error::{Error, Violation};

/// Reader that never delivers more than a maximum number of bytes.
///
/// Once the maximum has been delivered, the next read fails with
/// [Error::ReadLimitExceeded] if the source still has data. Without a
/// declared length, a source that ends exactly at the maximum reads as an
/// ordinary EOF.
///
/// When a declared length is given, the effective bound is the smaller of
/// the two. A body that reaches its declared length ends normally, and a
/// source that ends before the declared length is a truncation. A declared
/// length above the maximum always fails at the maximum.
#[derive(Debug)]
pub struct BoundedReader<R: BufRead> {
    stream: R,
    max_length: u64,
    declared_length: Option<u64>,
    position: u64,
}

impl<R: BufRead> BoundedReader<R> {
    /// Creates a `BoundedReader` with the given stream and ceiling.
    ///
    /// `declared_length` is `None` when the body length isn't known in
    /// advance, such as when a transfer coding is applied.
    pub fn new(stream: R, max_length: u64, declared_length: Option<u64>) -> Self {
        Self {
            stream,
            max_length,
            declared_length,
            position: 0,
        }
    }

    /// Returns a reference to the wrapped stream.
    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    /// Returns a mutable reference to the wrapped stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Number of bytes delivered so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The configured ceiling.
    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    /// The declared body length, if any.
    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }

    fn bound(&self) -> u64 {
        match self.declared_length {
            Some(length) => length.min(self.max_length),
            None => self.max_length,
        }
    }

    fn check_at_bound(&mut self) -> std::io::Result<()> {
        match self.declared_length {
            Some(length) if length <= self.max_length => return Ok(()),
            Some(_) => {}
            None => {
                if self.stream.fill_buf()?.is_empty() {
                    return Ok(());
                }
            }
        }

        tracing::debug!(limit = self.max_length, "read limit exceeded");

        Err(Error::ReadLimitExceeded {
            limit: self.max_length,
        }
        .into())
    }
}

impl<R: BufRead> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let available = self.fill_buf()?;
        let amount = available.len().min(buf.len());
        buf[..amount].copy_from_slice(&available[..amount]);
        self.consume(amount);

        Ok(amount)
    }
}

impl<R: BufRead> BufRead for BoundedReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        let remaining = self.bound().saturating_sub(self.position);

        if remaining == 0 {
            self.check_at_bound()?;
            return Ok(&[]);
        }

        let position = self.position;
        let declared_length = self.declared_length;
        let buf = self.stream.fill_buf()?;

        if buf.is_empty() {
            if let Some(length) = declared_length {
                if position < length {
                    tracing::debug!(position, declared_length = length, "body truncated");
                    return Err(Error::ProtocolViolation(Violation::Truncated).into());
                }
            }

            return Ok(buf);
        }

        let amount = buf
            .len()
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));

        Ok(&buf[..amount])
    }

    fn consume(&mut self, amt: usize) {
        self.stream.consume(amt);
        self.position += amt as u64;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_limit_exceeded() {
        let mut reader = BoundedReader::new(Cursor::new(b"0123456789"), 5, None);
        let mut buf = [0u8; 3];

        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[0..2], b"34");

        let error = Error::from(reader.read(&mut buf).unwrap_err());
        assert!(matches!(error, Error::ReadLimitExceeded { limit: 5 }));
        assert_eq!(reader.position(), 5);
    }

    #[test]
    fn test_exact_limit_is_eof() {
        let mut reader = BoundedReader::new(Cursor::new(b"01234"), 5, None);
        let mut output = Vec::new();

        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"01234");
    }

    #[test]
    fn test_declared_length() {
        let mut source = Cursor::new(b"hello world");
        let mut reader = BoundedReader::new(&mut source, 100, Some(5));
        let mut output = Vec::new();

        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"hello");
        assert_eq!(source.position(), 5);
    }

    #[test]
    fn test_declared_length_over_limit() {
        let mut reader = BoundedReader::new(Cursor::new(b"0123456789"), 5, Some(10));
        let mut output = Vec::new();

        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(error, Error::ReadLimitExceeded { limit: 5 }));
        assert_eq!(output, b"01234");
    }

    #[test]
    fn test_declared_length_over_limit_source_ends_at_limit() {
        let mut reader = BoundedReader::new(Cursor::new(b"01234"), 5, Some(10));
        let mut output = Vec::new();

        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(error, Error::ReadLimitExceeded { limit: 5 }));
        assert_eq!(output, b"01234");
    }

    #[test]
    fn test_truncated() {
        let mut reader = BoundedReader::new(Cursor::new(b"abc"), 100, Some(10));
        let mut output = Vec::new();

        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(
            error,
            Error::ProtocolViolation(Violation::Truncated)
        ));
        assert_eq!(output, b"abc");
    }

    #[test]
    fn test_zero_declared_length() {
        let mut reader = BoundedReader::new(Cursor::new(b"abc"), 100, Some(0));
        let mut output = Vec::new();

        reader.read_to_end(&mut output).unwrap();
        assert!(output.is_empty());
    }
}
