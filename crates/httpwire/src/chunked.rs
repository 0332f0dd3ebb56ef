//! Chunked transfer coding.
//!
//! ```text
//! chunk      = chunk-size [ chunk-ext ] CRLF chunk-data CRLF
//! last-chunk = 1*("0") [ chunk-ext ] CRLF
//! trailer    = *( header-field CRLF ) CRLF
//! ```
//!
//! Chunk sizes are hexadecimal.
use std::io::{BufRead, Read};

use nom::{
    character::complete::hex_digit1,
    error::{context, VerboseError},
    IResult,
};

use crate::{
    config::Limits,
    error::{Error, ParseError, Violation},
    header::{HeaderList, HeaderReader},
    io::BufReadMoreExt,
    nomutil::NomParseError,
    params::{parse_parameters_bytes, Parameters},
};

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: u64 = 0x0FFF_FFFF_FFFF_FFFF;

/// Maximum number of bytes discarded by a single [ChunkedReader::skip].
pub const SKIP_BUFFER_SIZE: usize = 8192;

/// Decoded chunk size and extensions line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Size of chunk data.
    pub size: u64,
    /// Chunk extensions.
    pub extensions: Parameters,
}

/// Parses a chunk size line without its line ending.
pub fn parse_chunk_header(line: &[u8]) -> Result<ChunkHeader, Error> {
    let result: IResult<&[u8], &[u8], VerboseError<&[u8]>> =
        context("chunk size", hex_digit1)(line);
    let (tail, digits) =
        result.map_err(|error| ParseError::from(NomParseError::from_nom(line, &error)))?;
    let digits = String::from_utf8_lossy(digits);

    let size = u64::from_str_radix(&digits, 16)
        .ok()
        .filter(|size| *size <= MAX_CHUNK_SIZE)
        .ok_or_else(|| ParseError::from(format!("chunk size `{}` is too large", digits)))?;
    let extensions = parse_parameters_bytes(tail)?;

    Ok(ChunkHeader { size, extensions })
}

/// Reads and decodes a stream in chunked transfer coding.
///
/// A single read never returns data from more than one chunk. After the
/// last chunk, the trailer section is consumed and the wrapped stream is
/// left positioned at the end of the message.
///
/// Seeking is not supported. [Self::skip] discards data by reading it.
#[derive(Debug)]
pub struct ChunkedReader<R: BufRead> {
    stream: R,
    header_reader: HeaderReader,
    line_limit: u64,
    buffer: Vec<u8>,
    chunk_size: u64,
    position: u64,
    extensions: Parameters,
    trailers: Option<HeaderList>,
}

impl<R: BufRead> ChunkedReader<R> {
    /// Creates a `ChunkedReader` with the default limits and reads the
    /// first chunk header.
    pub fn new(stream: R) -> Result<Self, Error> {
        Self::from_limits(stream, &Limits::default())
    }

    /// Creates a `ChunkedReader` with the given limits and reads the first
    /// chunk header.
    pub fn from_limits(stream: R, limits: &Limits) -> Result<Self, Error> {
        let mut reader = Self {
            stream,
            header_reader: HeaderReader::from_limits(limits),
            line_limit: limits.max_line_length,
            buffer: Vec::new(),
            chunk_size: 0,
            position: 0,
            extensions: Parameters::new(),
            trailers: None,
        };

        reader.begin_chunk()?;

        Ok(reader)
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

    /// Maximum length of subsequent chunk size lines.
    pub fn line_limit(&self) -> u64 {
        self.line_limit
    }

    /// Sets the maximum length of subsequent chunk size lines.
    pub fn set_line_limit(&mut self, value: u64) {
        self.line_limit = value;
    }

    /// Sets the maximum length of the trailer section.
    pub fn set_trailer_limit(&mut self, value: u64) {
        self.header_reader.set_section_limit(value);
    }

    /// Size of the current chunk.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Extensions of the current chunk.
    pub fn extensions(&self) -> &Parameters {
        &self.extensions
    }

    /// Returns whether the last chunk and trailer have been read.
    pub fn is_terminal(&self) -> bool {
        self.trailers.is_some()
    }

    /// Trailer headers, available once the last chunk has been read.
    pub fn trailers(&self) -> Option<&HeaderList> {
        self.trailers.as_ref()
    }

    /// Discards up to `amount` bytes with a single read.
    ///
    /// At most [SKIP_BUFFER_SIZE] bytes are discarded per call. Returns the
    /// number of bytes discarded, which is 0 at the end of the stream.
    pub fn skip(&mut self, amount: u64) -> std::io::Result<u64> {
        let size = usize::try_from(amount)
            .unwrap_or(usize::MAX)
            .min(SKIP_BUFFER_SIZE);
        let mut buffer = vec![0u8; size];

        Ok(self.read(&mut buffer)? as u64)
    }

    fn begin_chunk(&mut self) -> Result<(), Error> {
        if !self.stream.read_line_limit(&mut self.buffer, self.line_limit)? {
            return Err(Violation::Truncated.into());
        }

        let header = parse_chunk_header(&self.buffer)?;

        tracing::debug!(
            size = header.size,
            extensions = header.extensions.len(),
            "chunk header"
        );

        self.chunk_size = header.size;
        self.position = 0;
        self.extensions = header.extensions;

        if self.chunk_size == 0 {
            self.read_trailer()?;
        }

        Ok(())
    }

    fn end_chunk(&mut self) -> Result<(), Error> {
        let terminated = self
            .stream
            .read_line_limit(&mut self.buffer, self.line_limit)?;

        if !terminated && self.buffer.is_empty() {
            Err(Violation::Truncated.into())
        } else if !self.buffer.is_empty() {
            tracing::debug!("chunk data not followed by line ending");
            Err(Violation::InvalidChunkTermination.into())
        } else {
            Ok(())
        }
    }

    fn read_trailer(&mut self) -> Result<(), Error> {
        let trailers = self.header_reader.read_headers(&mut self.stream)?;

        tracing::debug!(count = trailers.len(), "last chunk");

        self.trailers = Some(trailers);

        Ok(())
    }
}

impl<R: BufRead> Read for ChunkedReader<R> {
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

impl<R: BufRead> BufRead for ChunkedReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        if self.is_terminal() {
            return Ok(&[]);
        }

        if self.position == self.chunk_size {
            self.end_chunk()?;
            self.begin_chunk()?;

            if self.is_terminal() {
                return Ok(&[]);
            }
        }

        let remaining = self.chunk_size - self.position;
        let buf = self.stream.fill_buf()?;

        if buf.is_empty() {
            return Err(Error::ProtocolViolation(Violation::Truncated).into());
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
    fn test_parse_chunk_header() {
        let header = parse_chunk_header(b"0a").unwrap();
        assert_eq!(header.size, 10);
        assert!(header.extensions.is_empty());

        let header = parse_chunk_header(b"1A;k1=v1; k2=\"a b\"").unwrap();
        assert_eq!(header.size, 26);
        assert_eq!(header.extensions["k1"], "v1");
        assert_eq!(header.extensions["k2"], "a b");

        let header = parse_chunk_header(b"0FFFFFFFFFFFFFFF").unwrap();
        assert_eq!(header.size, MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_parse_chunk_header_invalid() {
        for line in [
            b"".as_slice(),
            b"zz".as_slice(),
            b";a=b".as_slice(),
            b"5 junk".as_slice(),
            b"1FFFFFFFFFFFFFFF".as_slice(),
            b"10000000000000000".as_slice(),
        ] {
            assert!(
                matches!(parse_chunk_header(line), Err(Error::MalformedSyntax(_))),
                "{:?}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn test_reader() {
        let mut reader =
            ChunkedReader::new(Cursor::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n")).unwrap();
        let mut output = Vec::new();

        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"Wikipedia");

        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.is_terminal());
        assert!(reader.trailers().unwrap().is_empty());
    }

    #[test]
    fn test_reads_stay_within_chunk() {
        let mut reader =
            ChunkedReader::new(Cursor::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n")).unwrap();
        let mut buf = [0u8; 64];

        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"Wiki");
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"pedia");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_hex_sizes() {
        let mut input = b"a\r\n0123456789\r\n1A\r\n".to_vec();
        input.extend_from_slice(&[b'x'; 26]);
        input.extend_from_slice(b"\r\n0\r\n\r\n");

        let mut reader = ChunkedReader::new(Cursor::new(input)).unwrap();
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();

        assert_eq!(output.len(), 36);
        assert_eq!(&output[..10], b"0123456789");
    }

    #[test]
    fn test_missing_terminator() {
        let mut reader =
            ChunkedReader::new(Cursor::new(b"4\r\nWiki5\r\npedia\r\n0\r\n\r\n")).unwrap();
        let mut output = Vec::new();

        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(
            error,
            Error::ProtocolViolation(Violation::InvalidChunkTermination)
        ));
        assert_eq!(output, b"Wiki");
    }

    #[test]
    fn test_truncated() {
        let mut reader = ChunkedReader::new(Cursor::new(b"9\r\nWiki")).unwrap();
        let mut output = Vec::new();

        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(
            error,
            Error::ProtocolViolation(Violation::Truncated)
        ));

        let mut reader = ChunkedReader::new(Cursor::new(b"4\r\nWiki\r\n")).unwrap();
        let error = Error::from(reader.read_to_end(&mut output).unwrap_err());
        assert!(matches!(
            error,
            Error::ProtocolViolation(Violation::Truncated)
        ));
    }

    #[test]
    fn test_malformed_size() {
        assert!(matches!(
            ChunkedReader::new(Cursor::new(b"xyz\r\nabc\r\n0\r\n\r\n")),
            Err(Error::MalformedSyntax(_))
        ));
    }

    #[test]
    fn test_extensions_and_trailers() {
        let mut source = Cursor::new(
            b"3;name=\"a b\"\r\nabc\r\n0\r\nExpires: never\r\nX-Sum: 1\r\n\r\nNEXT".to_vec(),
        );
        let mut reader = ChunkedReader::new(&mut source).unwrap();

        assert_eq!(reader.chunk_size(), 3);
        assert_eq!(reader.extensions()["name"], "a b");

        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"abc");

        let trailers = reader.trailers().unwrap();
        assert_eq!(trailers.len(), 2);
        assert_eq!(trailers.get("expires"), Some("never"));

        let mut rest = Vec::new();
        source.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"NEXT");
    }

    #[test]
    fn test_line_limit() {
        let limits = Limits {
            max_line_length: 4,
            ..Default::default()
        };
        let result =
            ChunkedReader::from_limits(Cursor::new(b"4;abc=def\r\nWiki\r\n0\r\n\r\n"), &limits);

        assert!(matches!(
            result,
            Err(Error::ProtocolViolation(Violation::LineTooLong))
        ));
    }

    #[test]
    fn test_skip() {
        let mut reader =
            ChunkedReader::new(Cursor::new(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n")).unwrap();

        assert_eq!(reader.skip(2).unwrap(), 2);
        assert_eq!(reader.skip(100).unwrap(), 2);
        assert_eq!(reader.skip(100).unwrap(), 5);
        assert_eq!(reader.skip(100).unwrap(), 0);
    }
}
