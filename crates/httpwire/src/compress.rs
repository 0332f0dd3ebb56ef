//! Decompression of gzip and deflate codings.
use std::{
    io::{BufRead, Chain, Cursor, ErrorKind, Read},
    str::FromStr,
};

use flate2::bufread::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};

use crate::{
    coding::{DEFLATE, GZIP, X_GZIP},
    error::{Error, ParseError},
};

/// Number of bytes examined to choose a decoder.
pub const MAGIC_LENGTH: usize = 2;

/// Compression codings with a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// `gzip` or `x-gzip`.
    Gzip,
    /// `deflate`: zlib wrapped deflate data.
    Deflate,
}

impl CompressionFormat {
    /// Canonical coding name.
    pub fn name(&self) -> &'static str {
        match self {
            CompressionFormat::Gzip => GZIP,
            CompressionFormat::Deflate => DEFLATE,
        }
    }
}

impl FromStr for CompressionFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(GZIP) || s.eq_ignore_ascii_case(X_GZIP) {
            Ok(CompressionFormat::Gzip)
        } else if s.eq_ignore_ascii_case(DEFLATE) {
            Ok(CompressionFormat::Deflate)
        } else {
            Err(Error::UnsupportedCoding(s.to_string()))
        }
    }
}

// Bytes read ahead to choose the decoder, followed by the rest of the stream.
type Prefixed<S> = Chain<Cursor<Vec<u8>>, S>;

enum Decoder<S: BufRead> {
    Empty(Prefixed<S>),
    Gzip(MultiGzDecoder<Prefixed<S>>),
    Zlib(ZlibDecoder<Prefixed<S>>),
    Deflate(DeflateDecoder<Prefixed<S>>),
}

impl<S: BufRead> Decoder<S> {
    fn name(&self) -> &'static str {
        match self {
            Decoder::Empty(_) => "empty",
            Decoder::Gzip(_) => "gzip",
            Decoder::Zlib(_) => "zlib",
            Decoder::Deflate(_) => "deflate",
        }
    }
}

/// Decoder for a single compression coding.
///
/// Empty input decodes to empty output. For `deflate`, data without a zlib
/// header is decoded as raw deflate data.
///
/// Corrupt compressed data is reported as [Error::MalformedSyntax].
pub struct Decompressor<S: BufRead> {
    decoder: Decoder<S>,
}

impl<S: BufRead> Decompressor<S> {
    /// Creates a decompressor for the given format.
    ///
    /// This reads up to [MAGIC_LENGTH] bytes ahead to choose the decoder, so
    /// short reads from the stream do not affect the choice.
    pub fn new(mut stream: S, format: CompressionFormat) -> std::io::Result<Self> {
        let mut magic_bytes = Vec::with_capacity(MAGIC_LENGTH);
        (&mut stream)
            .take(MAGIC_LENGTH as u64)
            .read_to_end(&mut magic_bytes)?;

        tracing::trace!(?format, ?magic_bytes, "decompressor analysis");

        let is_empty = magic_bytes.is_empty();
        let is_zlib = is_zlib_header(&magic_bytes);
        let stream = Cursor::new(magic_bytes).chain(stream);

        let decoder = match format {
            _ if is_empty => Decoder::Empty(stream),
            CompressionFormat::Gzip => Decoder::Gzip(MultiGzDecoder::new(stream)),
            CompressionFormat::Deflate if is_zlib => Decoder::Zlib(ZlibDecoder::new(stream)),
            CompressionFormat::Deflate => Decoder::Deflate(DeflateDecoder::new(stream)),
        };

        tracing::debug!(decoder = decoder.name(), "decoder select");

        Ok(Self { decoder })
    }
}

impl<S: BufRead> Read for Decompressor<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let name = self.decoder.name();
        let result = match &mut self.decoder {
            Decoder::Empty(stream) => stream.read(buf),
            Decoder::Gzip(stream) => stream.read(buf),
            Decoder::Zlib(stream) => stream.read(buf),
            Decoder::Deflate(stream) => stream.read(buf),
        };

        result.map_err(|error| map_decoder_error(name, error))
    }
}

// Errors raised by the decoder itself become syntax errors. Errors from the
// wrapped stream pass through.
fn map_decoder_error(name: &str, error: std::io::Error) -> std::io::Error {
    let is_stream_error = error.get_ref().map_or(false, |inner| inner.is::<Error>());

    match error.kind() {
        ErrorKind::InvalidInput | ErrorKind::InvalidData if !is_stream_error => {
            tracing::debug!(decoder = name, %error, "corrupt compressed data");

            Error::MalformedSyntax(ParseError::from(format!("corrupt {} data: {}", name, error)))
                .into()
        }
        _ => error,
    }
}

// RFC 1950: compression method 8 and a header checksum that is a multiple of 31.
fn is_zlib_header(bytes: &[u8]) -> bool {
    match bytes {
        [cmf, flg, ..] => cmf & 0x0f == 8 && (u16::from(*cmf) * 256 + u16::from(*flg)) % 31 == 0,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Write};

    use flate2::{
        write::{DeflateEncoder, GzEncoder, ZlibEncoder},
        Compression,
    };

    use super::*;
    use crate::error::Violation;

    const PAYLOAD: &[u8] = b"The quick brown fox jumps over the lazy dog. The quick brown fox.";

    fn decompress(data: Vec<u8>, format: CompressionFormat) -> Vec<u8> {
        let mut decompressor = Decompressor::new(Cursor::new(data), format).unwrap();
        let mut output = Vec::new();
        decompressor.read_to_end(&mut output).unwrap();
        output
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            CompressionFormat::from_str("GZIP").unwrap(),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_str("x-gzip").unwrap(),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_str("deflate").unwrap(),
            CompressionFormat::Deflate
        );
        assert!(matches!(
            CompressionFormat::from_str("br"),
            Err(Error::UnsupportedCoding(name)) if name == "br"
        ));
    }

    #[test]
    fn test_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD).unwrap();

        assert_eq!(
            decompress(encoder.finish().unwrap(), CompressionFormat::Gzip),
            PAYLOAD
        );
    }

    #[test]
    fn test_zlib() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD).unwrap();

        assert_eq!(
            decompress(encoder.finish().unwrap(), CompressionFormat::Deflate),
            PAYLOAD
        );
    }

    #[test]
    fn test_raw_deflate() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD).unwrap();

        assert_eq!(
            decompress(encoder.finish().unwrap(), CompressionFormat::Deflate),
            PAYLOAD
        );
    }

    struct OneByteReader<'a>(&'a [u8]);

    impl Read for OneByteReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let amount = self.0.len().min(buf.len()).min(1);
            buf[..amount].copy_from_slice(&self.0[..amount]);
            self.0 = &self.0[amount..];
            Ok(amount)
        }
    }

    #[test]
    fn test_raw_deflate_short_reads() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD).unwrap();
        let data = encoder.finish().unwrap();

        let stream = BufReader::with_capacity(1, OneByteReader(&data));
        let mut decompressor = Decompressor::new(stream, CompressionFormat::Deflate).unwrap();
        let mut output = Vec::new();
        decompressor.read_to_end(&mut output).unwrap();

        assert_eq!(output, PAYLOAD);
    }

    #[test]
    fn test_corrupt_data() {
        let data = b"\x1f\x8b\x08\x00\x00\x00\x00\x00\x00\xffnot deflate data".to_vec();
        let mut decompressor =
            Decompressor::new(Cursor::new(data), CompressionFormat::Gzip).unwrap();
        let mut output = Vec::new();

        let error = Error::from(decompressor.read_to_end(&mut output).unwrap_err());
        assert!(matches!(error, Error::MalformedSyntax(_)));
    }

    #[test]
    fn test_stream_error_passes_through() {
        let error = map_decoder_error(
            "deflate",
            Error::ProtocolViolation(Violation::InvalidChunkTermination).into(),
        );

        assert!(matches!(
            Error::from(error),
            Error::ProtocolViolation(Violation::InvalidChunkTermination)
        ));
    }

    #[test]
    fn test_empty() {
        assert!(decompress(Vec::new(), CompressionFormat::Gzip).is_empty());
    }

    #[test]
    fn test_is_zlib_header() {
        assert!(is_zlib_header(&[0x78, 0x9c]));
        assert!(is_zlib_header(&[0x78, 0x01]));
        assert!(!is_zlib_header(&[0x78, 0x00]));
        assert!(!is_zlib_header(&[0xf3, 0x48]));
    }
}
