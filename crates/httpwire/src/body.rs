//! Message body decoding.
//!
//! A body is decoded by stacking stream layers over the raw entity stream:
//! a [BoundedReader], then the transfer codings, then the content codings.
//! Each layer owns the layer beneath it, so dropping or closing the
//! [DecodedBody] releases every layer down to the original stream.
//!
//! ```
//! use std::io::Read;
//! use httpwire::{body::{BodyDecoder, Framing}, header::HeaderList};
//!
//! let mut headers = HeaderList::new();
//! headers.append("Transfer-Encoding", "chunked").unwrap();
//!
//! let framing = Framing::from_response(200, &headers).unwrap();
//! let source = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".as_slice();
//! let mut body = BodyDecoder::new().decode(&framing, source).unwrap();
//!
//! let mut output = String::new();
//! body.read_to_string(&mut output).unwrap();
//! assert_eq!(output, "Wikipedia");
//! ```
use std::{
    fmt::Debug,
    io::{BufRead, BufReader, ErrorKind, Read},
    str::FromStr,
};

use crate::{
    bounded::BoundedReader,
    chunked::ChunkedReader,
    coding::{format_coding_list, honored, Coding, CHUNKED, IDENTITY},
    compress::{CompressionFormat, Decompressor},
    config::Limits,
    error::Error,
    header::HeaderList,
};

/// Returns whether a response with the status code never has a body.
///
/// These are the informational (1xx), 204, and 304 status codes.
pub fn status_suppresses_body(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

/// Describes how a message body is framed and encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Framing {
    /// The message is known to have no body, such as a response to a HEAD
    /// request.
    pub known_empty: bool,
    /// Response status code; `None` for requests.
    pub status: Option<u16>,
    /// Value of the `Content-Length` header.
    pub content_length: Option<u64>,
    /// Length of the entity when known by other means.
    pub entity_length: Option<u64>,
    /// Codings from `Transfer-Encoding` in header order.
    pub transfer_codings: Vec<Coding>,
    /// Codings from `Content-Encoding` in header order.
    pub content_codings: Vec<Coding>,
}

impl Framing {
    /// Builds the framing of a request from its headers.
    pub fn from_request(headers: &HeaderList) -> Result<Self, Error> {
        Ok(Self {
            known_empty: false,
            status: None,
            content_length: headers.content_length()?,
            entity_length: None,
            transfer_codings: headers.codings("transfer-encoding")?,
            content_codings: headers.codings("content-encoding")?,
        })
    }

    /// Builds the framing of a response from its status code and headers.
    ///
    /// Headers are not inspected when the status code has no body.
    pub fn from_response(status: u16, headers: &HeaderList) -> Result<Self, Error> {
        if status_suppresses_body(status) {
            return Ok(Self {
                status: Some(status),
                ..Default::default()
            });
        }

        let mut framing = Self::from_request(headers)?;
        framing.status = Some(status);

        Ok(framing)
    }

    /// Returns whether the body is empty without reading it.
    pub fn is_suppressed(&self) -> bool {
        self.known_empty || self.status.map_or(false, status_suppresses_body)
    }

    /// Length of a body without transfer codings: the `Content-Length`,
    /// otherwise the entity length, otherwise 0.
    pub fn declared_length(&self) -> u64 {
        self.content_length.or(self.entity_length).unwrap_or(0)
    }

    /// Returns whether the honored transfer codings include `chunked`.
    pub fn is_chunked(&self) -> bool {
        honored(&self.transfer_codings)
            .iter()
            .any(|coding| coding.is(CHUNKED))
    }

    fn check_codings(&self) -> Result<(), Error> {
        for coding in honored(&self.transfer_codings) {
            if !coding.is(CHUNKED) {
                CompressionFormat::from_str(coding.name())?;
            }
        }

        for coding in honored(&self.content_codings) {
            if !coding.is(IDENTITY) {
                CompressionFormat::from_str(coding.name())?;
            }
        }

        Ok(())
    }
}

/// Stages of body decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    /// The body is known to be empty and the entity was not read.
    Empty,
    /// The entity is wrapped in a bounded stream.
    Framed,
    /// Transfer codings are applied.
    TransferDecoded,
    /// Content codings are applied and the body is ready to read.
    ContentDecoded,
    /// At least one byte has been read.
    Draining,
    /// The body was exhausted, failed, or closed. No more data is returned.
    Closed,
}

/// Builds decoded body streams.
#[derive(Debug, Clone, Default)]
pub struct BodyDecoder {
    limits: Limits,
}

impl BodyDecoder {
    /// Creates a `BodyDecoder` with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `BodyDecoder` with the given limits.
    pub fn from_limits(limits: Limits) -> Self {
        Self { limits }
    }

    /// Returns the limits.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Returns the maximum number of bytes read for a body.
    pub fn max_length(&self) -> u64 {
        self.limits.max_body_length
    }

    /// Sets the maximum number of bytes read for a body.
    ///
    /// The limit applies to the framed bytes and, when compression is used,
    /// separately to the decompressed bytes.
    pub fn set_max_length(&mut self, value: u64) {
        self.limits.max_body_length = value;
    }

    /// Returns a stream of the body decoded from the entity stream.
    ///
    /// Every coding name is checked before the entity stream is read. At most
    /// the last [crate::coding::MAX_CODINGS] codings of each list are
    /// applied.
    pub fn decode<'a, R: BufRead + 'a>(
        &self,
        framing: &Framing,
        stream: R,
    ) -> Result<DecodedBody<'a>, Error> {
        if framing.is_suppressed() {
            tracing::debug!(
                status = ?framing.status,
                known_empty = framing.known_empty,
                state = ?BodyState::Empty,
                "decode"
            );
            return Ok(DecodedBody::empty());
        }

        framing.check_codings()?;

        let max_length = self.limits.max_body_length;
        let transfer_codings = honored(&framing.transfer_codings);
        let content_codings = honored(&framing.content_codings);

        let mut layer: Box<dyn BufRead + 'a> = if transfer_codings.is_empty() {
            let declared_length = framing.declared_length();

            tracing::debug!(declared_length, max_length, state = ?BodyState::Framed, "decode");
            Box::new(BoundedReader::new(stream, max_length, Some(declared_length)))
        } else {
            if !transfer_codings
                .last()
                .map_or(false, |coding| coding.is(CHUNKED))
            {
                tracing::warn!(
                    codings = %format_coding_list(transfer_codings),
                    "chunked is not the final transfer coding"
                );
            }

            tracing::debug!(max_length, state = ?BodyState::Framed, "decode");
            Box::new(BoundedReader::new(stream, max_length, None))
        };

        let mut decompressing = false;

        for coding in transfer_codings.iter().rev() {
            if coding.is(CHUNKED) {
                layer = Box::new(ChunkedReader::from_limits(layer, &self.limits)?);
            } else {
                layer = decompression_layer(coding, layer)?;
                decompressing = true;
            }
        }

        tracing::debug!(
            codings = %format_coding_list(transfer_codings),
            state = ?BodyState::TransferDecoded,
            "decode"
        );

        for coding in content_codings.iter().rev() {
            if !coding.is(IDENTITY) {
                layer = decompression_layer(coding, layer)?;
                decompressing = true;
            }
        }

        if decompressing {
            layer = Box::new(BoundedReader::new(layer, max_length, None));
        }

        tracing::debug!(
            codings = %format_coding_list(content_codings),
            state = ?BodyState::ContentDecoded,
            "decode"
        );

        Ok(DecodedBody::new(layer))
    }

    /// Decodes the body and passes it to the callback.
    ///
    /// The body, and with it the entity stream, is released when the callback
    /// returns.
    pub fn decode_with<'a, R, F, T>(
        &self,
        framing: &Framing,
        stream: R,
        callback: F,
    ) -> Result<T, Error>
    where
        R: BufRead + 'a,
        F: FnOnce(&mut DecodedBody<'a>) -> Result<T, Error>,
    {
        let mut body = self.decode(framing, stream)?;
        let result = callback(&mut body);
        body.close();

        result
    }
}

fn decompression_layer<'a>(
    coding: &Coding,
    stream: Box<dyn BufRead + 'a>,
) -> Result<Box<dyn BufRead + 'a>, Error> {
    let format = CompressionFormat::from_str(coding.name())?;
    let decompressor = Decompressor::new(stream, format)?;

    Ok(Box::new(BufReader::new(decompressor)))
}

/// Stream of a decoded message body.
///
/// Errors from the layers are reported as [std::io::Error]; convert them
/// with [Error::from] to recover the crate error. Any error closes the
/// stream.
pub struct DecodedBody<'a> {
    stream: Option<Box<dyn BufRead + 'a>>,
    state: BodyState,
}

impl<'a> DecodedBody<'a> {
    fn new(stream: Box<dyn BufRead + 'a>) -> Self {
        Self {
            stream: Some(stream),
            state: BodyState::ContentDecoded,
        }
    }

    fn empty() -> Self {
        Self {
            stream: None,
            state: BodyState::Empty,
        }
    }

    /// Current decoding stage.
    pub fn state(&self) -> BodyState {
        self.state
    }

    /// Returns whether the stream is closed.
    pub fn is_closed(&self) -> bool {
        self.state == BodyState::Closed
    }

    /// Releases every layer including the entity stream.
    ///
    /// Closing a chunked body before its last chunk leaves the entity
    /// stream in the middle of a message.
    pub fn close(&mut self) {
        self.stream = None;

        if self.state != BodyState::Closed {
            tracing::debug!(state = ?BodyState::Closed, "decode");
            self.state = BodyState::Closed;
        }
    }
}

impl<'a> Read for DecodedBody<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let result = match self.stream.as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        };

        match result {
            Ok(0) if !buf.is_empty() => {
                self.close();
                Ok(0)
            }
            Ok(amount) => {
                if amount > 0 && self.state != BodyState::Draining {
                    tracing::trace!(state = ?BodyState::Draining, "decode");
                    self.state = BodyState::Draining;
                }

                Ok(amount)
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => Err(error),
            Err(error) => {
                tracing::debug!(%error, "body read failed");
                self.close();
                Err(error)
            }
        }
    }
}

impl<'a> Debug for DecodedBody<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedBody")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
