//! HTTP header name-value fields.
//!
//! Headers keep the order they were read or added in. Names compare without
//! regard to ASCII case. Duplicate names are allowed and never merged.
use std::{fmt::Display, io::BufRead};

use nom::{
    bytes::complete::tag,
    combinator::rest,
    error::{context, VerboseError},
    sequence::separated_pair,
};
use serde::Serialize;

use crate::{
    coding::{parse_coding_list, Coding},
    config::Limits,
    error::{Error, ParseError, Violation},
    grammar::{token, Grammar},
    io::{strip_line_ending, BufReadMoreExt},
    nomutil::NomParseError,
    stringutil::{trim_ws, CharClassExt},
};

/// A single name-value field.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Creates a header.
    ///
    /// The name must be a token. The value must be printable field text,
    /// optionally folded over several lines.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Result<Self, Error> {
        let name = name.into();
        let value = value.into();

        Grammar::Token.parse(&name)?;
        Grammar::FoldedHeaderValue.parse(&value)?;

        Ok(Self { name, value })
    }

    /// The name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns whether the header has the given name, ignoring case.
    pub fn is<N: AsRef<str>>(&self, name: N) -> bool {
        self.name.eq_ignore_ascii_case(name.as_ref())
    }

    fn append_folded(&mut self, continuation: &str) {
        self.value.push(' ');
        self.value.push_str(continuation);
    }
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.is(&other.name) && self.value == other.value
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}\r\n", self.name, self.value)
    }
}

/// Ordered list of headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HeaderList {
    headers: Vec<Header>,
}

impl HeaderList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of headers, counting duplicates.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns an iterator of all headers in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    /// Returns whether a header with the given name exists.
    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.get(name).is_some()
    }

    /// Returns the first value for the given name.
    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.is(name.as_ref()))
            .map(|header| header.value())
    }

    /// Returns all the values for the given name in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |header| header.is(name))
            .map(|header| header.value())
    }

    /// Adds a header after any existing headers.
    pub fn push(&mut self, header: Header) {
        self.headers.push(header)
    }

    /// Validates and adds a header after any existing headers.
    pub fn append<N: Into<String>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
    ) -> Result<(), Error> {
        self.headers.push(Header::new(name, value)?);
        Ok(())
    }

    /// Parses every occurrence of a coding list header, in order.
    ///
    /// Example: `Transfer-Encoding: gzip` followed by
    /// `Transfer-Encoding: chunked` yields `[gzip, chunked]`.
    pub fn codings<N: AsRef<str>>(&self, name: N) -> Result<Vec<Coding>, Error> {
        let mut codings = Vec::new();

        for value in self.get_all(name.as_ref()) {
            codings.extend(parse_coding_list(value)?);
        }

        Ok(codings)
    }

    /// Returns the declared `Content-Length`.
    ///
    /// Repeated identical values, either as duplicate fields or as a comma
    /// list, are accepted.
    pub fn content_length(&self) -> Result<Option<u64>, Error> {
        let mut length = None;

        for value in self.get_all("content-length") {
            for item in value.split(',').map(str::trim) {
                if item.is_empty() || !item.bytes().all(|c| c.is_ascii_digit()) {
                    return Err(ParseError::from(format!(
                        "invalid content-length `{}`",
                        item.escape_debug()
                    ))
                    .into());
                }

                let item = item.parse::<u64>().map_err(|error| {
                    ParseError::from(format!("invalid content-length: {}", error))
                })?;

                match length {
                    Some(length) if length != item => {
                        return Err(Violation::ConflictingContentLength.into())
                    }
                    _ => length = Some(item),
                }
            }
        }

        Ok(length)
    }

    fn last_mut(&mut self) -> Option<&mut Header> {
        self.headers.last_mut()
    }
}

impl Display for HeaderList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for header in &self.headers {
            header.fmt(f)?;
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

/// Reads a header section from a line source.
///
/// Lines are read until a blank line. A line beginning with Space or Tab
/// continues the previous header: its trimmed text is appended to that
/// header's value after a single space.
#[derive(Debug, Clone)]
pub struct HeaderReader {
    section_limit: u64,
    buffer: Vec<u8>,
}

impl HeaderReader {
    /// Creates a `HeaderReader` with the default configuration.
    pub fn new() -> Self {
        Self::from_limits(&Limits::default())
    }

    /// Creates a `HeaderReader` using the header length of the given limits.
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            section_limit: limits.max_header_length,
            buffer: Vec::new(),
        }
    }

    /// Returns the maximum number of bytes in a header section.
    pub fn section_limit(&self) -> u64 {
        self.section_limit
    }

    /// Sets the maximum number of bytes in a header section, including line
    /// endings and the blank line.
    pub fn set_section_limit(&mut self, value: u64) {
        self.section_limit = value;
    }

    /// Reads headers up to and including the blank line.
    ///
    /// The stream is left positioned after the blank line.
    pub fn read_headers<R: BufRead>(&mut self, mut stream: R) -> Result<HeaderList, Error> {
        let mut headers = HeaderList::new();
        let mut remaining = self.section_limit;

        loop {
            let terminated = self.read_line(&mut stream, &mut remaining)?;

            if !terminated {
                tracing::debug!(count = headers.len(), "header section truncated");
                return Err(Violation::Truncated.into());
            }

            let line = self.buffer.as_slice();

            if line.is_empty() {
                break;
            }

            if line[0].is_ws() {
                let continuation = String::from_utf8_lossy(trim_ws(line)).into_owned();

                match headers.last_mut() {
                    Some(header) => {
                        header.append_folded(&continuation);
                        Grammar::FoldedHeaderValue.parse(header.value())?;
                    }
                    None => return Err(Violation::OrphanContinuation.into()),
                }
            } else {
                headers.push(parse_header_line(line)?);
            }
        }

        tracing::trace!(count = headers.len(), "read_headers");

        Ok(headers)
    }

    fn read_line<R: BufRead>(&mut self, stream: &mut R, remaining: &mut u64) -> Result<bool, Error> {
        if *remaining == 0 {
            return Err(Violation::LineTooLong.into());
        }

        self.buffer.clear();
        let consumed = stream.read_limit_until(b'\n', &mut self.buffer, *remaining)?;
        *remaining = remaining.saturating_sub(consumed as u64);

        Ok(strip_line_ending(&mut self.buffer))
    }
}

impl Default for HeaderReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a header section with the default configuration.
pub fn read_headers<R: BufRead>(stream: R) -> Result<HeaderList, Error> {
    HeaderReader::new().read_headers(stream)
}

/// Parses a `token ":" value` line without its line ending.
///
/// Whitespace around the value is removed.
pub fn parse_header_line(line: &[u8]) -> Result<Header, Error> {
    let result = context(
        "header line",
        separated_pair(token::<VerboseError<&[u8]>>, tag(b":"), rest),
    )(line);

    match result {
        Ok((_, (name, value))) => Header::new(
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(trim_ws(value)),
        ),
        Err(error) => Err(ParseError::from(NomParseError::from_nom(line, &error)).into()),
    }
}
