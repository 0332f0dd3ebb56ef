//! Validators and extractors for HTTP grammar productions.
//!
//! Every production must match the entire input. The quoted productions
//! extract the text between the quotes; the rest extract the input itself.
//!
//! ```
//! use httpwire::grammar::Grammar;
//!
//! assert_eq!(Grammar::Token.try_parse("gzip"), Some("gzip".to_string()));
//! assert_eq!(Grammar::QuotedString.try_parse("\"a b\""), Some("a b".to_string()));
//! assert_eq!(Grammar::Token.try_parse("a b"), None);
//! ```
use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{line_ending, space1},
    combinator::{all_consuming, recognize},
    error::{context, ParseError as NomError, VerboseError},
    multi::many0,
    sequence::{delimited, pair, tuple},
    IResult,
};

use crate::{error::ParseError, nomutil::NomParseError, stringutil::CharClassExt};

/// HTTP grammar productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// One or more "tchar".
    Token,
    /// DQUOTE-wrapped quotable text.
    QuotedString,
    /// Unquoted text that is valid inside a quoted-string.
    QuotableString,
    /// RFC 6265 cookie-octet run.
    CookieValue,
    /// DQUOTE-wrapped cookie-octet run.
    QuotedCookieValue,
    /// Printable field text on a single line.
    HeaderValue,
    /// Header values joined by a line break followed by whitespace.
    FoldedHeaderValue,
}

impl Grammar {
    /// Returns the matched capture, or `None` if the input doesn't match.
    pub fn try_parse(self, input: &str) -> Option<String> {
        self.capture(input.as_bytes()).ok().map(to_string)
    }

    /// Returns the matched capture or an error describing the mismatch.
    pub fn parse(self, input: &str) -> Result<String, ParseError> {
        let input = input.as_bytes();

        self.capture(input)
            .map(to_string)
            .map_err(|error| ParseError::from(NomParseError::from_nom(input, &error)))
    }

    /// Returns whether the entire input matches.
    pub fn matches(self, input: &str) -> bool {
        self.capture(input.as_bytes()).is_ok()
    }

    /// Name of the production used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Grammar::Token => "token",
            Grammar::QuotedString => "quoted-string",
            Grammar::QuotableString => "quotable-string",
            Grammar::CookieValue => "cookie-value",
            Grammar::QuotedCookieValue => "quoted-cookie-value",
            Grammar::HeaderValue => "header-value",
            Grammar::FoldedHeaderValue => "folded-header-value",
        }
    }

    fn capture(self, input: &[u8]) -> Result<&[u8], nom::Err<VerboseError<&[u8]>>> {
        let name = self.name();
        let result: IResult<&[u8], &[u8], VerboseError<&[u8]>> = match self {
            Grammar::Token => context(name, all_consuming(token))(input),
            Grammar::QuotedString => context(name, all_consuming(quoted_string))(input),
            Grammar::QuotableString => context(name, all_consuming(quotable_string))(input),
            Grammar::CookieValue => context(name, all_consuming(cookie_value))(input),
            Grammar::QuotedCookieValue => {
                context(name, all_consuming(quoted_cookie_value))(input)
            }
            Grammar::HeaderValue => context(name, all_consuming(header_value))(input),
            Grammar::FoldedHeaderValue => {
                context(name, all_consuming(folded_header_value))(input)
            }
        };

        result.map(|(_, output)| output)
    }
}

fn to_string(input: &[u8]) -> String {
    String::from_utf8_lossy(input).into_owned()
}

pub(crate) fn token<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    take_while1(|c: u8| c.is_token())(input)
}

pub(crate) fn quotable_string<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    take_while(|c: u8| c.is_quotable())(input)
}

pub(crate) fn quoted_string<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    delimited(tag(b"\""), quotable_string, tag(b"\""))(input)
}

fn cookie_value<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    take_while(|c: u8| c.is_cookie_octet())(input)
}

fn quoted_cookie_value<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    delimited(tag(b"\""), cookie_value, tag(b"\""))(input)
}

fn header_value<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    take_while(|c: u8| c.is_field_text())(input)
}

fn folded_header_value<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    recognize(pair(
        header_value,
        many0(tuple((line_ending, space1, header_value))),
    ))(input)
}
