//! Parameterized header value parsers.
//!
//! A parameter tail has the form
//! `*( ";" OWS name OWS "=" OWS ( token / quoted-string ) OWS )`.
use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::space0,
    combinator::all_consuming,
    error::{context, ParseError as NomError, VerboseError},
    multi::fold_many0,
    sequence::{delimited, preceded, separated_pair, terminated, tuple},
    IResult,
};
use regex::Regex;

use crate::{
    error::ParseError,
    grammar::{quoted_string, token, Grammar},
    nomutil::NomParseError,
};

/// Mapping of parameter names to unquoted values.
///
/// Later occurrences of a name replace earlier ones.
pub type Parameters = BTreeMap<String, String>;

fn parameter_value<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], &'a [u8], E>
where
    E: NomError<&'a [u8]>,
{
    alt((quoted_string, token))(input)
}

fn parameter<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], (&'a [u8], &'a [u8]), E>
where
    E: NomError<&'a [u8]>,
{
    preceded(
        tuple((space0, tag(b";"), space0)),
        separated_pair(
            token,
            delimited(space0, tag(b"="), space0),
            parameter_value,
        ),
    )(input)
}

fn parameters<'a, E>(input: &'a [u8]) -> IResult<&'a [u8], Parameters, E>
where
    E: NomError<&'a [u8]>,
{
    let build_map = fold_many0(parameter, Parameters::new, |mut map, (name, value)| {
        map.insert(
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        );
        map
    });

    all_consuming(terminated(build_map, space0))(input)
}

/// Parses a parameter tail such as `; charset=utf-8; name="a b"`.
///
/// Empty or whitespace-only input yields an empty mapping. Leftover text that
/// isn't a parameter is an error.
pub fn parse_parameters(input: &str) -> Result<Parameters, ParseError> {
    parse_parameters_bytes(input.as_bytes())
}

pub(crate) fn parse_parameters_bytes(input: &[u8]) -> Result<Parameters, ParseError> {
    match context("parameters", parameters::<VerboseError<&[u8]>>)(input) {
        Ok((_, map)) => Ok(map),
        Err(error) => Err(ParseError::from(NomParseError::from_nom(input, &error))),
    }
}

/// Splits a leading name from its parameter tail and parses the tail.
///
/// Example input: `gzip;q=0.5` or `text/plain; charset=utf-8`.
///
/// The name is the first run of characters that are not whitespace,
/// semicolons or commas. It is returned as written.
pub fn parse_coding(input: &str) -> Result<(String, Parameters), ParseError> {
    lazy_static::lazy_static! {
        static ref CODING: Regex = Regex::new(r"(?s)^[ \t]*([^ \t;,]+)(.*)$").unwrap();
    }

    let captures = CODING
        .captures(input)
        .ok_or_else(|| ParseError::from(format!("missing name in `{}`", input.escape_debug())))?;
    let name = captures.get(1).map_or("", |m| m.as_str());
    let tail = captures.get(2).map_or("", |m| m.as_str());

    tracing::trace!(name, tail, "parse_coding");

    Ok((name.to_string(), parse_parameters(tail)?))
}

/// Formats a parameter value as a token when possible, otherwise as a
/// quoted-string.
///
/// Returns `None` if the value can't be represented in either form.
pub fn format_parameter_value(value: &str) -> Option<String> {
    if Grammar::Token.matches(value) {
        Some(value.to_string())
    } else if Grammar::QuotableString.matches(value) {
        Some(format!("\"{}\"", value))
    } else {
        None
    }
}

/// Parses a quality value as thousandths, clamped to 1000.
///
/// Digits past the third decimal place are truncated.
pub fn parse_qvalue(input: &str) -> Result<u16, ParseError> {
    lazy_static::lazy_static! {
        static ref DECIMAL: Regex = Regex::new(r"^([0-9]*)(?:\.([0-9]*))?$").unwrap();
    }

    let invalid = || ParseError::from(format!("invalid quality value `{}`", input.escape_debug()));
    let captures = DECIMAL.captures(input).ok_or_else(invalid)?;
    let integer = captures.get(1).map_or("", |m| m.as_str());
    let fraction = captures.get(2).map_or("", |m| m.as_str());

    if integer.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }

    let mut thousandths = match integer.trim_start_matches('0') {
        "" => 0u16,
        "1" => 1000,
        _ => return Ok(1000),
    };

    for (index, digit) in fraction.bytes().take(3).enumerate() {
        thousandths += (digit - b'0') as u16 * 10u16.pow(2 - index as u32);
    }

    Ok(thousandths.min(1000))
}

/// Formats thousandths as a quality value without trailing zeros.
pub fn format_qvalue(thousandths: u16) -> String {
    if thousandths >= 1000 {
        return "1".to_string();
    }

    let fraction = format!("{:03}", thousandths);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        "0".to_string()
    } else {
        format!("0.{}", fraction)
    }
}
