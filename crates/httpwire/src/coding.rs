//! Transfer and content codings.
//!
//! A coding is a lowercased token name with an optional quality value
//! ("rank") and parameters, as found in `Transfer-Encoding`,
//! `Content-Encoding` and `TE` header values.
use std::{fmt::Display, str::FromStr};

use crate::{
    error::{Error, ParseError},
    grammar::Grammar,
    params::{format_parameter_value, format_qvalue, parse_qvalue, Parameters},
};

/// Chunked transfer coding name.
pub const CHUNKED: &str = "chunked";
/// Gzip coding name.
pub const GZIP: &str = "gzip";
/// Deprecated alias of gzip.
pub const X_GZIP: &str = "x-gzip";
/// Deflate (zlib) coding name.
pub const DEFLATE: &str = "deflate";
/// No-op content coding name.
pub const IDENTITY: &str = "identity";
/// Pseudo coding in `TE` announcing trailer support.
pub const TRAILERS: &str = "trailers";

/// Number of codings honored at the end of a coding list.
pub const MAX_CODINGS: usize = 6;

/// A named transfer or content coding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coding {
    name: String,
    rank: u16,
    parameters: Parameters,
}

impl Coding {
    /// Creates a coding with rank 1 and no parameters.
    pub fn new<N: AsRef<str>>(name: N) -> Result<Self, Error> {
        Self::from_parts(name, 1.0, Parameters::new())
    }

    /// Creates a coding from its parts.
    ///
    /// The name is lowercased. The rank is clamped to `[0, 1]` and truncated
    /// to 3 decimal places. Parameter values that aren't tokens must be
    /// representable as a quoted-string.
    pub fn from_parts<N: AsRef<str>>(
        name: N,
        rank: f64,
        parameters: Parameters,
    ) -> Result<Self, Error> {
        let name = Grammar::Token.parse(name.as_ref())?.to_ascii_lowercase();

        for (key, value) in &parameters {
            Grammar::Token.parse(key)?;

            if key.eq_ignore_ascii_case("q") {
                return Err(ParseError::from("parameter `q` is reserved for the rank").into());
            }

            if format_parameter_value(value).is_none() {
                return Err(ParseError::from(format!(
                    "parameter value `{}` is not a token or quotable string",
                    value.escape_debug()
                ))
                .into());
            }
        }

        Ok(Self {
            name,
            rank: rank_to_thousandths(rank),
            parameters,
        })
    }

    /// Parses a single coding such as `gzip;q=0.5`.
    ///
    /// A parameter named `q` (any case) is removed from the parameters and
    /// becomes the rank.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let (name, mut parameters) = crate::params::parse_coding(input)?;
        let name = Grammar::Token.parse(&name)?.to_ascii_lowercase();

        let rank_keys = parameters
            .keys()
            .filter(|key| key.eq_ignore_ascii_case("q"))
            .cloned()
            .collect::<Vec<String>>();
        let mut rank = 1000;

        for key in rank_keys {
            if let Some(value) = parameters.remove(&key) {
                rank = parse_qvalue(&value)?;
            }
        }

        Ok(Self {
            name,
            rank,
            parameters,
        })
    }

    /// Lowercased coding name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quality value in `[0, 1]`.
    pub fn rank(&self) -> f64 {
        f64::from(self.rank) / 1000.0
    }

    /// Quality value in thousandths.
    pub fn rank_thousandths(&self) -> u16 {
        self.rank
    }

    /// Parameters other than the rank.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns whether the coding has the given name, ignoring case.
    pub fn is<N: AsRef<str>>(&self, name: N) -> bool {
        self.name.eq_ignore_ascii_case(name.as_ref())
    }

    fn shows_rank(&self) -> bool {
        self.name == TRAILERS || self.rank < 1000
    }
}

impl FromStr for Coding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Coding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;

        for (key, value) in &self.parameters {
            match format_parameter_value(value) {
                Some(value) => write!(f, ";{}={}", key, value)?,
                None => write!(f, ";{}=\"{}\"", key, value)?,
            }
        }

        if self.shows_rank() {
            write!(f, ";q={}", format_qvalue(self.rank))?;
        }

        Ok(())
    }
}

fn rank_to_thousandths(rank: f64) -> u16 {
    if rank.is_nan() {
        return 0;
    }

    (rank.clamp(0.0, 1.0) * 1000.0 + 1e-6).floor() as u16
}

/// Parses a comma separated coding list such as `gzip, chunked`.
///
/// Empty list elements are skipped. Order is preserved.
pub fn parse_coding_list(input: &str) -> Result<Vec<Coding>, Error> {
    split_list(input)
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .map(Coding::parse)
        .collect()
}

/// Formats codings as a comma separated list.
pub fn format_coding_list(codings: &[Coding]) -> String {
    codings
        .iter()
        .map(|coding| coding.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Returns the codings that are honored: at most the last [MAX_CODINGS].
pub fn honored(codings: &[Coding]) -> &[Coding] {
    &codings[codings.len().saturating_sub(MAX_CODINGS)..]
}

fn split_list(input: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (index, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                items.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }

    items.push(&input[start..]);
    items
}
