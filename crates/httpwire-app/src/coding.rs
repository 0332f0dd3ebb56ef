use std::io::Write;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use httpwire::{
    coding::{honored, parse_coding_list, Coding},
    params::Parameters,
};
use serde::Serialize;

pub fn create_command() -> Command<'static> {
    Command::new("coding")
        .about("Normalize a coding list")
        .long_about(
            "Parse a comma separated list of transfer or content codings, \
            such as the value of a TE or Content-Encoding header field, and \
            print each coding in normalized form.",
        )
        .arg(
            Arg::new("text")
                .required(true)
                .help("Coding list such as \"gzip;q=0.5, chunked\""),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Format the output as JSON"),
        )
}

#[derive(Debug, Serialize)]
struct CodingInfo<'a> {
    name: &'a str,
    rank: f64,
    parameters: &'a Parameters,
    honored: bool,
    formatted: String,
}

impl<'a> CodingInfo<'a> {
    fn new(coding: &'a Coding, honored: bool) -> Self {
        Self {
            name: coding.name(),
            rank: coding.rank(),
            parameters: coding.parameters(),
            honored,
            formatted: coding.to_string(),
        }
    }
}

pub fn run(arg_matches: &ArgMatches) -> anyhow::Result<()> {
    let text = arg_matches.get_one::<String>("text").unwrap();
    let codings = parse_coding_list(text).context("invalid coding list")?;
    let skipped = codings.len() - honored(&codings).len();
    let is_json = arg_matches
        .get_one::<bool>("json")
        .cloned()
        .unwrap_or_default();

    tracing::debug!(count = codings.len(), skipped, "parsed coding list");

    let mut output = std::io::stdout();

    for (index, coding) in codings.iter().enumerate() {
        let info = CodingInfo::new(coding, index >= skipped);

        if is_json {
            serde_json::to_writer(&mut output, &info)?;
            writeln!(output)?;
        } else if info.honored {
            writeln!(output, "{}", info.formatted)?;
        } else {
            writeln!(output, "{}\t(ignored)", info.formatted)?;
        }
    }

    Ok(())
}
