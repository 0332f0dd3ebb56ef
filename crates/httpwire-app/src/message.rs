use std::{
    io::{BufRead, BufReader, Cursor, Read, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use httpwire::{
    body::{BodyDecoder, Framing},
    error::format_to_string,
    header::{HeaderList, HeaderReader},
    io::BufReadMoreExt,
};
use serde::Serialize;

use crate::{
    argutil::{InputStream, OutputStream},
    config::AppConfig,
};

const START_LINE_LIMIT: u64 = 8192;

pub fn create_headers_command() -> Command<'static> {
    Command::new("headers")
        .about("Print the header fields of an HTTP message")
        .long_about(
            "Read the start line and header fields of an HTTP message and \
            print the header fields in order. The start line is optional.",
        )
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to a file containing the raw message"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Format the output as JSON"),
        )
}

pub fn create_decode_command() -> Command<'static> {
    Command::new("decode")
        .about("Write the decoded body of an HTTP message")
        .long_about(
            "Read an HTTP message and write its body with the transfer \
            codings and content codings removed.",
        )
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to a file containing the raw message"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .default_value("-")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to output file"),
        )
        .arg(
            Arg::new("max_length")
                .long("max-length")
                .takes_value(true)
                .value_parser(clap::value_parser!(u64))
                .help("Maximum number of body bytes to read"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .takes_value(true)
                .value_parser(clap::value_parser!(u16).range(100..=999))
                .help("Response status code when the message has no status line"),
        )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Status {
        version: String,
        status_code: u16,
        reason: String,
    },
}

impl StartLine {
    /// Returns the start line, or `None` if the line is not one.
    pub fn parse(line: &str) -> Option<Self> {
        if line.starts_with("HTTP/") {
            let mut parts = line.splitn(3, ' ');
            let version = parts.next()?.to_string();
            let status_code = parts.next()?.parse::<u16>().ok()?;
            let reason = parts.next().unwrap_or_default().to_string();

            return Some(StartLine::Status {
                version,
                status_code,
                reason,
            });
        }

        let parts = line.split(' ').collect::<Vec<&str>>();

        match parts.as_slice() {
            [method, target, version] if version.starts_with("HTTP/") && !method.is_empty() => {
                Some(StartLine::Request {
                    method: method.to_string(),
                    target: target.to_string(),
                    version: version.to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            StartLine::Request { .. } => None,
            StartLine::Status { status_code, .. } => Some(*status_code),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageHead {
    start_line: Option<StartLine>,
    headers: HeaderList,
}

fn read_message_head<R: BufRead>(
    stream: &mut R,
    header_reader: &mut HeaderReader,
) -> anyhow::Result<MessageHead> {
    let mut first_line = Vec::new();
    stream
        .read_limit_until(b'\n', &mut first_line, START_LINE_LIMIT)
        .map_err(httpwire::Error::from)
        .context("failed to read start line")?;

    let start_line = StartLine::parse(
        String::from_utf8_lossy(&first_line)
            .trim_end_matches(&['\r', '\n'][..]),
    );

    tracing::debug!(?start_line, "start line");

    let headers = if start_line.is_some() {
        header_reader.read_headers(&mut *stream)
    } else {
        header_reader.read_headers(Cursor::new(first_line).chain(&mut *stream))
    }
    .context("failed to read header fields")?;

    Ok(MessageHead {
        start_line,
        headers,
    })
}

pub fn run_headers(arg_matches: &ArgMatches) -> anyhow::Result<()> {
    let config = AppConfig::load(arg_matches)?;
    let path = arg_matches.get_one::<PathBuf>("input").unwrap();
    let input = InputStream::open(path).context("failed to open file")?;
    let mut input = BufReader::new(input);
    let mut header_reader = HeaderReader::from_limits(&config.limits);

    let head = read_message_head(&mut input, &mut header_reader)?;
    let mut output = std::io::stdout();

    let is_json = arg_matches
        .get_one::<bool>("json")
        .cloned()
        .unwrap_or_default();

    if is_json {
        serde_json::to_writer(&mut output, &head)?;
        writeln!(output)?;
    } else {
        write!(output, "{}", head.headers)?;
    }

    Ok(())
}

pub fn run_decode(arg_matches: &ArgMatches) -> anyhow::Result<()> {
    let config = AppConfig::load(arg_matches)?;
    let path = arg_matches.get_one::<PathBuf>("input").unwrap();
    let input = InputStream::open(path).context("failed to open file")?;
    let mut input = BufReader::new(input);
    let mut header_reader = HeaderReader::from_limits(&config.limits);

    let head = read_message_head(&mut input, &mut header_reader)?;
    let status = arg_matches
        .get_one::<u16>("status")
        .copied()
        .or_else(|| head.start_line.as_ref().and_then(StartLine::status_code));

    let framing = match status {
        Some(status) => Framing::from_response(status, &head.headers),
        None => Framing::from_request(&head.headers),
    }
    .context("invalid message framing")?;

    tracing::info!(?status, chunked = framing.is_chunked(), "decoding body");

    let mut decoder = BodyDecoder::from_limits(config.limits);

    if let Some(max_length) = arg_matches.get_one::<u64>("max_length") {
        decoder.set_max_length(*max_length);
    }

    let output = arg_matches.get_one::<PathBuf>("output").unwrap();
    let mut output = OutputStream::open(output).context("failed to create file")?;

    let amount = match decoder.decode_with(&framing, &mut input, |body| {
        Ok(std::io::copy(body, &mut output)?)
    }) {
        Ok(amount) => amount,
        Err(error) => {
            tracing::warn!(error = %format_to_string(&error), "body decode failed");
            return Err(error).context("failed to decode body");
        }
    };

    output.flush()?;

    tracing::info!(amount, "decoded body");

    Ok(())
}
