use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};

use clap::{Arg, ArgMatches, Command};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

pub fn logging_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .short('l')
                .global(true)
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("warn")
                .default_value_if("verbose", None, Some("info"))
                .help("Set the level of severity of logging messages."),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .global(true)
                .conflicts_with("log_level")
                .help("Print informative messages. Set log level to 'info'."),
        )
        .arg(
            Arg::new("log_filter")
                .long("log-filter")
                .global(true)
                .conflicts_with("log_level")
                .takes_value(true)
                .help("Filter level of severity and targets of logging messages."),
        )
        .arg(
            Arg::new("log_file")
                .long("log-file")
                .global(true)
                .takes_value(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write logging messages to a file."),
        )
        .arg(
            Arg::new("log_format")
                .long("log-format")
                .global(true)
                .value_parser(["default", "json"])
                .default_value("default")
                .help("Format of logging messages."),
        )
}

pub fn set_up_logging(arg_matches: &ArgMatches) -> anyhow::Result<()> {
    let filter = log_filter(arg_matches)?;
    let log_file = arg_matches.get_one::<PathBuf>("log_file");
    let ansi = log_file.is_none() && use_console_color_stderr();

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let is_json = arg_matches
        .get_one::<String>("log_format")
        .map_or(false, |format| format == "json");
    let (layer_default, layer_json) = if is_json {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .json();
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer_default)
        .with(layer_json)
        .init();

    Ok(())
}

fn log_filter(arg_matches: &ArgMatches) -> anyhow::Result<EnvFilter> {
    Ok(match arg_matches.get_one::<String>("log_filter") {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => {
            let level = arg_matches
                .get_one::<String>("log_level")
                .map(String::as_str)
                .unwrap_or("warn");
            EnvFilter::try_new(format!("httpwire={0},httpwire_app={0}", level))?
        }
    })
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

pub fn use_console_color_stderr() -> bool {
    console::colors_enabled_stderr() && std::env::var_os("NO_COLOR").is_none()
}
