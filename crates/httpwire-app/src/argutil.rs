use std::{
    fs::File,
    io::{Read, Stdin, Stdout, Write},
    path::{Path, PathBuf},
};

use clap::{Arg, Command};

pub enum InputStream {
    File(File),
    Stdin(Stdin),
}

impl InputStream {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if path.as_ref().as_os_str() == "-" {
            Ok(Self::Stdin(std::io::stdin()))
        } else {
            Ok(Self::File(std::fs::File::open(path)?))
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            InputStream::File(s) => s.read(buf),
            InputStream::Stdin(s) => s.read(buf),
        }
    }
}

pub enum OutputStream {
    File(File),
    Stdout(Stdout),
}

impl OutputStream {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        if path.as_ref().as_os_str() == "-" {
            Ok(Self::Stdout(std::io::stdout()))
        } else {
            Ok(Self::File(
                std::fs::OpenOptions::new()
                    .create_new(true)
                    .write(true)
                    .open(path)?,
            ))
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputStream::File(s) => s.write(buf),
            OutputStream::Stdout(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputStream::File(s) => s.flush(),
            OutputStream::Stdout(s) => s.flush(),
        }
    }
}

pub fn build_commands() -> Command<'static> {
    let command = Command::new(clap::crate_name!())
        .about("Inspect and decode HTTP/1.1 messages")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Path to a TOML configuration file."),
        )
        .subcommand(crate::message::create_headers_command())
        .subcommand(crate::message::create_decode_command())
        .subcommand(crate::coding::create_command());

    crate::logging::logging_args(command)
}
