//! IO helpers.

use std::io::{BufRead, Result};

use crate::{
    error::{Error, Violation},
    stringutil::trim_trailing_crlf,
};

/// Extension trait for [std::io::BufRead].
///
/// This is the line source consumed by the header reader and the chunked
/// decoder.
pub trait BufReadMoreExt {
    /// Reads bytes into `buf` until the delimiter `byte` or EOF is reached.
    ///
    /// This function is similar to [std::io::BufRead::read_until].
    /// In addition, this function returns an error when the number of bytes
    /// read equals `limit` and the deliminator has not been reached.
    fn read_limit_until(&mut self, byte: u8, buf: &mut Vec<u8>, limit: u64) -> Result<usize>;

    /// Reads one LF terminated line into `buf` without the LF or CRLF.
    ///
    /// `buf` is cleared first. Returns true if a terminated line was read, or
    /// false if EOF was reached first; in that case `buf` holds any partial
    /// line. An empty `buf` with true means a blank line.
    fn read_line_limit(&mut self, buf: &mut Vec<u8>, limit: u64) -> Result<bool>;
}

impl<R: BufRead> BufReadMoreExt for R {
    fn read_limit_until(&mut self, byte: u8, buf: &mut Vec<u8>, limit: u64) -> Result<usize> {
        // Compiler won't use Take<&mut R> in trait here so it's in a separate function.
        read_limit_until(self, byte, buf, limit)
    }

    fn read_line_limit(&mut self, buf: &mut Vec<u8>, limit: u64) -> Result<bool> {
        buf.clear();
        read_limit_until(self, b'\n', buf, limit)?;

        Ok(strip_line_ending(buf))
    }
}

/// Removes a trailing LF or CRLF from `buf`.
///
/// Returns whether the line was LF terminated.
pub(crate) fn strip_line_ending(buf: &mut Vec<u8>) -> bool {
    let terminated = buf.ends_with(b"\n");
    let len = trim_trailing_crlf(buf).len();
    buf.truncate(len);

    terminated
}

fn read_limit_until<R: BufRead>(
    stream: R,
    byte: u8,
    buf: &mut Vec<u8>,
    limit: u64,
) -> Result<usize> {
    let mut stream = stream.take(limit);
    let amount = stream.read_until(byte, buf)?;

    if amount as u64 == limit && !buf.ends_with(&[byte]) {
        return Err(Error::ProtocolViolation(Violation::LineTooLong).into());
    }

    Ok(amount)
}
