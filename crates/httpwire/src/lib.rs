//! HTTP/1.1 wire format core.
//!
//! Turns raw bytes from a connection into a validated header list and a
//! decoded message body, and validates or formats the structured grammars
//! header values are built from.

#![warn(missing_docs)]
pub mod body;
pub mod bounded;
pub mod chunked;
pub mod coding;
pub mod compress;
pub mod config;
pub mod error;
pub mod grammar;
pub mod header;
pub mod io;
mod nomutil;
pub mod params;
pub mod stringutil;

pub use error::Error;
