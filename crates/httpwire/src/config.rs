//! Reader limits.
use serde::{Deserialize, Serialize};

/// Default maximum decoded body length: 16 MiB.
pub const DEFAULT_MAX_BODY_LENGTH: u64 = 16 * 1024 * 1024;
/// Default maximum header section length.
pub const DEFAULT_MAX_HEADER_LENGTH: u64 = 65536;
/// Default maximum chunk size line length.
pub const DEFAULT_MAX_LINE_LENGTH: u64 = 4096;

/// Size limits applied while reading a message.
///
/// Missing fields take their default values when deserialized.
///
/// ```
/// use httpwire::config::{Limits, DEFAULT_MAX_HEADER_LENGTH};
///
/// let limits = Limits {
///     max_body_length: 5,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_header_length, DEFAULT_MAX_HEADER_LENGTH);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of decoded body bytes delivered by the bounded stream.
    pub max_body_length: u64,
    /// Maximum number of bytes in a header or trailer section.
    pub max_header_length: u64,
    /// Maximum number of bytes in a chunk size line.
    pub max_line_length: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
            max_header_length: DEFAULT_MAX_HEADER_LENGTH,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}
