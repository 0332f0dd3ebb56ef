//! Various string and character tools.

/// Additional character classes.
pub trait CharClassExt {
    /// Returns whether the octet is valid as a "tchar" token character.
    ///
    /// ASCII alphanumerics and ``!#$%&'*+-.^_`|~``.
    fn is_token(&self) -> bool;

    /// Returns whether the octet is a visible ASCII "VCHAR" character.
    fn is_vchar(&self) -> bool;

    /// Returns whether the octet is classified as "obs-text".
    fn is_obs_text(&self) -> bool;

    /// Returns whether the octet may appear unescaped inside a quoted-string.
    ///
    /// Space, Tab, and any visible ASCII character except DQUOTE.
    fn is_quotable(&self) -> bool;

    /// Returns whether the octet is a RFC 6265 "cookie-octet".
    ///
    /// Visible ASCII except DQUOTE, comma, semicolon, and backslash.
    fn is_cookie_octet(&self) -> bool;

    /// Returns whether the octet is valid inside a header field value.
    ///
    /// Visible ASCII, obs-text, and WS (Space Tab).
    fn is_field_text(&self) -> bool;

    /// Returns whether the octet is valid as a whitespace character.
    ///
    /// `Space Tab`
    fn is_ws(&self) -> bool;
}

impl CharClassExt for u8 {
    fn is_token(&self) -> bool {
        self.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(self)
    }

    fn is_vchar(&self) -> bool {
        self.is_ascii_graphic()
    }

    fn is_obs_text(&self) -> bool {
        *self >= 0x80
    }

    fn is_quotable(&self) -> bool {
        (self.is_vchar() && *self != b'"') || self.is_ws()
    }

    fn is_cookie_octet(&self) -> bool {
        self.is_vchar() && !b"\",;\\".contains(self)
    }

    fn is_field_text(&self) -> bool {
        self.is_vchar() || self.is_obs_text() || self.is_ws()
    }

    fn is_ws(&self) -> bool {
        b"\t ".contains(self)
    }
}

/// Returns the slice without a trailing LF or CRLF.
pub fn trim_trailing_crlf(buf: &[u8]) -> &[u8] {
    if buf.ends_with(b"\r\n") {
        &buf[0..buf.len() - 2]
    } else if buf.ends_with(b"\n") {
        &buf[0..buf.len() - 1]
    } else {
        buf
    }
}

/// Returns the slice without leading and trailing WS (Space Tab).
pub fn trim_ws(buf: &[u8]) -> &[u8] {
    let start = buf.iter().position(|c| !c.is_ws()).unwrap_or(buf.len());
    let end = buf.iter().rposition(|c| !c.is_ws()).map_or(start, |i| i + 1);

    &buf[start..end]
}
