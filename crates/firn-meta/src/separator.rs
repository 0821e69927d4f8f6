//! Separator literal decoding.
//!
//! Load statements and broker-table registrations supply column separators
//! and line delimiters as string literals. A literal starting with `\x`
//! (any letter case) is a hex escape for arbitrary bytes (`"\x0907"` is
//! the two bytes `0x09 0x07`); anything else is taken verbatim. The decoded
//! form can be non-UTF-8, so separators travel as raw bytes from here on.

use snafu::prelude::*;

use crate::error::{EmptyHexSnafu, InvalidHexCharSnafu, OddHexLengthSnafu, SeparatorError};

/// Decode a separator literal into its raw byte form.
///
/// Pure: no side effects, the literal is not retained. Use [`Separator`]
/// when the original user text must survive for display.
pub fn decode(literal: &str) -> Result<Vec<u8>, SeparatorError> {
    let Some(hex) = strip_hex_prefix(literal) else {
        return Ok(literal.as_bytes().to_vec());
    };

    ensure!(!hex.is_empty(), EmptyHexSnafu);
    if let Some(ch) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return InvalidHexCharSnafu { ch }.fail();
    }
    ensure!(hex.len() % 2 == 0, OddHexLengthSnafu { len: hex.len() });

    let bytes = hex
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            // Both digits were validated above.
            let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
            (hi << 4) | lo
        })
        .collect();
    Ok(bytes)
}

/// Strip a case-insensitive `\x` prefix, returning the hex remainder.
fn strip_hex_prefix(literal: &str) -> Option<&str> {
    let rest = literal.strip_prefix('\\')?;
    rest.strip_prefix('x').or_else(|| rest.strip_prefix('X'))
}

/// A separator: the original user-supplied literal plus its decoded bytes.
///
/// The literal is what re-quoting shows (`SHOW LOAD`, error messages,
/// statement round-trips); the decoded bytes are what scanners split on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    literal: String,
    bytes: Vec<u8>,
}

impl Separator {
    /// Decode `literal`, retaining it alongside the byte form.
    pub fn parse(literal: impl Into<String>) -> Result<Self, SeparatorError> {
        let literal = literal.into();
        let bytes = decode(&literal)?;
        Ok(Self { literal, bytes })
    }

    /// The original user-supplied literal.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// The decoded byte form.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Display for Separator {
    /// Re-quote the original literal, never the decoded bytes.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'", self.literal)
    }
}
