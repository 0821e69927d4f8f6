//! Common error types shared across the firn metadata crates.

use snafu::prelude::*;

/// Errors that can occur while encoding or decoding persisted records.
///
/// Decoding never panics: a malformed or truncated buffer always surfaces
/// as one of these variants so that recovery code can distinguish a corrupt
/// image from a programming error.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PersistError {
    /// The input buffer ended before the expected field.
    #[snafu(display("Unexpected end of input: needed {needed} more byte(s), {remaining} left"))]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A length-prefixed string was not valid UTF-8.
    #[snafu(display("Persisted string is not valid UTF-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    /// A boolean field held a byte other than 0 or 1.
    #[snafu(display("Invalid boolean byte {value:#04x}"))]
    InvalidBool { value: u8 },

    /// A collection count was negative.
    #[snafu(display("Negative collection count {count}"))]
    NegativeCount { count: i32 },

    /// An enum tag was outside the closed set for its kind.
    #[snafu(display("Unknown {kind} tag {tag}"))]
    UnknownTag { kind: &'static str, tag: u8 },

    /// A symbolic name was outside the closed set for its kind.
    #[snafu(display("Unknown {kind} name '{name}'"))]
    UnknownSymbol { kind: &'static str, name: String },
}
