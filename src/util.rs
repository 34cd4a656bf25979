use base64ct::{Base64, Encoding};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// A trait for entities that can be represented as a canonical string.
pub trait CanonicalStr {
    /// Returns the canonical representation as a static string slice.
    fn canonical_str(&self) -> &'static str;
}

/// An error indicating malformed Base64 input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Base64Error;

impl Display for Base64Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid Base64 string")
    }
}

impl Error for Base64Error {}

/// Encodes binary data as a Base64 string.
pub fn encode_base64<T: AsRef<[u8]>>(input: T) -> String {
    Base64::encode_string(input.as_ref())
}

/// Decodes binary data from a Base64 string.
///
/// Folding whitespace, as may occur in tag values spanning multiple header
/// lines, is removed before decoding.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, Base64Error> {
    let value: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
        .collect();
    Base64::decode_vec(&value).map_err(|_| Base64Error)
}
