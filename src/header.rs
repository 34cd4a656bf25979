//! Representation of email header data.
//!
//! See RFC 5322, section 2.2.

use bstr::ByteSlice;
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

/// A header field: a name together with its body.
pub type HeaderField = (FieldName, FieldBody);

/// An error indicating a malformed header field or header block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderFieldError;

impl Display for HeaderFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header field")
    }
}

impl Error for HeaderFieldError {}

/// A header field name.
///
/// Names are printable ASCII without the colon separator. Equivalence
/// comparison is case-insensitive.
#[derive(Clone, Eq)]
pub struct FieldName(Box<str>);

impl FieldName {
    pub fn new(value: impl Into<Box<str>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();

        if value.is_empty() || !value.chars().all(|c| c.is_ascii_graphic() && c != ':') {
            return Err(HeaderFieldError);
        }

        Ok(Self(value))
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Debug for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for FieldName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq<&str> for FieldName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Hash for FieldName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

/// A header field body: the raw text after the colon, including folded
/// continuation lines, without the terminating CRLF.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct FieldBody(Box<[u8]>);

impl FieldBody {
    pub fn new(value: impl Into<Box<[u8]>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();

        for (i, line) in value.split_str("\r\n").enumerate() {
            // No control characters, including stray CR and LF; any other
            // byte (Latin 1, malformed UTF-8) is allowed.
            if line.iter().any(|b| b.is_ascii_control() && *b != b'\t') {
                return Err(HeaderFieldError);
            }

            if i != 0 {
                // Continuation lines must be folded, and must carry content
                // beyond the leading whitespace.
                if !line.starts_with(b" ") && !line.starts_with(b"\t") {
                    return Err(HeaderFieldError);
                }
                if line.iter().all(|b| matches!(b, b' ' | b'\t')) {
                    return Err(HeaderFieldError);
                }
            }
        }

        Ok(Self(value))
    }
}

impl AsRef<[u8]> for FieldBody {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for FieldBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0.as_bstr(), f)
    }
}

/// An ordered, non-empty collection of header fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderFields(Box<[HeaderField]>);

impl HeaderFields {
    pub fn new(value: impl Into<Box<[HeaderField]>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        if value.is_empty() {
            return Err(HeaderFieldError);
        }
        Ok(Self(value))
    }

    pub fn from_vec(value: Vec<(String, Vec<u8>)>) -> Result<Self, HeaderFieldError> {
        let value: Vec<_> = value
            .into_iter()
            .map(|(name, body)| {
                let name = FieldName::new(name)?;
                let body = FieldBody::new(body)?;
                Ok((name, body))
            })
            .collect::<Result<_, HeaderFieldError>>()?;
        Self::new(value)
    }

    /// Returns the bodies of all fields with the given name, preserving
    /// message order. Name comparison is case-insensitive.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldBody> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, body)| body)
    }
}

impl AsRef<[HeaderField]> for HeaderFields {
    fn as_ref(&self) -> &[HeaderField] {
        &self.0
    }
}

impl FromStr for HeaderFields {
    type Err = HeaderFieldError;

    /// Parses a header block. Convenience implementation that accepts both
    /// CRLF and bare LF line endings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut headers: Vec<HeaderField> = vec![];
        let mut current: Option<(FieldName, Vec<u8>)> = None;

        for line in s.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                let (_, body) = current.as_mut().ok_or(HeaderFieldError)?;
                body.extend_from_slice(b"\r\n");
                body.extend(line.bytes());
            } else {
                if let Some((name, body)) = current.take() {
                    headers.push((name, FieldBody::new(body)?));
                }
                let (name, body) = line.split_once(':').ok_or(HeaderFieldError)?;
                current = Some((FieldName::new(name)?, body.bytes().collect()));
            }
        }

        let (name, body) = current.ok_or(HeaderFieldError)?;
        headers.push((name, FieldBody::new(body)?));

        Self::new(headers)
    }
}
