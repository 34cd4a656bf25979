//! Parsed view of an RFC 5322 message.

use crate::header::{FieldBody, FieldName, HeaderFields};
use bstr::ByteSlice;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str,
};

const CRLF: &[u8] = b"\r\n";

/// An error indicating a raw message that could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageFormatError {
    /// The header block is empty or contains a malformed field.
    InvalidHeaderBlock,
}

impl Display for MessageFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeaderBlock => write!(f, "invalid header block"),
        }
    }
}

impl Error for MessageFormatError {}

/// An RFC 5322 message, split into header fields and body.
///
/// The view is immutable after construction. Bare LF line endings are
/// normalized to CRLF on ingest, so that canonicalization always operates
/// on the normalized form. The header/body split is the first occurrence of
/// CRLF CRLF; everything after that separator is the body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    headers: HeaderFields,
    body: Box<[u8]>,
}

impl Message {
    /// Parses a raw message.
    pub fn parse(input: &[u8]) -> Result<Self, MessageFormatError> {
        let input = normalize_line_endings(input);

        let (header_block, body) = match input.find(b"\r\n\r\n") {
            Some(i) => (&input[..i], &input[i + 4..]),
            None => (&input[..], &[][..]),
        };

        let headers = parse_header_block(header_block)?;

        Ok(Self {
            headers,
            body: body.into(),
        })
    }

    /// The message's header fields, in message order.
    pub fn headers(&self) -> &HeaderFields {
        &self.headers
    }

    /// The message body octets.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Stray CR bytes not followed by LF are left alone; canonicalization treats
// them like any other byte.
fn normalize_line_endings(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut prev = 0u8;

    for &b in input {
        if b == b'\n' && prev != b'\r' {
            result.push(b'\r');
        }
        result.push(b);
        prev = b;
    }

    result
}

fn parse_header_block(block: &[u8]) -> Result<HeaderFields, MessageFormatError> {
    // a header-only message usually ends in CRLF; splitting would yield a
    // spurious trailing empty line
    let block = block.strip_suffix(CRLF).unwrap_or(block);

    let mut fields: Vec<(FieldName, Vec<u8>)> = vec![];

    for line in block.split_str(CRLF) {
        if line.starts_with(b" ") || line.starts_with(b"\t") {
            let (_, body) = fields
                .last_mut()
                .ok_or(MessageFormatError::InvalidHeaderBlock)?;
            body.extend_from_slice(CRLF);
            body.extend_from_slice(line);
        } else {
            let i = line
                .find_byte(b':')
                .ok_or(MessageFormatError::InvalidHeaderBlock)?;
            let name = str::from_utf8(&line[..i])
                .map_err(|_| MessageFormatError::InvalidHeaderBlock)?;
            let name =
                FieldName::new(name).map_err(|_| MessageFormatError::InvalidHeaderBlock)?;
            fields.push((name, line[(i + 1)..].to_vec()));
        }
    }

    let fields = fields
        .into_iter()
        .map(|(name, body)| {
            FieldBody::new(body)
                .map(|body| (name, body))
                .map_err(|_| MessageFormatError::InvalidHeaderBlock)
        })
        .collect::<Result<Vec<_>, _>>()?;

    HeaderFields::new(fields).map_err(|_| MessageFormatError::InvalidHeaderBlock)
}
