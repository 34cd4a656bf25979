//! Canonicalization of header fields and message bodies.
//!
//! See RFC 6376, section 3.4. Canonicalization recognizes only CRLF as line
//! separator; stray CR and LF bytes pass through like any other byte.

use crate::{
    header::{FieldName, HeaderFields},
    signature::CanonicalizationAlgorithm,
};
use bstr::ByteSlice;
use std::collections::HashSet;

const SP: u8 = b' ';
const CRLF: &[u8] = b"\r\n";

/// Canonicalizes a message body.
pub fn canonicalize_body(algorithm: CanonicalizationAlgorithm, body: &[u8]) -> Vec<u8> {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            // §3.4.3: strip trailing empty lines, terminate with exactly one
            // CRLF; an empty body becomes a single CRLF
            let mut result = body.to_vec();
            truncate_trailing_crlf(&mut result);
            result.extend_from_slice(CRLF);
            result
        }
        CanonicalizationAlgorithm::Relaxed => {
            // §3.4.4: compress WSP and strip trailing WSP on each line, then
            // the simple trailing-empty-line rule; an empty body stays empty
            let mut result = Vec::with_capacity(body.len());
            for (i, line) in body.split_str(CRLF).enumerate() {
                if i != 0 {
                    result.extend_from_slice(CRLF);
                }
                compress_wsp(&mut result, line);
            }
            truncate_trailing_crlf(&mut result);
            if !result.is_empty() {
                result.extend_from_slice(CRLF);
            }
            result
        }
    }
}

fn truncate_trailing_crlf(result: &mut Vec<u8>) {
    while result.ends_with(CRLF) {
        result.truncate(result.len() - 2);
    }
}

// Reduce WSP runs to a single SP, drop trailing WSP. A line of only WSP
// becomes an empty line.
fn compress_wsp(result: &mut Vec<u8>, line: &[u8]) {
    let mut pending_wsp = false;

    for &b in line {
        if matches!(b, b' ' | b'\t') {
            pending_wsp = true;
        } else {
            if pending_wsp {
                result.push(SP);
                pending_wsp = false;
            }
            result.push(b);
        }
    }
}

/// Produces the header canonicalization result for the selected header
/// fields.
///
/// Each name in `selected` consumes the next unused field of that name from
/// the bottom of the header block (§5.4.2); a name with no remaining match
/// contributes nothing. Every emitted field is terminated with CRLF.
pub fn canonicalize_headers(
    algorithm: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    selected: &[FieldName],
) -> Vec<u8> {
    let mut result = vec![];
    let mut used = HashSet::with_capacity(selected.len());

    for name in selected {
        // index is counted from the bottom of the header block
        let next = headers
            .as_ref()
            .iter()
            .rev()
            .enumerate()
            .find(|(i, (n, _))| !used.contains(i) && n == name);

        if let Some((i, (n, body))) = next {
            canonicalize_header(&mut result, algorithm, n.as_ref(), body.as_ref());
            result.extend_from_slice(CRLF);
            used.insert(i);
        }
    }

    result
}

/// Canonicalizes a single header field into `result`, without terminating
/// CRLF.
pub fn canonicalize_header(
    result: &mut Vec<u8>,
    algorithm: CanonicalizationAlgorithm,
    name: &str,
    body: &[u8],
) {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            result.extend_from_slice(name.as_bytes());
            result.push(b':');
            result.extend_from_slice(body);
        }
        CanonicalizationAlgorithm::Relaxed => {
            result.extend(name.to_ascii_lowercase().bytes());
            result.push(b':');
            relaxed_header_body(result, body);
        }
    }
}

// §3.4.2: unfold, reduce runs of FWS to a single SP, strip WSP around the
// value and next to the colon.
fn relaxed_header_body(result: &mut Vec<u8>, body: &[u8]) {
    fn is_fws(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n')
    }

    let body = body.trim_with(is_fws);

    let mut compressing = false;
    for &b in body {
        if is_fws(b.into()) {
            compressing = true;
        } else {
            if compressing {
                result.push(SP);
                compressing = false;
            }
            result.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    fn canon_body(algorithm: CanonicalizationAlgorithm, body: &[u8]) -> Vec<u8> {
        canonicalize_body(algorithm, body)
    }

    #[test]
    fn body_simple_ok() {
        use CanonicalizationAlgorithm::Simple;

        assert_eq!(
            canon_body(Simple, b"well  hello \r\n\r\n what agi \r\n\r\n\r\n"),
            b"well  hello \r\n\r\n what agi \r\n"
        );
        assert_eq!(canon_body(Simple, b"abc"), b"abc\r\n");
        assert_eq!(canon_body(Simple, b""), b"\r\n");
        assert_eq!(canon_body(Simple, b"\r\n\r\n"), b"\r\n");
    }

    #[test]
    fn body_relaxed_ok() {
        use CanonicalizationAlgorithm::Relaxed;

        assert_eq!(
            canon_body(Relaxed, b"well  hello \r\n\r\n what agi \r\n\r\n\r\n"),
            b"well hello\r\n\r\n what agi\r\n"
        );
        assert_eq!(canon_body(Relaxed, b""), b"");
        assert_eq!(canon_body(Relaxed, b"\r\n"), b"");
        assert_eq!(canon_body(Relaxed, b"a \t b\r\n"), b"a b\r\n");
    }

    #[test]
    fn body_relaxed_wsp_only_line_becomes_empty() {
        use CanonicalizationAlgorithm::Relaxed;

        assert_eq!(canon_body(Relaxed, b"a\r\n \t\r\nb\r\n"), b"a\r\n\r\nb\r\n");
        // trailing WSP-only lines are subject to empty-line stripping
        assert_eq!(canon_body(Relaxed, b"a\r\n \t\r\n"), b"a\r\n");
    }

    #[test]
    fn body_simple_terminates_in_one_crlf() {
        use CanonicalizationAlgorithm::Simple;

        for input in [&b""[..], b"x", b"x\r\n", b"x\r\n\r\n", b"\r\n", b"\r\n\r\nx"] {
            let result = canon_body(Simple, input);
            assert!(result.ends_with(b"\r\n"));
            assert!(!result.ends_with(b"\r\n\r\n"));
        }
    }

    #[test]
    fn headers_relaxed_ok() {
        let headers = HeaderFields::from_vec(vec![
            ("from".to_owned(), b" Good \t ".to_vec()),
            ("to".to_owned(), b" see   me".to_vec()),
            ("Date".to_owned(), b" Fri 24\r\n\tfoo".to_vec()),
            ("To".to_owned(), b" another one".to_vec()),
        ])
        .unwrap();

        let selected = [
            FieldName::new("to").unwrap(),
            FieldName::new("from").unwrap(),
            FieldName::new("to").unwrap(),
        ];

        assert_eq!(
            BStr::new(&canonicalize_headers(
                CanonicalizationAlgorithm::Relaxed,
                &headers,
                &selected,
            )),
            BStr::new(b"to:another one\r\nfrom:Good\r\nto:see me\r\n"),
        );
    }

    #[test]
    fn headers_simple_passes_through() {
        let headers: HeaderFields = "From: me \nSubject: a  b\n".parse().unwrap();

        let selected = [
            FieldName::new("Subject").unwrap(),
            FieldName::new("From").unwrap(),
            FieldName::new("Missing").unwrap(),
        ];

        assert_eq!(
            canonicalize_headers(CanonicalizationAlgorithm::Simple, &headers, &selected),
            b"Subject: a  b\r\nFrom: me \r\n"
        );
    }

    #[test]
    fn header_relaxed_unfolds_and_lowercases() {
        let mut result = vec![];
        canonicalize_header(
            &mut result,
            CanonicalizationAlgorithm::Relaxed,
            "SUBJECT",
            b" Is \r\n\t dinner  ready? ",
        );

        assert_eq!(result, b"subject:Is dinner ready?");
    }

    #[test]
    fn header_relaxed_is_idempotent() {
        let inputs: [&[u8]; 3] = [
            b" a  b\r\n\tc ",
            b"x",
            b"\tfolded\r\n value here  ",
        ];

        for input in inputs {
            let mut once = vec![];
            canonicalize_header(&mut once, CanonicalizationAlgorithm::Relaxed, "N", input);

            // run the canonical output through again, minus the name prefix
            let body = &once[2..];
            let mut twice = vec![];
            canonicalize_header(&mut twice, CanonicalizationAlgorithm::Relaxed, "N", body);

            assert_eq!(once, twice);
        }
    }
}
