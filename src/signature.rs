//! DKIM-Signature header data.

use crate::{tag_list::TagMap, util::CanonicalStr};
use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// The DKIM-Signature header field name.
pub const DKIM_SIGNATURE_NAME: &str = "DKIM-Signature";

/// Tags that every DKIM-Signature must carry (RFC 6376, §3.5).
pub const REQUIRED_TAGS: &[&str] = &["v", "a", "b", "bh", "d", "h", "s"];

/// A canonicalization algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CanonicalizationAlgorithm {
    /// The *simple* canonicalization algorithm.
    #[default]
    Simple,
    /// The *relaxed* canonicalization algorithm.
    Relaxed,
}

impl CanonicalStr for CanonicalizationAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

impl Display for CanonicalizationAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for CanonicalizationAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("simple") {
            Ok(Self::Simple)
        } else if s.eq_ignore_ascii_case("relaxed") {
            Ok(Self::Relaxed)
        } else {
            Err("unknown canonicalization algorithm")
        }
    }
}

/// A pair of header/body canonicalization algorithms, as carried in the c=
/// tag.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Canonicalization {
    /// The header canonicalization.
    pub header: CanonicalizationAlgorithm,
    /// The body canonicalization.
    pub body: CanonicalizationAlgorithm,
}

impl CanonicalStr for Canonicalization {
    fn canonical_str(&self) -> &'static str {
        use CanonicalizationAlgorithm::*;

        match (self.header, self.body) {
            (Simple, Simple) => "simple/simple",
            (Simple, Relaxed) => "simple/relaxed",
            (Relaxed, Simple) => "relaxed/simple",
            (Relaxed, Relaxed) => "relaxed/relaxed",
        }
    }
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for Canonicalization {
    type Err = &'static str;

    /// Parses a c= tag value. When the `/` and body half are absent, the
    /// body canonicalization defaults to simple.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('/') {
            Some((header, body)) => Self {
                header: header.parse()?,
                body: body.parse()?,
            },
            None => Self {
                header: s.parse()?,
                body: Default::default(),
            },
        })
    }
}

/// Splits an a= tag value into its key type and hash algorithm halves.
///
/// The tag has the shape `<keytype>-<hash>`; the split is at the last `-`.
pub fn split_algorithm(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once('-')
}

/// The parsed tags of a DKIM-Signature header, together with the original
/// header text.
///
/// The original text is retained because the data hash covers the
/// DKIM-Signature header itself, with only the b= value emptied out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureTags {
    tags: TagMap,
    raw_value: String,
}

impl SignatureTags {
    /// Parses a raw DKIM-Signature header value.
    ///
    /// Parsing itself never fails: malformed items are skipped, and missing
    /// required tags are reported by [`missing_required_tags`][Self::missing_required_tags].
    pub fn parse(raw_value: &str) -> Self {
        Self {
            tags: TagMap::from_header_value(raw_value),
            raw_value: raw_value.into(),
        }
    }

    /// Looks up a tag value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name)
    }

    /// The parsed tag map.
    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// The original header text.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// Returns the required tags absent from this signature, in canonical
    /// order.
    pub fn missing_required_tags(&self) -> Vec<&'static str> {
        REQUIRED_TAGS
            .iter()
            .copied()
            .filter(|name| !self.tags.contains(name))
            .collect()
    }
}

/// Returns the header value with the b= tag value emptied out.
///
/// The replacement covers everything between the `=` and the next `;` or
/// the end of the header, so a final b= tag without trailing `;` is handled
/// as well. Only the string is cloned when a value is actually removed.
pub fn strip_b_tag_value(value: &str) -> Cow<'_, str> {
    let mut start = 0;

    loop {
        let end = value[start..]
            .find(';')
            .map(|i| start + i)
            .unwrap_or(value.len());

        let item = &value[start..end];
        if let Some(eq) = item.find('=') {
            let name = item[..eq].trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
            if name == "b" {
                let value_start = start + eq + 1;
                if value_start == end {
                    return Cow::Borrowed(value);
                }
                let mut result = String::with_capacity(value.len());
                result.push_str(&value[..value_start]);
                result.push_str(&value[end..]);
                return Cow::Owned(result);
            }
        }

        if end == value.len() {
            return Cow::Borrowed(value);
        }
        start = end + 1;
    }
}
