//! Tag-list parsing.
//!
//! DKIM carries its data as tag=value lists, both in the DKIM-Signature
//! header field and in key records published in DNS (RFC 6376, §3.2).
//! Parsing is deliberately forgiving: malformed items are skipped rather
//! than rejected wholesale, so that one broken tag cannot hide the others
//! from diagnostics.

/// A map from tag names to their values.
///
/// Insertion order is preserved; assigning to an existing name overwrites
/// the value in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagMap(Vec<(String, String)>);

impl TagMap {
    /// Parses the value of a DKIM-Signature header field.
    ///
    /// All whitespace is removed first: folded header values may carry FWS
    /// anywhere between tokens. Items without a `=`, or with an empty name,
    /// are skipped; a later duplicate tag overwrites the earlier one.
    pub fn from_header_value(value: &str) -> Self {
        let stripped: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
            .collect();
        Self::from_items(stripped.split(';'))
    }

    /// Parses the content of a DNS TXT key record.
    ///
    /// The record is split on `;`, each item is trimmed and split at its
    /// first `=`.
    pub fn from_txt_record(value: &str) -> Self {
        Self::from_items(value.split(';').map(str::trim))
    }

    fn from_items<'a>(items: impl Iterator<Item = &'a str>) -> Self {
        let mut tags: Vec<(String, String)> = vec![];

        for item in items {
            let Some((name, value)) = item.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(entry) = tags.iter_mut().find(|entry| entry.0 == name) {
                entry.1 = value.into();
            } else {
                tags.push((name.into(), value.into()));
            }
        }

        Self(tags)
    }

    /// Looks up a tag value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a tag with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
