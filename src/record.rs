//! DKIM public key records.
//!
//! See RFC 6376, section 3.6.1.

use crate::{tag_list::TagMap, util};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// An error indicating an unusable key record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyRecordParseError {
    /// The record carries no p= tag.
    MissingKeyTag,
    /// The p= tag is not valid Base64.
    InvalidKeyData,
}

impl Display for KeyRecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeyTag => write!(f, "p= tag missing"),
            Self::InvalidKeyData => write!(f, "invalid key data"),
        }
    }
}

impl Error for KeyRecordParseError {}

/// A public key record, as published in the TXT record at
/// `<selector>._domainkey.<domain>`.
///
/// The record captures what the publisher wrote; whether the v=, h=, k=
/// and s= tags are compatible with a particular signature is judged during
/// verification, one verdict per candidate key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRecord {
    /// The v= tag, if present. Only `DKIM1` is usable.
    pub version: Option<String>,
    /// Acceptable hash algorithm tokens from the h= tag; `None` admits any.
    pub hash_algorithms: Option<Vec<String>>,
    /// The key type from the k= tag; `rsa` when absent.
    pub key_type: String,
    /// Service types from the s= tag; `*` when absent.
    pub service_types: Vec<String>,
    /// Flags from the t= tag.
    pub flags: Vec<String>,
    /// Decoded key material from the p= tag; empty when the key has been
    /// revoked.
    pub key_data: Box<[u8]>,
}

impl FromStr for KeyRecord {
    type Err = KeyRecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tags = TagMap::from_txt_record(s);

        let version = tags.get("v").map(Into::into);
        let hash_algorithms = tags.get("h").map(split_colon_list);
        let key_type = tags.get("k").unwrap_or("rsa").into();
        let service_types = tags
            .get("s")
            .map(split_colon_list)
            .unwrap_or_else(|| vec!["*".into()]);
        let flags = tags.get("t").map(split_colon_list).unwrap_or_default();

        let key_data = match tags.get("p") {
            None => return Err(KeyRecordParseError::MissingKeyTag),
            Some("") => Box::default(),
            Some(p) => util::decode_base64(p)
                .map_err(|_| KeyRecordParseError::InvalidKeyData)?
                .into(),
        };

        Ok(Self {
            version,
            hash_algorithms,
            key_type,
            service_types,
            flags,
            key_data,
        })
    }
}

impl KeyRecord {
    /// Whether the publisher has revoked this key.
    pub fn is_revoked(&self) -> bool {
        self.key_data.is_empty()
    }

    /// Whether the record permits the given hash algorithm token.
    pub fn allows_hash_algorithm(&self, token: &str) -> bool {
        match &self.hash_algorithms {
            Some(list) => list.iter().any(|h| h.eq_ignore_ascii_case(token)),
            None => true,
        }
    }

    /// Whether the record's service types admit use with email, that is,
    /// contain `*` or `email`.
    pub fn allows_email_service(&self) -> bool {
        self.service_types
            .iter()
            .any(|s| s == "*" || s.eq_ignore_ascii_case("email"))
    }

    /// Whether the record carries the given t= flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

fn split_colon_list(value: &str) -> Vec<String> {
    value.split(':').map(|item| item.trim().to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_record() {
        let record: KeyRecord = "v=DKIM1; h=sha1:sha256; k=rsa; s=email; t=y:s; p=YWJj"
            .parse()
            .unwrap();

        assert_eq!(record.version.as_deref(), Some("DKIM1"));
        assert_eq!(
            record.hash_algorithms,
            Some(vec!["sha1".to_owned(), "sha256".to_owned()])
        );
        assert_eq!(record.key_type, "rsa");
        assert_eq!(record.service_types, ["email"]);
        assert!(record.has_flag("y"));
        assert!(record.has_flag("S"));
        assert_eq!(record.key_data.as_ref(), b"abc");
        assert!(!record.is_revoked());
    }

    #[test]
    fn parse_applies_defaults() {
        let record: KeyRecord = "p=YWJj".parse().unwrap();

        assert_eq!(record.version, None);
        assert_eq!(record.hash_algorithms, None);
        assert_eq!(record.key_type, "rsa");
        assert_eq!(record.service_types, ["*"]);
        assert!(record.flags.is_empty());

        assert!(record.allows_hash_algorithm("sha256"));
        assert!(record.allows_email_service());
    }

    #[test]
    fn empty_p_means_revoked() {
        let record: KeyRecord = "v=DKIM1; p=".parse().unwrap();

        assert!(record.is_revoked());
    }

    #[test]
    fn missing_p_is_an_error() {
        assert_eq!(
            "v=DKIM1; k=rsa".parse::<KeyRecord>(),
            Err(KeyRecordParseError::MissingKeyTag)
        );
        assert_eq!(
            "v=DKIM1; p=!!!".parse::<KeyRecord>(),
            Err(KeyRecordParseError::InvalidKeyData)
        );
    }

    #[test]
    fn hash_list_restricts() {
        let record: KeyRecord = "h=sha256; p=YWJj".parse().unwrap();

        assert!(record.allows_hash_algorithm("sha256"));
        assert!(record.allows_hash_algorithm("SHA256"));
        assert!(!record.allows_hash_algorithm("sha1"));
    }

    #[test]
    fn service_types_restrict() {
        let record: KeyRecord = "s=tlsrpt; p=YWJj".parse().unwrap();
        assert!(!record.allows_email_service());

        let record: KeyRecord = "s=tlsrpt:email; p=YWJj".parse().unwrap();
        assert!(record.allows_email_service());
    }
}
