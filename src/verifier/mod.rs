// verdkim – verification of DKIM signatures in email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Verifier and supporting types.

mod lookup;
mod verify;

pub use lookup::LookupTxt;

use crate::{
    message::Message,
    signature::{SignatureTags, DKIM_SIGNATURE_NAME},
    tag_list::TagMap,
    util::CanonicalStr,
};
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    io,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::trace;

/// Verifier configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Timeout for a single key record lookup.
    pub lookup_timeout: Duration,
    /// Maximum number of DKIM-Signature headers evaluated per message.
    pub max_signatures: usize,
    /// Whether the historic SHA-1 hash algorithm is acceptable. When
    /// `false`, rsa-sha1 signatures fail with
    /// `SIGNATURE_HASH_ALGO_INVALID`.
    pub allow_sha1: bool,
    /// Overrides the current time used in expiration checks; when `None`
    /// the system clock is consulted.
    pub fixed_timestamp: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(10),
            max_signatures: 20,
            allow_sha1: true,
            fixed_timestamp: None,
        }
    }
}

impl Config {
    pub(crate) fn current_timestamp(&self) -> u64 {
        self.fixed_timestamp.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
    }
}

/// The status of a verdict.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    /// The signature verified against a key.
    Success,
    /// The signature is definitively bad.
    Permfail(Substatus),
    /// A transient failure; the caller may retry later.
    Tempfail(Substatus),
    /// The message carried no DKIM signatures.
    Unsigned,
}

impl Status {
    /// Returns this status's substatus code.
    pub fn substatus(&self) -> Substatus {
        match self {
            Self::Success => Substatus::Success,
            Self::Permfail(substatus) | Self::Tempfail(substatus) => *substatus,
            Self::Unsigned => Substatus::Unsigned,
        }
    }
}

impl CanonicalStr for Status {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Permfail(_) => "PERMFAIL",
            Self::Tempfail(_) => "TEMPFAIL",
            Self::Unsigned => "UNSIGNED",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

/// Stable per-verdict detail codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Substatus {
    Success,
    Unsigned,
    TagMissing,
    VersionInvalid,
    CHeaderAlgoInvalid,
    CBodyAlgoInvalid,
    BodyLengthMismatch,
    AgentIdentityMismatch,
    FromHeaderNotSigned,
    SignatureExpired,
    SignatureExpiredAtSigning,
    PublicKeyNotFound,
    PublicKeyFormatInvalid,
    PublicKeyVersionMismatch,
    PublicKeyAlgoMismatch,
    PublicKeyTypeMismatch,
    PublicKeyServiceTypeInvalid,
    SignatureHashAlgoInvalid,
    BodySignatureInvalid,
    SignatureMismatch,
}

impl CanonicalStr for Substatus {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unsigned => "UNSIGNED",
            Self::TagMissing => "TAG_MISSING",
            Self::VersionInvalid => "VERSION_INVALID",
            Self::CHeaderAlgoInvalid => "C_HEADER_ALGO_INVALID",
            Self::CBodyAlgoInvalid => "C_BODY_ALGO_INVALID",
            Self::BodyLengthMismatch => "BODY_LENGTH_MISMATCH",
            Self::AgentIdentityMismatch => "AGENT_IDENTITY_MISMATCH",
            Self::FromHeaderNotSigned => "FROM_HEADER_NOT_SIGNED",
            Self::SignatureExpired => "SIGNATURE_EXPIRED",
            Self::SignatureExpiredAtSigning => "SIGNATURE_EXPIRED_AT_SIGNING",
            Self::PublicKeyNotFound => "PUBLIC_KEY_NOT_FOUND",
            Self::PublicKeyFormatInvalid => "PUBLIC_KEY_FORMAT_INVALID",
            Self::PublicKeyVersionMismatch => "PUBLIC_KEY_VERSION_MISMATCH",
            Self::PublicKeyAlgoMismatch => "PUBLIC_KEY_ALGO_MISMATCH",
            Self::PublicKeyTypeMismatch => "PUBLIC_KEY_TYPE_MISMATCH",
            Self::PublicKeyServiceTypeInvalid => "PUBLIC_KEY_SERVICE_TYPE_INVALID",
            Self::SignatureHashAlgoInvalid => "SIGNATURE_HASH_ALGO_INVALID",
            Self::BodySignatureInvalid => "BODY_SIGNATURE_INVALID",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
        }
    }
}

impl Display for Substatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

/// A single verification verdict.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verdict {
    /// The status, carrying its substatus code.
    pub status: Status,
    /// A human-readable explanation.
    pub reason: String,
    /// A snapshot of the signature's tags; empty for an unsigned message.
    pub tags: TagMap,
}

impl Verdict {
    pub(crate) fn success(sig: &SignatureTags) -> Self {
        Self {
            status: Status::Success,
            reason: "signature verified".into(),
            tags: sig.tags().clone(),
        }
    }

    pub(crate) fn permfail(
        substatus: Substatus,
        reason: impl Into<String>,
        sig: &SignatureTags,
    ) -> Self {
        Self {
            status: Status::Permfail(substatus),
            reason: reason.into(),
            tags: sig.tags().clone(),
        }
    }

    pub(crate) fn tempfail(
        substatus: Substatus,
        reason: impl Into<String>,
        sig: &SignatureTags,
    ) -> Self {
        Self {
            status: Status::Tempfail(substatus),
            reason: reason.into(),
            tags: sig.tags().clone(),
        }
    }

    pub(crate) fn unsigned() -> Self {
        Self {
            status: Status::Unsigned,
            reason: "No DKIM signatures found".into(),
            tags: TagMap::default(),
        }
    }

    /// Returns the verdict's substatus code.
    pub fn substatus(&self) -> Substatus {
        self.status.substatus()
    }
}

// Key fetch outcomes seen during a single validate call, by lowercased
// (selector, domain) pair.
pub(crate) type KeyCache = HashMap<(String, String), Arc<io::Result<Vec<io::Result<String>>>>>;

/// A verifier validating all DKIM signatures of a message.
///
/// The verifier holds only configuration; each [`validate`][Self::validate]
/// call is an independent computation over an immutable message, so a
/// single verifier may be shared freely.
///
/// # Examples
///
/// ```no_run
/// # async fn f<T: verdkim::LookupTxt>(resolver: T) {
/// use verdkim::{Config, Message, Verifier};
///
/// let message = Message::parse(b"From: me@example.com\r\n\r\nHi!\r\n").unwrap();
///
/// let verifier = Verifier::new(Config::default());
///
/// for verdicts in verifier.validate(&resolver, &message).await {
///     for verdict in verdicts {
///         println!("{}: {}", verdict.substatus(), verdict.reason);
///     }
/// }
/// # }
/// ```
pub struct Verifier {
    config: Config,
}

impl Verifier {
    /// Creates a verifier with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Validates every DKIM-Signature header of the message.
    ///
    /// Returns one inner list per signature, in message order, each
    /// carrying at least one verdict: one per candidate key once key
    /// records are in play, or one per failed precondition before that. A
    /// message without signatures yields a single
    /// [`Unsigned`][Status::Unsigned] verdict.
    pub async fn validate<T>(&self, resolver: &T, message: &Message) -> Vec<Vec<Verdict>>
    where
        T: LookupTxt,
    {
        let signatures: Vec<(&str, String)> = message
            .headers()
            .as_ref()
            .iter()
            .filter(|(name, _)| *name == DKIM_SIGNATURE_NAME)
            .take(self.config.max_signatures)
            .map(|(name, body)| {
                (
                    name.as_ref(),
                    String::from_utf8_lossy(body.as_ref()).into_owned(),
                )
            })
            .collect();

        if signatures.is_empty() {
            trace!("message carries no DKIM-Signature header");
            return vec![vec![Verdict::unsigned()]];
        }

        let mut keys_seen = KeyCache::new();

        let mut results = Vec::with_capacity(signatures.len());
        for (name, value) in &signatures {
            let verdicts = verify::evaluate_signature(
                resolver,
                &self.config,
                message,
                name,
                value,
                &mut keys_seen,
            )
            .await;
            results.push(verdicts);
        }

        results
    }

    /// Convenience boolean form.
    ///
    /// True iff the message carries exactly one signature whose sole
    /// verdict is [`Success`][Status::Success].
    pub async fn validate_boolean<T>(&self, resolver: &T, message: &Message) -> bool
    where
        T: LookupTxt,
    {
        let results = self.validate(resolver, message).await;

        matches!(
            results.as_slice(),
            [verdicts] if matches!(verdicts.as_slice(), [v] if v.status == Status::Success)
        )
    }
}
