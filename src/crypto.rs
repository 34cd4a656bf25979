//! Cryptographic primitives used during verification.
//!
//! # Key formats in DNS
//!
//! RFC 6376, §3.6.1 prescribes the RSAPublicKey (RFC 3447) structure for
//! the p= tag, but the examples in its appendix — and most deployed
//! signing software — publish keys in the SubjectPublicKeyInfo (RFC 5280)
//! structure instead. Key material is therefore read by trying the
//! SubjectPublicKeyInfo form first and falling back to RSAPublicKey.

use crate::util::CanonicalStr;
use digest::{Digest, DynDigest};
use rsa::{pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::Sha256;
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// A hash algorithm, as named in the hash half of the a= tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    /// The historic SHA-1 hash algorithm.
    Sha1,
    /// The SHA-256 hash algorithm.
    Sha256,
}

impl CanonicalStr for HashAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("sha1") {
            Ok(Self::Sha1)
        } else if s.eq_ignore_ascii_case("sha256") {
            Ok(Self::Sha256)
        } else {
            Err("unknown hash algorithm")
        }
    }
}

/// An error produced by the cryptographic backend.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerificationError {
    /// The key material could not be read as an RSA public key.
    InvalidKey,
    /// The signature did not verify under the given key.
    VerificationFailure,
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "unreadable key material"),
            Self::VerificationFailure => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for VerificationError {}

/// Computes the message digest of the concatenated inputs.
pub fn digest_slices<I, T>(hash_alg: HashAlgorithm, parts: I) -> Box<[u8]>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut digest: Box<dyn DynDigest> = match hash_alg {
        HashAlgorithm::Sha1 => Box::new(Sha1::new()),
        HashAlgorithm::Sha256 => Box::new(Sha256::new()),
    };

    for part in parts {
        digest.update(part.as_ref());
    }

    digest.finalize()
}

/// Reads RSA public key material as published in a key record's p= tag.
pub fn read_rsa_public_key(key_data: &[u8]) -> Result<RsaPublicKey, VerificationError> {
    RsaPublicKey::from_public_key_der(key_data)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(key_data))
        .map_err(|_| VerificationError::InvalidKey)
}

/// Verifies an RSA PKCS#1 v1.5 signature over an already computed data
/// hash.
pub fn verify_rsa(
    hash_alg: HashAlgorithm,
    public_key: &RsaPublicKey,
    data_hash: &[u8],
    signature_data: &[u8],
) -> Result<(), VerificationError> {
    let result = match hash_alg {
        HashAlgorithm::Sha1 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha1>(), data_hash, signature_data)
        }
        HashAlgorithm::Sha256 => {
            public_key.verify(Pkcs1v15Sign::new::<Sha256>(), data_hash, signature_data)
        }
    };

    result.map_err(|_| VerificationError::VerificationFailure)
}
