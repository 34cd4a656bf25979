//! Body hash computation.
//!
//! See RFC 6376, section 3.7.

use crate::crypto::{self, HashAlgorithm};
use std::fmt::{self, Display, Formatter};

/// An error indicating an l= tag claiming more content than the canonical
/// body provides.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InsufficientBodyLength;

impl Display for InsufficientBodyLength {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "body length limit exceeds canonical body")
    }
}

impl std::error::Error for InsufficientBodyLength {}

/// Computes the body hash over an already canonicalized body.
///
/// With a body length limit from the l= tag, only the first `length` octets
/// of the canonical body are hashed; a limit beyond the end of the body is
/// an error.
pub fn compute_body_hash(
    hash_alg: HashAlgorithm,
    length: Option<u64>,
    canonical_body: &[u8],
) -> Result<Box<[u8]>, InsufficientBodyLength> {
    let input = match length {
        Some(length) => {
            let length = usize::try_from(length).map_err(|_| InsufficientBodyLength)?;
            canonical_body
                .get(..length)
                .ok_or(InsufficientBodyLength)?
        }
        None => canonical_body,
    };

    Ok(crypto::digest_slices(hash_alg, [input]))
}
