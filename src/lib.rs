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

//! A library verifying *DomainKeys Identified Mail* (DKIM) signatures as
//! described in [RFC 6376].
//!
//! Given a raw RFC 5322 message, the verifier walks every `DKIM-Signature`
//! header and produces per-signature verdicts with structured reasons: did
//! the claimed signing domain actually sign the observed bytes, and if not,
//! why not.
//!
//! The entry point is the [`Verifier`] in module `verifier`; a [`Message`]
//! provides the parsed view of the raw message that the verifier operates
//! on. The remaining modules contain the building blocks — header data,
//! tag-list parsing, canonicalization, body hashing, key records,
//! cryptography — for users who want to assemble their own pipeline.
//!
//! DNS resolution is abstracted behind the [`LookupTxt`] trait, so key
//! lookup can be backed by a real resolver in production and by an
//! in-memory table in tests.
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`LookupTxt`] available for the [Hickory DNS resolver].
//!
//! # Trace logging
//!
//! This library uses the [tracing] crate for internal trace logging. For
//! insight into library operation, install a tracing subscriber and enable
//! logging at `trace` level.
//!
//! [RFC 6376]: https://www.rfc-editor.org/rfc/rfc6376
//! [Hickory DNS resolver]: https://crates.io/crates/hickory-resolver
//! [tracing]: https://crates.io/crates/tracing

// Where RFC 6376 is quoted in comments, section numbers are referred to
// with the symbol ‘§’ (also where RFC 6376 is not mentioned).

pub mod body_hash;
pub mod canonicalize;
pub mod crypto;
pub mod header;
pub mod message;
pub mod record;
pub mod signature;
pub mod tag_list;
mod util;
pub mod verifier;

pub use crate::{
    header::{FieldBody, FieldName, HeaderField, HeaderFields},
    message::Message,
    signature::{Canonicalization, CanonicalizationAlgorithm, SignatureTags},
    tag_list::TagMap,
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
    verifier::{Config, LookupTxt, Status, Substatus, Verdict, Verifier},
};
