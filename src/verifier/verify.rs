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

use crate::{
    body_hash, canonicalize,
    crypto::{self, HashAlgorithm},
    header::{FieldName, HeaderFields},
    message::Message,
    record::KeyRecord,
    signature::{self, CanonicalizationAlgorithm, SignatureTags},
    util::{self, CanonicalStr},
    verifier::{lookup, Config, KeyCache, LookupTxt, Substatus, Verdict},
};
use std::{io, str::FromStr, sync::Arc};
use tracing::trace;

/// Evaluates one DKIM-Signature header against the message, in the order
/// prescribed by RFC 6376, section 6.1: syntactic and policy checks first,
/// then — only when all of those pass — key lookup, body hash and the
/// cryptographic check, one verdict per candidate key.
pub(crate) async fn evaluate_signature<T>(
    resolver: &T,
    config: &Config,
    message: &Message,
    header_name: &str,
    header_value: &str,
    keys_seen: &mut KeyCache,
) -> Vec<Verdict>
where
    T: LookupTxt,
{
    let sig = SignatureTags::parse(header_value);

    let mut verdicts = vec![];

    // Required tags. Checks below are skipped where the tag they depend on
    // is absent.
    for name in sig.missing_required_tags() {
        trace!(tag = name, "required tag missing");
        verdicts.push(Verdict::permfail(
            Substatus::TagMissing,
            format!("required tag {name}= is missing"),
            &sig,
        ));
    }

    if let Some(v) = sig.get("v") {
        if v != "1" {
            verdicts.push(Verdict::permfail(
                Substatus::VersionInvalid,
                format!("unsupported signature version {v}"),
                &sig,
            ));
        }
    }

    // Canonicalization. A missing c= means simple/simple; a missing body
    // half means simple.
    let (header_canon_token, body_canon_token) = match sig.get("c") {
        Some(c) => match c.split_once('/') {
            Some((header, body)) => (header, body),
            None => (c, "simple"),
        },
        None => ("simple", "simple"),
    };

    let header_canon = match CanonicalizationAlgorithm::from_str(header_canon_token) {
        Ok(algorithm) => Some(algorithm),
        Err(_) => {
            verdicts.push(Verdict::permfail(
                Substatus::CHeaderAlgoInvalid,
                format!("unknown header canonicalization {header_canon_token}"),
                &sig,
            ));
            None
        }
    };

    let body_canon = match CanonicalizationAlgorithm::from_str(body_canon_token) {
        Ok(algorithm) => Some(algorithm),
        Err(_) => {
            verdicts.push(Verdict::permfail(
                Substatus::CBodyAlgoInvalid,
                format!("unknown body canonicalization {body_canon_token}"),
                &sig,
            ));
            None
        }
    };

    // The hash algorithm from the a= tag drives both the body hash and the
    // data hash, so resolve it before any hashing.
    let mut hash_alg = None;
    if let Some(a) = sig.get("a") {
        match signature::split_algorithm(a) {
            Some((_, hash)) => match HashAlgorithm::from_str(hash) {
                Ok(HashAlgorithm::Sha1) if !config.allow_sha1 => {
                    verdicts.push(Verdict::permfail(
                        Substatus::SignatureHashAlgoInvalid,
                        "historic sha1 hash algorithm refused by policy",
                        &sig,
                    ));
                }
                Ok(algorithm) => hash_alg = Some(algorithm),
                Err(_) => {
                    verdicts.push(Verdict::permfail(
                        Substatus::SignatureHashAlgoInvalid,
                        format!("hash algorithm {hash} is not available"),
                        &sig,
                    ));
                }
            },
            None => {
                verdicts.push(Verdict::permfail(
                    Substatus::SignatureHashAlgoInvalid,
                    format!("malformed signature algorithm {a}"),
                    &sig,
                ));
            }
        }
    }

    let canonical_body =
        body_canon.map(|algorithm| canonicalize::canonicalize_body(algorithm, message.body()));

    // The l= limit must not exceed the canonical body.
    let mut body_length = None;
    if let Some(l) = sig.get("l") {
        match l.parse::<u64>() {
            Ok(length) => {
                body_length = Some(length);
                if let Some(body) = &canonical_body {
                    if usize::try_from(length).map_or(true, |length| length > body.len()) {
                        verdicts.push(Verdict::permfail(
                            Substatus::BodyLengthMismatch,
                            format!(
                                "body length {length} exceeds canonical body of {} octets",
                                body.len()
                            ),
                            &sig,
                        ));
                    }
                }
            }
            Err(_) => {
                verdicts.push(Verdict::permfail(
                    Substatus::BodyLengthMismatch,
                    format!("invalid body length {l}"),
                    &sig,
                ));
            }
        }
    }

    // The i= domain must be d= or a subdomain of it.
    if let (Some(i), Some(d)) = (sig.get("i"), sig.get("d")) {
        let identity = i.to_ascii_lowercase();
        let domain = d.to_ascii_lowercase();
        if !identity.ends_with(&format!("@{domain}")) && !identity.ends_with(&format!(".{domain}"))
        {
            verdicts.push(Verdict::permfail(
                Substatus::AgentIdentityMismatch,
                format!("agent identity {i} does not match domain {d}"),
                &sig,
            ));
        }
    }

    // From must be among the signed headers.
    if let Some(h) = sig.get("h") {
        if !h.split(':').any(|name| name.eq_ignore_ascii_case("from")) {
            verdicts.push(Verdict::permfail(
                Substatus::FromHeaderNotSigned,
                "From header not signed",
                &sig,
            ));
        }
    }

    // Expiration. An x= in the past fails; an x= before the signature's
    // own timestamp was expired the moment it was made.
    if let Some(x) = sig.get("x").and_then(|x| x.parse::<u64>().ok()) {
        if x < config.current_timestamp() {
            trace!("signature expired");
            verdicts.push(Verdict::permfail(
                Substatus::SignatureExpired,
                format!("signature expired at {x}"),
                &sig,
            ));
        }
        if let Some(t) = sig.get("t").and_then(|t| t.parse::<u64>().ok()) {
            if x < t {
                verdicts.push(Verdict::permfail(
                    Substatus::SignatureExpiredAtSigning,
                    format!("signature expired at {x}, before its own timestamp {t}"),
                    &sig,
                ));
            }
        }
    }

    // Any failure so far rules out key lookup and crypto.
    if !verdicts.is_empty() {
        return verdicts;
    }

    // Only dns/txt key lookup is defined.
    if let Some(q) = sig.get("q") {
        if !q.split(':').any(|method| method.eq_ignore_ascii_case("dns/txt")) {
            verdicts.push(Verdict::permfail(
                Substatus::PublicKeyFormatInvalid,
                format!("no supported query method in {q}"),
                &sig,
            ));
            return verdicts;
        }
    }

    // Past this point every required tag is present and the algorithms
    // parsed, or a verdict would have been recorded above.
    let (Some(domain), Some(selector), Some(h_tag), Some(b_tag), Some(bh_tag)) = (
        sig.get("d"),
        sig.get("s"),
        sig.get("h"),
        sig.get("b"),
        sig.get("bh"),
    ) else {
        return verdicts;
    };
    let (Some(header_canon), Some(hash_alg), Some(canonical_body)) =
        (header_canon, hash_alg, canonical_body.as_deref())
    else {
        return verdicts;
    };

    trace!(domain, selector, "processing DKIM-Signature");

    // Key fetch, deduplicated through the per-call cache.
    let cache_key = (selector.to_ascii_lowercase(), domain.to_ascii_lowercase());
    let outcome = match keys_seen.get(&cache_key) {
        Some(outcome) => Arc::clone(outcome),
        None => {
            let outcome = Arc::new(
                lookup::look_up_key_records(resolver, selector, domain, config.lookup_timeout)
                    .await,
            );
            keys_seen.insert(cache_key, Arc::clone(&outcome));
            outcome
        }
    };

    let txts = match outcome.as_ref() {
        Ok(txts) if !txts.is_empty() => txts,
        Ok(_) => {
            trace!("no key records found");
            verdicts.push(Verdict::tempfail(
                Substatus::PublicKeyNotFound,
                format!("no key record found for {selector}._domainkey.{domain}"),
                &sig,
            ));
            return verdicts;
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            trace!("no key records found");
            verdicts.push(Verdict::tempfail(
                Substatus::PublicKeyNotFound,
                format!("no key record found for {selector}._domainkey.{domain}"),
                &sig,
            ));
            return verdicts;
        }
        Err(error) => {
            trace!(%error, "key lookup failed");
            verdicts.push(Verdict::tempfail(
                Substatus::PublicKeyNotFound,
                format!("key lookup for {selector}._domainkey.{domain} failed: {error}"),
                &sig,
            ));
            return verdicts;
        }
    };

    // Body hash.
    let computed_body_hash = match body_hash::compute_body_hash(hash_alg, body_length, canonical_body)
    {
        Ok(hash) => hash,
        Err(error) => {
            verdicts.push(Verdict::permfail(
                Substatus::BodyLengthMismatch,
                error.to_string(),
                &sig,
            ));
            return verdicts;
        }
    };

    let expected_body_hash = match util::decode_base64(bh_tag) {
        Ok(hash) => hash,
        Err(_) => {
            verdicts.push(Verdict::permfail(
                Substatus::BodySignatureInvalid,
                "bh= value is not valid Base64",
                &sig,
            ));
            return verdicts;
        }
    };

    if computed_body_hash.as_ref() != expected_body_hash.as_slice() {
        trace!(
            "body hash mismatch: {}",
            util::encode_base64(&computed_body_hash)
        );
        verdicts.push(Verdict::permfail(
            Substatus::BodySignatureInvalid,
            "body hash does not match bh= value",
            &sig,
        ));
        return verdicts;
    }

    trace!("body hash matched");

    // Reconstruct the data that was signed: the selected headers followed
    // by this DKIM-Signature header with its b= value emptied.
    let signed_headers: Vec<FieldName> = h_tag
        .split(':')
        .filter_map(|name| FieldName::new(name).ok())
        .collect();

    let stripped_value = signature::strip_b_tag_value(sig.raw_value());

    let data_hash = compute_data_hash(
        hash_alg,
        header_canon,
        message.headers(),
        &signed_headers,
        header_name,
        &stripped_value,
    );

    let signature_data = match util::decode_base64(b_tag) {
        Ok(data) => data,
        Err(_) => {
            verdicts.push(Verdict::permfail(
                Substatus::SignatureMismatch,
                "b= value is not valid Base64",
                &sig,
            ));
            return verdicts;
        }
    };

    // Step through the candidate keys; each yields its own verdict.
    let key_type_token = sig
        .get("a")
        .and_then(signature::split_algorithm)
        .map(|(key_type, _)| key_type)
        .unwrap_or("rsa");

    for (i, txt) in txts.iter().enumerate() {
        trace!("trying verification with key record {}", i + 1);
        verdicts.push(evaluate_key(
            txt,
            key_type_token,
            hash_alg,
            &data_hash,
            &signature_data,
            &sig,
        ));
    }

    verdicts
}

/// Computes the data hash: the canonical signed headers followed by the
/// DKIM-Signature header with the b= value emptied, the latter without
/// terminating CRLF (RFC 6376, §3.7).
pub(crate) fn compute_data_hash(
    hash_alg: HashAlgorithm,
    canon_alg: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    signed_headers: &[FieldName],
    dkim_header_name: &str,
    dkim_header_value: &str,
) -> Box<[u8]> {
    let canonical_headers = canonicalize::canonicalize_headers(canon_alg, headers, signed_headers);

    let mut canonical_sig =
        Vec::with_capacity(dkim_header_name.len() + dkim_header_value.len() + 1);
    canonicalize::canonicalize_header(
        &mut canonical_sig,
        canon_alg,
        dkim_header_name,
        dkim_header_value.as_bytes(),
    );

    crypto::digest_slices(hash_alg, [&canonical_headers[..], &canonical_sig[..]])
}

fn evaluate_key(
    txt: &io::Result<String>,
    key_type_token: &str,
    hash_alg: HashAlgorithm,
    data_hash: &[u8],
    signature_data: &[u8],
    sig: &SignatureTags,
) -> Verdict {
    let txt = match txt {
        Ok(txt) => txt,
        Err(error) => {
            trace!(%error, "unusable TXT record");
            return Verdict::permfail(
                Substatus::PublicKeyFormatInvalid,
                "unusable TXT record",
                sig,
            );
        }
    };

    let record = match KeyRecord::from_str(txt) {
        Ok(record) => record,
        Err(error) => {
            trace!(%error, "invalid key record");
            return Verdict::permfail(
                Substatus::PublicKeyFormatInvalid,
                format!("invalid key record: {error}"),
                sig,
            );
        }
    };

    if let Some(version) = record.version.as_deref() {
        if version != "DKIM1" {
            return Verdict::permfail(
                Substatus::PublicKeyVersionMismatch,
                format!("unsupported key record version {version}"),
                sig,
            );
        }
    }

    if !record.key_type.eq_ignore_ascii_case(key_type_token) {
        return Verdict::permfail(
            Substatus::PublicKeyTypeMismatch,
            format!(
                "key type {} does not match signature algorithm",
                record.key_type
            ),
            sig,
        );
    }

    if !record.key_type.eq_ignore_ascii_case("rsa") {
        return Verdict::permfail(
            Substatus::PublicKeyTypeMismatch,
            format!("unsupported key type {}", record.key_type),
            sig,
        );
    }

    let hash_token = hash_alg.canonical_str();
    if !record.allows_hash_algorithm(hash_token) {
        return Verdict::permfail(
            Substatus::PublicKeyAlgoMismatch,
            format!("hash algorithm {hash_token} not permitted by key record"),
            sig,
        );
    }

    if !record.allows_email_service() {
        return Verdict::permfail(
            Substatus::PublicKeyServiceTypeInvalid,
            "key record service type does not cover email",
            sig,
        );
    }

    if record.is_revoked() {
        trace!("key revoked");
        return Verdict::permfail(Substatus::SignatureMismatch, "public key revoked", sig);
    }

    let public_key = match crypto::read_rsa_public_key(&record.key_data) {
        Ok(key) => key,
        Err(error) => {
            trace!(%error, "unusable key material in key record");
            return Verdict::permfail(
                Substatus::PublicKeyFormatInvalid,
                "unreadable key material in key record",
                sig,
            );
        }
    };

    match crypto::verify_rsa(hash_alg, &public_key, data_hash, signature_data) {
        Ok(()) => {
            trace!("signature verified");
            Verdict::success(sig)
        }
        Err(_) => {
            trace!("signature did not verify");
            Verdict::permfail(
                Substatus::SignatureMismatch,
                "signature does not verify under key",
                sig,
            )
        }
    }
}
