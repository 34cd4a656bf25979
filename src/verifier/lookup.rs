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

use std::{
    future::Future,
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::time;
use tracing::trace;

/// A trait for resolving TXT records during verification.
///
/// This is the key-provider seam of the verifier: it asks only for the TXT
/// strings published at a domain and parses key records itself. An
/// implementation for the Hickory DNS resolver is available with the
/// **`hickory-resolver`** feature; tests inject in-memory implementations.
///
/// Errors of kind [`ErrorKind::NotFound`] mean the name does not resolve or
/// carries no TXT records; all other errors are transient transport
/// failures. Per RFC 6376, §6.1.2 both surface to the caller as a
/// retryable condition.
pub trait LookupTxt: Send + Sync {
    /// The answer to a TXT query: one entry per TXT record, with each
    /// record's character strings already concatenated.
    type Answer: IntoIterator<Item = io::Result<Vec<u8>>>;
    /// The query future.
    type Query<'a>: Future<Output = io::Result<Self::Answer>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the TXT records at `domain`.
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_>;
}

/// Fetches the TXT records of the key published at
/// `<selector>._domainkey.<domain>.`.
pub(crate) async fn look_up_key_records<T>(
    resolver: &T,
    selector: &str,
    domain: &str,
    lookup_timeout: Duration,
) -> io::Result<Vec<io::Result<String>>>
where
    T: LookupTxt + ?Sized,
{
    let selector = idna::domain_to_ascii(selector)
        .map_err(|_| io::Error::from(ErrorKind::InvalidInput))?;
    let domain =
        idna::domain_to_ascii(domain).map_err(|_| io::Error::from(ErrorKind::InvalidInput))?;

    let dname = format!("{selector}._domainkey.{domain}.");

    trace!(%dname, "looking up key records");

    let txts = match time::timeout(lookup_timeout, resolver.lookup_txt(&dname)).await {
        Ok(result) => result?,
        Err(_) => return Err(ErrorKind::TimedOut.into()),
    };

    // §6.1.2: when several key records are published, the verifier may
    // cycle through them; consider at most the first three.
    let txts = txts
        .into_iter()
        .take(3)
        .map(|txt| {
            txt.and_then(|s| String::from_utf8(s).map_err(|_| ErrorKind::InvalidData.into()))
        })
        .collect();

    Ok(txts)
}

#[cfg(feature = "hickory-resolver")]
mod hickory {
    use super::LookupTxt;
    use hickory_resolver::{error::ResolveErrorKind, Name, TokioAsyncResolver};
    use std::{
        future::Future,
        io::{self, ErrorKind},
        pin::Pin,
    };

    impl LookupTxt for TokioAsyncResolver {
        type Answer = Box<dyn Iterator<Item = io::Result<Vec<u8>>>>;
        type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

        fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
            let name = Name::from_ascii(domain);

            Box::pin(async move {
                let name = name.map_err(|_| ErrorKind::InvalidInput)?;

                let lookup = self.txt_lookup(name).await.map_err(|e| match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        io::Error::from(ErrorKind::NotFound)
                    }
                    _ => e.into(),
                })?;

                // multi-string TXT records are concatenated without separator
                let txts = lookup.into_iter().map(|txt| Ok(txt.txt_data().concat()));

                let txts: Box<dyn Iterator<Item = _>> = Box::new(txts);

                Ok(txts)
            })
        }
    }
}
