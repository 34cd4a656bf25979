//! Tests of the Hickory resolver backend against live DNS records.
//!
//! Run with `--features hickory-resolver -- --ignored`.

#![cfg(feature = "hickory-resolver")]

use hickory_resolver::TokioAsyncResolver;
use std::io::ErrorKind;
use verdkim::{record::KeyRecord, LookupTxt};

fn resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio(Default::default(), Default::default())
}

#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_key_record_lookup() {
    let answers = resolver()
        .lookup_txt("20230601._domainkey.gmail.com.")
        .await
        .unwrap();

    let first = answers
        .into_iter()
        .next()
        .expect("no TXT records in answer")
        .unwrap();

    // multi-string TXT records arrive already concatenated
    let record = String::from_utf8(first).unwrap().parse::<KeyRecord>();

    assert!(record.is_ok());
}

#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_missing_record_maps_to_not_found() {
    let error = match resolver()
        .lookup_txt("doesnotexist._domainkey.example.com.")
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(error) => error,
    };

    assert_eq!(error.kind(), ErrorKind::NotFound);
}
