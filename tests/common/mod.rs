use std::{future::Future, io, pin::Pin, sync::Arc};
use verdkim::{LookupTxt, Message};

pub type LookupOutput = Vec<io::Result<Vec<u8>>>;
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<LookupOutput>> + Send + 'a>>;

/// A key provider backed by a closure, for tests.
#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A provider serving fixed records, answering `NotFound` for any other
    /// query name.
    pub fn with_records(records: &'static [(&'static str, &'static str)]) -> Self {
        Self::new(move |query| {
            let query = query.to_owned();
            Box::pin(async move {
                let txts: LookupOutput = records
                    .iter()
                    .filter(|(name, _)| *name == query)
                    .map(|(_, record)| Ok(record.as_bytes().to_vec()))
                    .collect();
                if txts.is_empty() {
                    Err(io::ErrorKind::NotFound.into())
                } else {
                    Ok(txts)
                }
            })
        })
    }
}

impl LookupTxt for MockLookup {
    type Answer = LookupOutput;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let domain = domain.to_owned();

        Box::pin(async move { self.0(&domain).await })
    }
}

pub fn parse_message(text: &str) -> Message {
    Message::parse(text.replace('\n', "\r\n").as_bytes()).unwrap()
}

/// An rsa-sha256 message with simple/simple canonicalization, signed for
/// d=example.com with selector `newengland`.
pub const SIMPLE_RSA_MESSAGE: &str = "\
DKIM-Signature: a=rsa-sha256; bh=2jUSOH9NhtVGCQWNr9BrIAPreKQjO6Sn7XIkfJVOzv8=;
 c=simple/simple; d=example.com;
 h=Received:From:To:Subject:Date:Message-ID; i=joe@football.example.com;
 s=newengland; t=1615825284; v=1;
 b=Xh4Ujb2wv5x54gXtulCiy4C0e+plRm6pZ4owF+kICpYzs/8WkTVIDBrzhJP0DAYCpnL62T0G
 k+0OH8pi/yqETVjKtKk+peMnNvKkut0GeWZMTze0bfq3/JUK3Ln3jTzzpXxrgVnvBxeY9EZIL4g
 s4wwFRRKz/1bksZGSjD8uuSU=
Received: from client1.football.example.com  [192.0.2.1]
      by submitserver.example.com with SUBMISSION;
      Fri, 11 Jul 2003 21:01:54 -0700 (PDT)
From: Joe SixPack <joe@football.example.com>
To: Suzie Q <suzie@shopping.example.net>
Subject: Is dinner ready?
Date: Fri, 11 Jul 2003 21:00:37 -0700 (PDT)
Message-ID: <20030712040037.46341.5F8J@football.example.com>

Hi.

We lost the game. Are you hungry yet?

Joe.
";

/// The key record matching [`SIMPLE_RSA_MESSAGE`], with the key material in
/// the bare RSAPublicKey format.
pub const SIMPLE_RSA_KEY_RECORD: &str = "v=DKIM1; p=MIGJAoGBALVI635dLK4cJJAH3Lx6upo3X/Lm1tQz3mezcWTA3BUBnyIsdnRf57aD5BtNmhPrYYDlWlzw3UgnKisIxktkk5+iMQMlFtAS10JB8L3YadXNJY+JBcbeSi5TgJe4WFzNgW95FWDAuSTRXSWZfA/8xjflbTLDx0euFZOM7C4T0GwLAgMBAAE=";

pub const SIMPLE_RSA_QUERY: &str = "newengland._domainkey.example.com.";

pub fn simple_rsa_resolver() -> MockLookup {
    MockLookup::with_records(&[(SIMPLE_RSA_QUERY, SIMPLE_RSA_KEY_RECORD)])
}
