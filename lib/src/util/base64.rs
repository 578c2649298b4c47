use std::fmt::Display;

use base64ct::{Base64UrlUnpadded, Encoding};

/// Longest prefix shown by [`encode_abbreviated`].
const ABBREVIATED_LEN: usize = 12;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Base64String(String);

impl Display for Base64String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Base64String {
    pub fn from_bytes<Bytes: AsRef<[u8]>>(bytes: Bytes) -> Self {
        Base64String(Base64UrlUnpadded::encode_string(bytes.as_ref()))
    }
}

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    Base64UrlUnpadded::encode_string(bytes.as_ref())
}

/// Encodes `bytes` for log lines, cutting long values down to a prefix.
pub fn encode_abbreviated(bytes: impl AsRef<[u8]>) -> String {
    let mut encoded = encode(bytes);
    if encoded.len() > ABBREVIATED_LEN {
        encoded.truncate(ABBREVIATED_LEN);
        encoded.push_str("..");
    }
    encoded
}
