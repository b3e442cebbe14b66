//! Invite URL construction.
//!
//! An invite is `<prefix><encoded access descriptor>`. Encoding escapes every
//! byte outside `A-Za-z0-9-._~/` but leaves existing `%XX` escapes alone, so
//! a descriptor that arrives already encoded is not encoded twice.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Serialize, Serializer};

const DESCRIPTOR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// A shareable invite link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteUrl {
    url: String,
    prefix_len: usize,
}

impl InviteUrl {
    pub fn new(prefix: &str, access_descriptor: &str) -> Self {
        let mut url = String::with_capacity(prefix.len() + access_descriptor.len() * 2);
        url.push_str(prefix);
        url.push_str(&encode_descriptor(access_descriptor));
        Self {
            url,
            prefix_len: prefix.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }

    /// The encoded part after the prefix.
    pub fn encoded_descriptor(&self) -> &str {
        &self.url[self.prefix_len..]
    }

    /// Decode the access descriptor back out of the link.
    pub fn access_descriptor(&self) -> String {
        percent_decode_str(self.encoded_descriptor())
            .decode_utf8_lossy()
            .into_owned()
    }
}

impl fmt::Display for InviteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Serialize for InviteUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.url)
    }
}

/// Percent-encode a descriptor, passing valid `%XX` escapes through.
pub fn encode_descriptor(descriptor: &str) -> String {
    let bytes = descriptor.as_bytes();
    let mut out = String::with_capacity(descriptor.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if is_escape(bytes, i) {
            // '%' and hex digits are ASCII, so both slice ends are char boundaries
            out.extend(utf8_percent_encode(&descriptor[start..i], DESCRIPTOR));
            out.push_str(&descriptor[i..i + 3]);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    out.extend(utf8_percent_encode(&descriptor[start..], DESCRIPTOR));
    out
}

fn is_escape(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'%'
        && i + 2 < bytes.len()
        && bytes[i + 1].is_ascii_hexdigit()
        && bytes[i + 2].is_ascii_hexdigit()
}
