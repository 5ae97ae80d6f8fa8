//! Content fingerprints used to decide whether a file changed
//!
//! Fingerprints are MD5 digests so that a local digest can be compared with
//! the output of `md5sum` on the server.

use md5::{Digest, Md5};
use std::fmt;
use std::io::{self, Read};

/// A 128-bit content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; ContentDigest::LEN]);

impl ContentDigest {
    /// Digest length in bytes
    pub const LEN: usize = 16;
    /// Digest length in hex characters
    pub const HEX_LEN: usize = Self::LEN * 2;

    /// Digest of an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        Self::from_hasher(hasher)
    }

    /// Digest of everything a reader yields
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self::from_hasher(hasher))
    }

    /// Parse exactly 32 hex characters
    pub fn from_hex(text: &str) -> Option<Self> {
        if text.len() != Self::HEX_LEN {
            return None;
        }
        let decoded = hex::decode(text).ok()?;
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&decoded);
        Some(Self(bytes))
    }

    /// Extract the digest from `md5sum` output
    ///
    /// The output must start with 32 lowercase hex characters; anything else
    /// (an error message, an empty string) yields `None`.
    pub fn parse_md5sum_output(output: &str) -> Option<Self> {
        let trimmed = output.trim();
        let candidate = trimmed.get(..Self::HEX_LEN)?;
        if !candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        Self::from_hex(candidate)
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    fn from_hasher(hasher: Md5) -> Self {
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Where a fingerprint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FingerprintSource {
    /// Hashed from a local file
    Local,
    /// Computed by the server
    HashedRemote,
    /// Downloaded and hashed by the client
    Downloaded,
    /// Could not be determined
    Unknown,
}

/// Content fingerprint of one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Digest of a local file
    Local(ContentDigest),
    /// Digest computed server-side
    HashedRemote(ContentDigest),
    /// Digest of downloaded remote content
    Downloaded(ContentDigest),
    /// No digest available; never matches anything
    Unknown,
}

impl Fingerprint {
    /// The digest, when one is known
    pub fn digest(&self) -> Option<&ContentDigest> {
        match self {
            Self::Local(d) | Self::HashedRemote(d) | Self::Downloaded(d) => Some(d),
            Self::Unknown => None,
        }
    }

    /// Origin of the fingerprint
    pub fn source(&self) -> FingerprintSource {
        match self {
            Self::Local(_) => FingerprintSource::Local,
            Self::HashedRemote(_) => FingerprintSource::HashedRemote,
            Self::Downloaded(_) => FingerprintSource::Downloaded,
            Self::Unknown => FingerprintSource::Unknown,
        }
    }

    /// Whether both sides are known to hold the same content
    ///
    /// `Unknown` on either side never matches, which forces a re-upload.
    pub fn matches(&self, other: &Self) -> bool {
        match (self.digest(), other.digest()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.digest() {
            Some(digest) => write!(f, "{}", digest),
            None => f.write_str("unknown"),
        }
    }
}
