//! Content identifiers, blocks and exchange error definitions.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of a content identifier.
pub const CID_LEN: usize = 32;

/// Content identifier: the SHA-256 digest of a block's data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid([u8; CID_LEN]);

impl Cid {
    /// Identifier of `data`.
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn from_bytes(bytes: [u8; CID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CID_LEN] {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps logs readable.
        write!(f, "Cid({})", &hex::encode(self.0)[..12])
    }
}

/// Failure to parse a hex content identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CidParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Cid {
    type Err = CidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let len = bytes.len();
        let array: [u8; CID_LEN] = bytes.try_into().map_err(|_| CidParseError::Length(len))?;
        Ok(Self(array))
    }
}

/// A block of content and the identifier it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Vec<u8>,
}

impl Block {
    /// Build a block, deriving its identifier from `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            cid: Cid::digest(&data),
            data,
        }
    }

    /// Build a block from an identifier and data received from elsewhere.
    ///
    /// Nothing is checked here; call [`Block::verify`] before trusting it.
    pub fn from_parts(cid: Cid, data: Vec<u8>) -> Self {
        Self { cid, data }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True if the data hashes to the block's identifier.
    pub fn verify(&self) -> bool {
        Cid::digest(&self.data) == self.cid
    }
}

/// Errors surfaced to exchange callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// No reachable peer has the block.
    #[error("block {0} not found")]
    NotFound(Cid),

    /// The caller's deadline passed first.
    #[error("deadline exceeded")]
    Timeout,

    /// Peers could not be reached or failed mid-transfer.
    #[error("network error: {0}")]
    Network(String),

    /// The exchange has been closed.
    #[error("exchange is closed")]
    Closed,

    /// An engine returned data that does not hash to the requested id.
    #[error("block content does not match {expected}: got {actual}")]
    InvalidBlock { expected: Cid, actual: Cid },
}

impl ExchangeError {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeError::NotFound(_) => "not_found",
            ExchangeError::Timeout => "timeout",
            ExchangeError::Network(_) => "network",
            ExchangeError::Closed => "closed",
            ExchangeError::InvalidBlock { .. } => "invalid_block",
        }
    }
}

/// Result type for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Outcome of a batch fetch.
///
/// Every requested id ends up in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBatch {
    pub found: Vec<Block>,
    pub missing: Vec<Cid>,
}

impl BlockBatch {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn len(&self) -> usize {
        self.found.len() + self.missing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_is_content_digest() {
        let block = Block::new(b"hello".to_vec());
        assert_eq!(
            block.cid().to_string(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(block.verify());
    }

    #[test]
    fn tampered_block_fails_verification() {
        let original = Block::new(b"hello".to_vec());
        let forged = Block::from_parts(*original.cid(), b"jello".to_vec());
        assert!(!forged.verify());
    }

    #[test]
    fn cid_parses_from_display() {
        let cid = Cid::digest(b"abc");
        let parsed: Cid = cid.to_string().parse().unwrap();
        assert_eq!(parsed, cid);

        assert_eq!("abcd".parse::<Cid>(), Err(CidParseError::Length(2)));
        assert!(matches!("zz".parse::<Cid>(), Err(CidParseError::Hex(_))));
    }

    #[test]
    fn error_display() {
        let cid = Cid::from_bytes([0u8; CID_LEN]);
        let err = ExchangeError::NotFound(cid);
        assert!(err.to_string().contains(&"0".repeat(64)));
        assert_eq!(ExchangeError::Timeout.to_string(), "deadline exceeded");
        assert_eq!(ExchangeError::Closed.as_str(), "closed");
    }
}
