//! Hash160 computation (SHA256 then RIPEMD160).

use bitcoin_hashes::{Hash as BHHash, hash160 as bh_hash160};
use std::fmt;

/// 160-bit hash used for public key and script commitments.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash160(pub [u8; 20]);

/// Computes Hash160 (RIPEMD160(SHA256(data))).
#[must_use]
#[inline]
pub fn hash160(data: &[u8]) -> Hash160 {
    let h = bh_hash160::Hash::hash(data).to_byte_array();
    Hash160(h)
}

impl From<[u8; 20]> for Hash160 {
    fn from(bytes: [u8; 20]) -> Self {
        Hash160(bytes)
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
