//! 256-bit hash for transactions and sighash digests.
//!
//! It is interpreted as a single little-endian number for display.
use crate::util::{Error, Result, Serializable};
use bitcoin_hashes::{Hash as BHHash, sha256d as bh_sha256d};
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::io::{Read, Write};

/// 256-bit hash for transactions and sighash digests.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Converts the hash into a hex string.
    #[must_use]
    #[inline]
    pub fn encode(&self) -> String {
        let mut r = self.0;
        r.reverse();
        hex::encode(r)
    }

    /// Converts a string of 64 hex characters into a hash.
    ///
    /// # Errors
    /// `Error::BadArgument` if the decoded length is not 32 bytes.
    #[inline]
    pub fn decode(s: &str) -> Result<Hash256> {
        let decoded_bytes = hex::decode(s)?;
        if decoded_bytes.len() != 32 {
            return Err(Error::BadArgument(format!(
                "Length {} of decoded bytes",
                decoded_bytes.len()
            )));
        }
        let mut hash_bytes = [0; 32];
        hash_bytes.copy_from_slice(&decoded_bytes);
        hash_bytes.reverse();
        Ok(Hash256(hash_bytes))
    }
}

impl Serializable<Hash256> for Hash256 {
    fn read(reader: &mut dyn Read) -> Result<Hash256> {
        let mut bytes = [0; 32];
        reader.read_exact(&mut bytes).map_err(Error::IOError)?;
        Ok(Hash256(bytes))
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

/// Hashes a data array twice using SHA256.
#[must_use]
#[inline]
pub fn sha256d(data: &[u8]) -> Hash256 {
    let h = bh_sha256d::Hash::hash(data).to_byte_array();
    Hash256(h)
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Hash256) -> Ordering {
        for i in (0..32).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Hash256) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn sha256d_test() {
        let x = hex::decode("0123456789abcdef").unwrap();
        let e = hex::encode(sha256d(&x).0);
        assert_eq!(
            e,
            "137ad663f79da06e282ed0abbec4d70523ced5ff8e39d5c2e5641d978c5925aa"
        );
    }

    #[test]
    fn hash_decode() {
        let s1 = "0000000000000000000000000000000000000000000000000000000000000000";
        let s2 = "abcdef0000112233445566778899abcdefabcdef0000112233445566778899ab";
        assert_eq!(Hash256::decode(s1).unwrap().encode(), s1);
        assert_eq!(Hash256::decode(s2).unwrap().encode(), s2);
        assert!(Hash256::decode("abc").is_err());
        assert!(Hash256::decode("not hex at all, not even close to it!").is_err());
    }

    #[test]
    fn write_read() {
        let mut v = Vec::new();
        let h = Hash256([7; 32]);
        h.write(&mut v).unwrap();
        assert_eq!(Hash256::read(&mut Cursor::new(&v)).unwrap(), h);
    }

    #[test]
    fn compare() {
        let a = Hash256::decode("5555555555555555555555555555555555555555555555555555555555555555")
            .unwrap();
        let b = Hash256::decode("5555555555555555555555555555555555555555555555555555555555555556")
            .unwrap();
        assert!(b > a);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }
}
