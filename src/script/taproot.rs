//! Taproot commitment primitives: tagged hashes, leaf and branch hashes,
//! control blocks, and output-key tweaking (BIPs 340/341/342).

use crate::script::ScriptError;
use crate::util::{Error, Result, var_int};
use bitcoin_hashes::{Hash as BHHash, HashEngine, sha256 as bh_sha256};
use secp256k1::{Parity, Scalar, Secp256k1, Verification, XOnlyPublicKey};

/// Leaf version for tapscript leaves.
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;
/// Mask selecting the leaf version bits of a control block's first byte.
pub const TAPROOT_LEAF_MASK: u8 = 0xfe;
/// First byte marking a witness annex.
pub const TAPROOT_ANNEX_PREFIX: u8 = 0x50;
/// Control block size with an empty merkle path.
pub const TAPROOT_CONTROL_BASE_SIZE: usize = 33;
/// Size of each merkle path node in a control block.
pub const TAPROOT_CONTROL_NODE_SIZE: usize = 32;
/// Maximum merkle path depth.
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;
/// Maximum control block size.
pub const TAPROOT_CONTROL_MAX_SIZE: usize =
    TAPROOT_CONTROL_BASE_SIZE + TAPROOT_CONTROL_NODE_SIZE * TAPROOT_CONTROL_MAX_NODE_COUNT;

/// Computes `SHA256(SHA256(tag) || SHA256(tag) || data)`, the BIP340
/// domain-separated hash used throughout taproot.
#[must_use]
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = bh_sha256::Hash::hash(tag.as_bytes()).to_byte_array();
    let mut engine = bh_sha256::Hash::engine();
    engine.input(&tag_hash);
    engine.input(&tag_hash);
    engine.input(data);
    bh_sha256::Hash::from_engine(engine).to_byte_array()
}

/// Computes the tapleaf hash committing to a leaf script and its version.
#[must_use]
pub fn leaf_hash(script: &[u8], leaf_version: u8) -> [u8; 32] {
    let mut payload = Vec::with_capacity(1 + var_int::size(script.len() as u64) + script.len());
    payload.push(leaf_version);
    var_int::write(script.len() as u64, &mut payload).unwrap();
    payload.extend_from_slice(script);
    tagged_hash("TapLeaf", &payload)
}

/// Computes the TapTweak hash binding an internal key to a script tree.
/// An absent merkle root commits to the key alone (key-path-only outputs).
#[must_use]
pub fn tap_tweak_hash(internal_key: &[u8; 32], merkle_root: Option<&[u8; 32]>) -> [u8; 32] {
    let mut payload = Vec::with_capacity(64);
    payload.extend_from_slice(internal_key);
    if let Some(root) = merkle_root {
        payload.extend_from_slice(root);
    }
    tagged_hash("TapTweak", &payload)
}

/// A parsed taproot control block: leaf version and output-key parity in
/// the first byte, the internal x-only key, then the merkle path.
pub struct ControlBlock<'a> {
    bytes: &'a [u8],
}

impl<'a> ControlBlock<'a> {
    /// Validates the control block length (33 + 32k, k <= 128).
    ///
    /// # Errors
    /// `ScriptError::TaprootWrongControlSize`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < TAPROOT_CONTROL_BASE_SIZE
            || bytes.len() > TAPROOT_CONTROL_MAX_SIZE
            || (bytes.len() - TAPROOT_CONTROL_BASE_SIZE) % TAPROOT_CONTROL_NODE_SIZE != 0
        {
            return Err(Error::Script(ScriptError::TaprootWrongControlSize));
        }
        Ok(ControlBlock { bytes })
    }

    /// The raw control block bytes.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The leaf version carried in the first byte.
    #[must_use]
    pub fn leaf_version(&self) -> u8 {
        self.bytes[0] & TAPROOT_LEAF_MASK
    }

    /// The output key parity bit.
    #[must_use]
    pub fn parity(&self) -> u8 {
        self.bytes[0] & 1
    }

    /// The internal x-only public key.
    #[must_use]
    pub fn internal_key(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.bytes[1..TAPROOT_CONTROL_BASE_SIZE]);
        key
    }

    /// Folds the merkle path onto a leaf hash, pairing siblings in
    /// lexicographic byte order at each level.
    #[must_use]
    pub fn merkle_root(&self, leaf_hash: [u8; 32]) -> [u8; 32] {
        let mut current = leaf_hash;
        let mut index = TAPROOT_CONTROL_BASE_SIZE;
        while index < self.bytes.len() {
            let node = &self.bytes[index..index + TAPROOT_CONTROL_NODE_SIZE];
            let mut payload = Vec::with_capacity(64);
            if current.as_slice() <= node {
                payload.extend_from_slice(&current);
                payload.extend_from_slice(node);
            } else {
                payload.extend_from_slice(node);
                payload.extend_from_slice(&current);
            }
            current = tagged_hash("TapBranch", &payload);
            index += TAPROOT_CONTROL_NODE_SIZE;
        }
        current
    }
}

/// Checks that tweaking the control block's internal key with the merkle
/// root yields the witness program's output key with the claimed parity.
/// Malformed keys and out-of-range tweaks simply fail the check.
#[must_use]
pub fn verify_commitment<C: Verification>(
    secp: &Secp256k1<C>,
    program: &[u8],
    control: &ControlBlock,
    merkle_root: &[u8; 32],
) -> bool {
    let internal_bytes = control.internal_key();
    let Ok(internal) = XOnlyPublicKey::from_slice(&internal_bytes) else {
        return false;
    };
    let Ok(output) = XOnlyPublicKey::from_slice(program) else {
        return false;
    };
    let tweak = tap_tweak_hash(&internal_bytes, Some(merkle_root));
    let Ok(scalar) = Scalar::from_be_bytes(tweak) else {
        return false;
    };
    let parity = if control.parity() == 0 {
        Parity::Even
    } else {
        Parity::Odd
    };
    internal.tweak_add_check(secp, &output, parity, scalar)
}

/// Derives the taproot output key for an internal key and optional merkle
/// root, returning the x-only key bytes and its parity bit.
///
/// # Errors
/// `Error::Secp256k1Error` for an invalid internal key,
/// `Error::BadData` for an out-of-range tweak.
pub fn output_key<C: Verification>(
    secp: &Secp256k1<C>,
    internal_key: &[u8; 32],
    merkle_root: Option<&[u8; 32]>,
) -> Result<([u8; 32], u8)> {
    let internal = XOnlyPublicKey::from_slice(internal_key)?;
    let tweak = tap_tweak_hash(internal_key, merkle_root);
    let scalar = Scalar::from_be_bytes(tweak)
        .map_err(|_| Error::BadData("Tweak out of range".to_string()))?;
    let (tweaked, parity) = internal.add_tweak(secp, &scalar)?;
    let parity_bit = match parity {
        Parity::Even => 0,
        Parity::Odd => 1,
    };
    Ok((tweaked.serialize(), parity_bit))
}
