//! Signature and public key encoding rules.
//!
//! The strict DER grammar here serves policy checks on new data. Actual
//! verification goes through the checker's lax parser, which accepts the
//! wider grammar present in historical chain data. The two are deliberately
//! separate and must not be unified.

use crate::script::{
    ScriptError, SigVersion, VERIFY_DERSIG, VERIFY_LOW_S, VERIFY_STRICTENC,
    VERIFY_WITNESS_PUBKEYTYPE,
};
use crate::util::{Error, Result};
use secp256k1::ecdsa::Signature;

/// Validates a signature (with trailing hash-type byte) against strict DER
/// structure: 0x30 sequence tag, consistent lengths, and R/S as minimal
/// non-negative big-endian integers.
#[must_use]
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 {
        return false;
    }
    if sig[1] as usize != sig.len() - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;

    if sig[2] != 0x02 {
        return false;
    }
    if len_r == 0 {
        return false;
    }
    if sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && (sig[5] & 0x80) == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 {
        return false;
    }
    if len_s == 0 {
        return false;
    }
    if len_r + len_s + 7 != sig.len() {
        return false;
    }
    if sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && (sig[len_r + 7] & 0x80) == 0 {
        return false;
    }
    true
}

/// True when the signature's S value is already in the lower half of the
/// curve order.
#[must_use]
pub fn is_low_der_signature(sig: &[u8]) -> bool {
    if !is_valid_signature_encoding(sig) || sig.len() < 2 {
        return false;
    }
    let der = &sig[..sig.len() - 1];
    let Ok(signature) = Signature::from_der(der) else {
        return false;
    };
    let mut normalized = signature;
    normalized.normalize_s();
    normalized == signature
}

/// True when the trailing hash-type byte is one of the defined values
/// (ALL/NONE/SINGLE, with or without ANYONECANPAY).
#[must_use]
pub fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    if sig.is_empty() {
        return false;
    }
    let base = sig[sig.len() - 1] & 0x1f;
    matches!(base, 0x01..=0x03)
}

/// Accepts 33-byte compressed (0x02/0x03) or 65-byte uncompressed (0x04)
/// public key encodings only.
#[must_use]
pub fn is_valid_pubkey_encoding(pubkey: &[u8]) -> bool {
    if pubkey.len() == 33 {
        matches!(pubkey[0], 0x02 | 0x03)
    } else if pubkey.len() == 65 {
        pubkey[0] == 0x04
    } else {
        false
    }
}

/// True for a 33-byte compressed public key.
#[must_use]
pub fn is_compressed_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == 33 && matches!(pubkey[0], 0x02 | 0x03)
}

/// Applies the flag-gated signature encoding checks. Empty signatures pass;
/// they fail verification later without being an encoding error.
///
/// # Errors
/// `SigDer`, `SigHighS`, or `SigHashType` depending on the enabled flags.
pub fn check_signature_encoding(sig: &[u8], flags: u32) -> Result<()> {
    if sig.is_empty() {
        return Ok(());
    }
    if flags & (VERIFY_DERSIG | VERIFY_LOW_S | VERIFY_STRICTENC) != 0
        && !is_valid_signature_encoding(sig)
    {
        return Err(Error::Script(ScriptError::SigDer));
    }
    if flags & VERIFY_LOW_S != 0 && !is_low_der_signature(sig) {
        return Err(Error::Script(ScriptError::SigHighS));
    }
    if flags & VERIFY_STRICTENC != 0 && !is_defined_hashtype_signature(sig) {
        return Err(Error::Script(ScriptError::SigHashType));
    }
    Ok(())
}

/// Applies the flag-gated public key encoding checks.
///
/// # Errors
/// `PubkeyType` under STRICTENC, `WitnessPubkeyType` for uncompressed keys
/// in segwit v0 under the witness-pubkeytype policy.
pub fn check_pubkey_encoding(pubkey: &[u8], flags: u32, sig_version: SigVersion) -> Result<()> {
    if flags & VERIFY_STRICTENC != 0 && !is_valid_pubkey_encoding(pubkey) {
        return Err(Error::Script(ScriptError::PubkeyType));
    }
    if sig_version == SigVersion::WitnessV0
        && flags & VERIFY_WITNESS_PUBKEYTYPE != 0
        && !is_compressed_pubkey(pubkey)
    {
        return Err(Error::Script(ScriptError::WitnessPubkeyType));
    }
    Ok(())
}
