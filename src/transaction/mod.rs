//! Transaction data model, sighash computation, and signing.
//!
//! Verification consumes these types through
//! [`Verifier::verify_input`](crate::script::Verifier::verify_input); the
//! signing helpers here exist for building spendable test transactions and
//! simple wallets.
//!
//! # Examples
//!
//! Sign a P2PKH input:
//! ```no_run
//! use veriscript::transaction::{Tx, TxIn, generate_signature};
//! use veriscript::transaction::p2pkh::{create_lock_script, create_unlock_script};
//! use veriscript::transaction::sighash::{SIGHASH_ALL, legacy_sighash};
//! use veriscript::util::hash160;
//!
//! let mut tx = Tx {
//!     inputs: vec![TxIn::default()],
//!     ..Default::default()
//! };
//! let private_key = [1; 32];
//! let public_key = [2; 33];
//! let lock_script = create_lock_script(&hash160(&public_key));
//! let sighash = legacy_sighash(&tx, 0, &lock_script.0, SIGHASH_ALL).unwrap();
//! let sig = generate_signature(&private_key, &sighash, SIGHASH_ALL).unwrap();
//! tx.inputs[0].unlock_script = create_unlock_script(&sig, &public_key);
//! ```

pub mod out_point;
pub mod p2pkh;
pub mod sighash;
mod tx;
mod tx_in;
mod tx_out;

pub use self::out_point::{COINBASE_OUTPOINT_HASH, COINBASE_OUTPOINT_INDEX, OutPoint};
pub use self::tx::Tx;
pub use self::tx_in::TxIn;
pub use self::tx_out::{MAX_SATOSHIS, TxOut};

use crate::transaction::sighash::SIGHASH_DEFAULT;
use crate::util::{Error, Hash256, Result};
use secp256k1::{Keypair, Message, Secp256k1, SecretKey};

/// Generates a DER-encoded ECDSA signature for a sighash, with the hash
/// type byte appended.
///
/// The S value is normalized to the low form before encoding.
///
/// # Errors
/// `Error::BadData` for an invalid private key.
#[inline]
pub fn generate_signature(
    private_key: &[u8; 32],
    sighash: &Hash256,
    sighash_type: u8,
) -> Result<Vec<u8>> {
    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_byte_array(*private_key)
        .map_err(|_| Error::BadData("Invalid private key".to_string()))?;
    let message = Message::from_digest(sighash.0);
    let mut signature = secp.sign_ecdsa(message, &secret_key);
    signature.normalize_s();
    let mut der = signature.serialize_der().to_vec();
    der.push(sighash_type);
    Ok(der)
}

/// Generates a BIP340 Schnorr signature for a taproot sighash.
///
/// The hash type byte is appended only when it differs from the default;
/// a 64-byte signature implies the default type.
///
/// # Errors
/// `Error::BadData` for an invalid private key.
#[inline]
pub fn generate_schnorr_signature(
    private_key: &[u8; 32],
    sighash: &Hash256,
    sighash_type: u8,
) -> Result<Vec<u8>> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_byte_array(*private_key)
        .map_err(|_| Error::BadData("Invalid private key".to_string()))?;
    let keypair = Keypair::from_secret_key(&secp, &secret_key);
    let signature = secp.sign_schnorr_no_aux_rand(&sighash.0, &keypair);
    let mut sig = signature.as_ref().to_vec();
    if sighash_type != SIGHASH_DEFAULT {
        sig.push(sighash_type);
    }
    Ok(sig)
}
