//! Script checkers for signature, locktime, and sequence validation.
use crate::script::{ScriptError, SigVersion};
use crate::transaction::sighash::{
    SIGHASH_DEFAULT, SigHashCache, TapscriptExt, legacy_sighash, taproot_sighash,
    witness_v0_sighash,
};
use crate::transaction::{Tx, TxOut};
use crate::util::{Error, Result};
use secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly, XOnlyPublicKey, ecdsa, schnorr};

const LOCKTIME_THRESHOLD: i64 = 500_000_000;
const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;
const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;
const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Trait for transaction-dependent callbacks during script evaluation.
///
/// The interpreter owns all encoding policy; implementations only compute
/// digests and verify raw cryptography, returning `Ok(false)` for
/// signatures that simply do not verify.
pub trait Checker {
    /// Verifies an ECDSA signature (with trailing hash-type byte) over the
    /// sighash selected by the signature version.
    ///
    /// # Errors
    /// `Error::IllegalState` without a transaction context or in a taproot
    /// context.
    fn check_ecdsa_sig(
        &mut self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool>;

    /// Verifies a BIP340 Schnorr signature over the taproot sighash.
    /// `ext` carries the tapscript leaf commitment for script-path checks.
    ///
    /// # Errors
    /// `SchnorrSigSize` or `SchnorrSigHashType` for malformed signatures.
    fn check_schnorr_sig(
        &mut self,
        sig: &[u8],
        pubkey: &[u8],
        ext: Option<&TapscriptExt>,
    ) -> Result<bool>;

    /// Checks a CHECKLOCKTIMEVERIFY operand against the transaction.
    ///
    /// # Errors
    /// `Error::IllegalState` without a transaction context.
    fn check_locktime(&self, locktime: i64) -> Result<bool>;

    /// Checks a CHECKSEQUENCEVERIFY operand against the input sequence.
    ///
    /// # Errors
    /// `Error::IllegalState` without a transaction context.
    fn check_sequence(&self, sequence: i64) -> Result<bool>;
}

/// Dummy checker for non-transaction contexts.
///
/// Always errors so that signature opcodes cannot succeed accidentally.
#[derive(Default, Clone, Debug)]
pub struct TransactionlessChecker;

impl Checker for TransactionlessChecker {
    fn check_ecdsa_sig(
        &mut self,
        _sig: &[u8],
        _pubkey: &[u8],
        _script_code: &[u8],
        _sig_version: SigVersion,
    ) -> Result<bool> {
        Err(Error::IllegalState("No transaction context".to_string()))
    }

    fn check_schnorr_sig(
        &mut self,
        _sig: &[u8],
        _pubkey: &[u8],
        _ext: Option<&TapscriptExt>,
    ) -> Result<bool> {
        Err(Error::IllegalState("No transaction context".to_string()))
    }

    fn check_locktime(&self, _locktime: i64) -> Result<bool> {
        Err(Error::IllegalState("No transaction context".to_string()))
    }

    fn check_sequence(&self, _sequence: i64) -> Result<bool> {
        Err(Error::IllegalState("No transaction context".to_string()))
    }
}

/// Checker bound to one input of a transaction.
///
/// Borrows the caller's secp256k1 verification context; nothing here
/// constructs curve state of its own.
#[derive(Debug)]
pub struct TransactionChecker<'a> {
    /// The transaction being validated.
    pub tx: &'a Tx,
    /// Cache for sighash intermediates, shared across signature checks.
    pub sig_hash_cache: &'a mut SigHashCache,
    /// Input index being checked.
    pub input: usize,
    /// Value of the spent output in satoshis.
    pub satoshis: i64,
    /// All outputs spent by the transaction, aligned with its inputs.
    /// Required for taproot; may be empty for legacy-only callers.
    pub prevouts: &'a [TxOut],
    /// Taproot witness annex for this input, 0x50 prefix included.
    pub annex: Option<Vec<u8>>,
    secp: &'a Secp256k1<VerifyOnly>,
}

impl<'a> TransactionChecker<'a> {
    /// Creates a checker for one (transaction, input) pair.
    #[must_use]
    pub fn new(
        tx: &'a Tx,
        cache: &'a mut SigHashCache,
        input: usize,
        satoshis: i64,
        prevouts: &'a [TxOut],
        secp: &'a Secp256k1<VerifyOnly>,
    ) -> Self {
        Self {
            tx,
            sig_hash_cache: cache,
            input,
            satoshis,
            prevouts,
            annex: None,
            secp,
        }
    }
}

impl<'a> Checker for TransactionChecker<'a> {
    #[inline]
    fn check_ecdsa_sig(
        &mut self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
    ) -> Result<bool> {
        if sig.is_empty() {
            return Ok(false);
        }
        let sighash_type = sig[sig.len() - 1];
        let der_sig = &sig[..sig.len() - 1];

        // Verification accepts the lax grammar found in historical chain
        // data; strict-DER policy runs in the interpreter beforehand.
        let Ok(mut signature) = ecdsa::Signature::from_der_lax(der_sig) else {
            return Ok(false);
        };
        signature.normalize_s();

        let sig_hash = match sig_version {
            SigVersion::Base => legacy_sighash(self.tx, self.input, script_code, sighash_type)?,
            SigVersion::WitnessV0 => witness_v0_sighash(
                self.tx,
                self.input,
                script_code,
                self.satoshis,
                sighash_type,
                self.sig_hash_cache,
            )?,
            SigVersion::Taproot | SigVersion::Tapscript => {
                return Err(Error::IllegalState(
                    "ECDSA check in taproot context".to_string(),
                ));
            }
        };

        let Ok(public_key) = PublicKey::from_slice(pubkey) else {
            return Ok(false);
        };
        let message = Message::from_digest(sig_hash.0);
        Ok(self.secp.verify_ecdsa(message, &signature, &public_key).is_ok())
    }

    #[inline]
    fn check_schnorr_sig(
        &mut self,
        sig: &[u8],
        pubkey: &[u8],
        ext: Option<&TapscriptExt>,
    ) -> Result<bool> {
        let sighash_type = match sig.len() {
            64 => SIGHASH_DEFAULT,
            65 => {
                // An explicit default byte must be encoded as the 64-byte form.
                let ty = sig[64];
                if ty == SIGHASH_DEFAULT {
                    return Err(Error::Script(ScriptError::SchnorrSigHashType));
                }
                ty
            }
            _ => return Err(Error::Script(ScriptError::SchnorrSigSize)),
        };
        let Ok(signature) = schnorr::Signature::from_slice(&sig[..64]) else {
            return Ok(false);
        };
        let Ok(xonly) = XOnlyPublicKey::from_slice(pubkey) else {
            return Ok(false);
        };
        let sig_hash = taproot_sighash(
            self.tx,
            self.input,
            self.prevouts,
            sighash_type,
            self.annex.as_deref(),
            ext,
            self.sig_hash_cache,
        )?;
        Ok(self
            .secp
            .verify_schnorr(&signature, &sig_hash.0, &xonly)
            .is_ok())
    }

    #[inline]
    fn check_locktime(&self, locktime: i64) -> Result<bool> {
        let tx_locktime = self.tx.lock_time as i64;
        // Block-height and timestamp locktimes are incomparable.
        if (locktime < LOCKTIME_THRESHOLD) != (tx_locktime < LOCKTIME_THRESHOLD) {
            return Ok(false);
        }
        if locktime > tx_locktime {
            return Ok(false);
        }
        if self.tx.inputs[self.input].sequence == 0xffffffff {
            return Ok(false);
        }
        Ok(true)
    }

    #[inline]
    fn check_sequence(&self, sequence: i64) -> Result<bool> {
        let sequence = sequence as u64;
        // Bit 31 of the operand disables the check entirely.
        if sequence & (SEQUENCE_LOCKTIME_DISABLE_FLAG as u64) != 0 {
            return Ok(true);
        }
        if self.tx.version < 2 {
            return Ok(false);
        }
        let tx_sequence = self.tx.inputs[self.input].sequence;
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return Ok(false);
        }
        let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as u64;
        let seq_masked = sequence & mask;
        let tx_masked = (tx_sequence as u64) & mask;
        let type_flag = SEQUENCE_LOCKTIME_TYPE_FLAG as u64;
        if (seq_masked < type_flag) != (tx_masked < type_flag) {
            return Ok(false);
        }
        if seq_masked > tx_masked {
            return Ok(false);
        }
        Ok(true)
    }
}
