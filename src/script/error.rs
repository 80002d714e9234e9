//! Consensus script error taxonomy.
//!
//! Every way a script run can fail maps to exactly one of these codes. The
//! policy-only members (minimal-if, discourage-*) fire only when the caller
//! enables the matching verification flag; the same condition is otherwise
//! ignored.

use std::fmt;

/// Reason a script verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    /// Script completed but the final stack was empty or falsy.
    EvalFalse,
    /// OP_RETURN was executed.
    OpReturn,
    /// Script exceeds the 10000 byte limit.
    ScriptSize,
    /// A pushed element exceeds 520 bytes.
    PushSize,
    /// More than 201 non-push opcodes.
    OpCount,
    /// Stack plus altstack exceed 1000 elements.
    StackSize,
    /// Multisig signature count out of range.
    SigCount,
    /// Multisig public key count out of range.
    PubkeyCount,
    /// OP_VERIFY failed.
    Verify,
    /// OP_EQUALVERIFY failed.
    EqualVerify,
    /// OP_CHECKSIGVERIFY failed.
    CheckSigVerify,
    /// OP_CHECKMULTISIGVERIFY failed.
    CheckMultiSigVerify,
    /// OP_NUMEQUALVERIFY failed.
    NumEqualVerify,
    /// Invalid or unknown opcode, or truncated push data.
    BadOpcode,
    /// A disabled opcode is present in the script.
    DisabledOpcode,
    /// Operation on too few stack elements.
    InvalidStackOperation,
    /// Operation on too few altstack elements.
    InvalidAltStackOperation,
    /// IF/ELSE/ENDIF nesting is inconsistent.
    UnbalancedConditional,
    /// CHECKLOCKTIMEVERIFY/CHECKSEQUENCEVERIFY operand is negative.
    NegativeLockTime,
    /// Locktime or sequence requirement not met.
    UnsatisfiedLockTime,
    /// Script number exceeds its byte budget.
    InvalidNumberRange,
    /// Signature hash type byte is not a defined value.
    SigHashType,
    /// Signature is not strictly DER encoded.
    SigDer,
    /// Push or number not minimally encoded under the minimal-data policy.
    MinimalData,
    /// scriptSig contains non-push operations.
    SigPushOnly,
    /// ECDSA signature S value is not in the lower half.
    SigHighS,
    /// CHECKMULTISIG dummy element is not null.
    SigNullDummy,
    /// Public key is not validly encoded.
    PubkeyType,
    /// Stack has more than one element after evaluation.
    CleanStack,
    /// IF/NOTIF condition is not an empty vector or 0x01.
    MinimalIf,
    /// Failed signature is not the empty vector.
    NullFail,
    /// Upgradable NOP encountered under the discourage policy.
    DiscourageUpgradableNops,
    /// Unknown witness program version under the discourage policy.
    DiscourageUpgradableWitnessProgram,
    /// Unknown taproot leaf version under the discourage policy.
    DiscourageUpgradableTaprootVersion,
    /// OP_SUCCESS opcode under the discourage policy.
    DiscourageOpSuccess,
    /// Unknown tapscript public key type under the discourage policy.
    DiscourageUpgradablePubkeyType,
    /// Witness program has an invalid length for its version.
    WitnessProgramWrongLength,
    /// Witness was empty where one is required.
    WitnessProgramWitnessEmpty,
    /// Witness data does not match the program commitment.
    WitnessProgramMismatch,
    /// Native witness spend carries a non-empty scriptSig.
    WitnessMalleated,
    /// P2SH witness spend scriptSig is not the single push of the redeem script.
    WitnessMalleatedP2SH,
    /// Witness provided for a non-witness output.
    WitnessUnexpected,
    /// Segwit v0 public key is not compressed.
    WitnessPubkeyType,
    /// Schnorr signature is not 64 or 65 bytes.
    SchnorrSigSize,
    /// Schnorr signature hash type is invalid.
    SchnorrSigHashType,
    /// Schnorr signature verification failed.
    SchnorrSig,
    /// Taproot control block size is not 33 + 32k.
    TaprootWrongControlSize,
    /// Tapscript signature opcodes exceeded the validation weight budget.
    TapscriptValidationWeight,
    /// CHECKMULTISIG used in tapscript.
    TapscriptCheckMultiSig,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ScriptError::EvalFalse => "script evaluated to false",
            ScriptError::OpReturn => "OP_RETURN encountered",
            ScriptError::ScriptSize => "script size limit exceeded",
            ScriptError::PushSize => "push size limit exceeded",
            ScriptError::OpCount => "operation count limit exceeded",
            ScriptError::StackSize => "stack size limit exceeded",
            ScriptError::SigCount => "signature count out of range",
            ScriptError::PubkeyCount => "public key count out of range",
            ScriptError::Verify => "OP_VERIFY failed",
            ScriptError::EqualVerify => "OP_EQUALVERIFY failed",
            ScriptError::CheckSigVerify => "OP_CHECKSIGVERIFY failed",
            ScriptError::CheckMultiSigVerify => "OP_CHECKMULTISIGVERIFY failed",
            ScriptError::NumEqualVerify => "OP_NUMEQUALVERIFY failed",
            ScriptError::BadOpcode => "invalid opcode",
            ScriptError::DisabledOpcode => "disabled opcode",
            ScriptError::InvalidStackOperation => "invalid stack operation",
            ScriptError::InvalidAltStackOperation => "invalid altstack operation",
            ScriptError::UnbalancedConditional => "unbalanced conditional",
            ScriptError::NegativeLockTime => "negative locktime",
            ScriptError::UnsatisfiedLockTime => "locktime requirement not satisfied",
            ScriptError::InvalidNumberRange => "script number out of range",
            ScriptError::SigHashType => "invalid sighash type",
            ScriptError::SigDer => "invalid DER signature encoding",
            ScriptError::MinimalData => "non-minimal encoding",
            ScriptError::SigPushOnly => "scriptSig is not push only",
            ScriptError::SigHighS => "signature S value too high",
            ScriptError::SigNullDummy => "multisig dummy is not null",
            ScriptError::PubkeyType => "invalid public key encoding",
            ScriptError::CleanStack => "stack not clean after evaluation",
            ScriptError::MinimalIf => "IF condition not minimal",
            ScriptError::NullFail => "failed signature is not null",
            ScriptError::DiscourageUpgradableNops => "upgradable NOP discouraged",
            ScriptError::DiscourageUpgradableWitnessProgram => {
                "upgradable witness program discouraged"
            }
            ScriptError::DiscourageUpgradableTaprootVersion => {
                "upgradable taproot version discouraged"
            }
            ScriptError::DiscourageOpSuccess => "OP_SUCCESS discouraged",
            ScriptError::DiscourageUpgradablePubkeyType => "upgradable pubkey type discouraged",
            ScriptError::WitnessProgramWrongLength => "witness program has wrong length",
            ScriptError::WitnessProgramWitnessEmpty => "witness is empty",
            ScriptError::WitnessProgramMismatch => "witness program mismatch",
            ScriptError::WitnessMalleated => "witness spend with non-empty scriptSig",
            ScriptError::WitnessMalleatedP2SH => "P2SH witness scriptSig mismatch",
            ScriptError::WitnessUnexpected => "unexpected witness",
            ScriptError::WitnessPubkeyType => "witness public key is not compressed",
            ScriptError::SchnorrSigSize => "invalid Schnorr signature size",
            ScriptError::SchnorrSigHashType => "invalid Schnorr sighash type",
            ScriptError::SchnorrSig => "invalid Schnorr signature",
            ScriptError::TaprootWrongControlSize => "invalid control block size",
            ScriptError::TapscriptValidationWeight => "validation weight exceeded",
            ScriptError::TapscriptCheckMultiSig => "CHECKMULTISIG invalid in tapscript",
        };
        f.write_str(s)
    }
}
