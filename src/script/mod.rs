//! Script execution and verification for Bitcoin transactions.
//!
//! The [`Script`] type wraps raw consensus bytes and exposes builders, a
//! decoded-operation iterator, and output classification. The interpreter,
//! signature checkers, taproot helpers, and the top-level redemption-rule
//! evaluator live in the submodules.

use crate::util::{Error, Result};
use std::fmt;

pub mod checker;
mod error;
pub mod interpreter;
pub mod op_codes;
pub mod sig_encoding;
pub mod stack;
pub mod taproot;
mod verify;

pub use self::checker::{Checker, TransactionChecker, TransactionlessChecker};
pub use self::error::ScriptError;
pub use self::interpreter::{ExecData, eval};
pub use self::verify::Verifier;

use self::op_codes::{OP_1, OP_1NEGATE, OP_16, OP_EQUAL, OP_HASH160, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};
use self::stack::encode_num;

/// Do not enable any verification flags.
pub const NO_FLAGS: u32 = 0;
/// Evaluate P2SH (BIP16) subscripts.
pub const VERIFY_P2SH: u32 = 1 << 0;
/// Enforce strict signature and public key encodings.
pub const VERIFY_STRICTENC: u32 = 1 << 1;
/// Enforce strict DER (BIP66) signature encoding.
pub const VERIFY_DERSIG: u32 = 1 << 2;
/// Require signatures to use the low-S form (BIP62).
pub const VERIFY_LOW_S: u32 = 1 << 3;
/// Require the CHECKMULTISIG dummy element to be empty (BIP147).
pub const VERIFY_NULLDUMMY: u32 = 1 << 4;
/// Require scriptSig to be push only.
pub const VERIFY_SIGPUSHONLY: u32 = 1 << 5;
/// Require minimal data encodings (BIP62).
pub const VERIFY_MINIMALDATA: u32 = 1 << 6;
/// Discourage use of upgradable NOP opcodes.
pub const VERIFY_DISCOURAGE_UPGRADABLE_NOPS: u32 = 1 << 7;
/// Require a clean stack after evaluation.
pub const VERIFY_CLEANSTACK: u32 = 1 << 8;
/// Enable CHECKLOCKTIMEVERIFY (BIP65).
pub const VERIFY_CHECKLOCKTIMEVERIFY: u32 = 1 << 9;
/// Enable CHECKSEQUENCEVERIFY (BIP112).
pub const VERIFY_CHECKSEQUENCEVERIFY: u32 = 1 << 10;
/// Enable witness evaluation (BIP141).
pub const VERIFY_WITNESS: u32 = 1 << 11;
/// Discourage unknown witness program versions.
pub const VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM: u32 = 1 << 12;
/// Require minimal encodings for IF/NOTIF conditions in segwit v0.
pub const VERIFY_MINIMALIF: u32 = 1 << 13;
/// Require failed signatures to be empty (BIP146 NULLFAIL).
pub const VERIFY_NULLFAIL: u32 = 1 << 14;
/// Require compressed public keys in segwit v0 contexts.
pub const VERIFY_WITNESS_PUBKEYTYPE: u32 = 1 << 15;
/// Enable taproot evaluation (BIPs 341 and 342).
pub const VERIFY_TAPROOT: u32 = 1 << 17;
/// Discourage unknown taproot leaf versions.
pub const VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION: u32 = 1 << 18;
/// Discourage OP_SUCCESS opcodes in tapscript.
pub const VERIFY_DISCOURAGE_OP_SUCCESS: u32 = 1 << 19;
/// Discourage unknown public key types in tapscript.
pub const VERIFY_DISCOURAGE_UPGRADABLE_PUBKEYTYPE: u32 = 1 << 20;

/// Maximum script length in bytes for legacy and segwit v0 scripts.
pub const MAX_SCRIPT_SIZE: usize = 10_000;
/// Maximum size of a single stack element.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;
/// Maximum non-push operations per legacy/segwit-v0 script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;
/// Maximum combined stack and altstack depth.
pub const MAX_STACK_SIZE: usize = 1000;
/// Maximum keys in a CHECKMULTISIG.
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Signature version governing sighash algorithm and signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    /// Legacy scripts, ECDSA over the pre-segwit sighash.
    Base,
    /// Segwit v0 scripts, ECDSA over the BIP143 sighash.
    WitnessV0,
    /// Taproot key-path spends, Schnorr over the BIP341 sighash.
    Taproot,
    /// Taproot script-path spends, Schnorr with the BIP342 extension.
    Tapscript,
}

/// A script in raw consensus byte form.
///
/// Bytes are stored exactly as parsed; re-serialization is the identity.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// Creates a new empty script.
    #[must_use]
    pub fn new() -> Script {
        Script(Vec::new())
    }

    /// Appends a single opcode byte.
    #[inline]
    pub fn append(&mut self, op: u8) {
        self.0.push(op);
    }

    /// Appends raw bytes without any push prefix.
    #[inline]
    pub fn append_slice(&mut self, slice: &[u8]) {
        self.0.extend_from_slice(slice);
    }

    /// Appends a canonical push of the given data.
    ///
    /// # Errors
    /// `Error::BadArgument` if the data cannot fit a push-data prefix.
    pub fn append_data(&mut self, data: &[u8]) -> Result<()> {
        match data.len() {
            0 => self.0.push(op_codes::OP_0),
            1..=75 => {
                self.0.push(data.len() as u8);
                self.0.extend_from_slice(data);
            }
            76..=0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(data.len() as u8);
                self.0.extend_from_slice(data);
            }
            0x100..=0xffff => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(data.len() as u16).to_le_bytes());
                self.0.extend_from_slice(data);
            }
            0x10000..=0xffff_ffff => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(data.len() as u32).to_le_bytes());
                self.0.extend_from_slice(data);
            }
            _ => return Err(Error::BadArgument("Data too long to push".to_string())),
        }
        Ok(())
    }

    /// Appends the shortest push of a number, using the small-integer
    /// opcodes where possible.
    pub fn append_num(&mut self, n: i64) {
        match n {
            -1 => self.0.push(OP_1NEGATE),
            0 => self.0.push(op_codes::OP_0),
            1..=16 => self.0.push(OP_1 + (n as u8) - 1),
            _ => {
                let bytes = encode_num(n);
                self.append_data(&bytes).unwrap();
            }
        }
    }

    /// Iterates the decoded operations of the script.
    #[must_use]
    pub fn ops(&self) -> OpIter<'_> {
        OpIter::new(&self.0)
    }

    /// Evaluates the script standalone under legacy rules, requiring a
    /// truthy final stack top.
    ///
    /// Transaction verification goes through [`Verifier::verify_input`];
    /// this entry point serves isolated scripts and tests.
    ///
    /// # Errors
    /// Any `ScriptError` raised during evaluation, or `EvalFalse`.
    pub fn eval<T: Checker>(&self, checker: &mut T, flags: u32) -> Result<()> {
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut exec = ExecData::default();
        eval(
            &self.0,
            &mut stack,
            checker,
            flags,
            SigVersion::Base,
            &mut exec,
        )?;
        match stack.last() {
            Some(top) if stack::decode_bool(top) => Ok(()),
            _ => Err(Error::Script(ScriptError::EvalFalse)),
        }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

/// A decoded script operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    /// A data push, including empty pushes; `opcode` is the byte that
    /// introduced it.
    Push {
        /// Opcode byte that encoded this push.
        opcode: u8,
        /// Pushed payload.
        data: &'a [u8],
    },
    /// Any non-push opcode.
    Code(u8),
}

/// Fallible iterator over `(position, operation)` pairs of a script.
pub struct OpIter<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> OpIter<'a> {
    /// Creates an iterator over raw script bytes.
    #[must_use]
    pub fn new(script: &'a [u8]) -> Self {
        OpIter { script, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.script.len() {
            self.pos = self.script.len();
            return Err(Error::Script(ScriptError::BadOpcode));
        }
        let data = &self.script[self.pos..self.pos + len];
        self.pos += len;
        Ok(data)
    }

    fn read_len(&mut self, width: usize) -> Result<usize> {
        let bytes = self.take(width)?;
        let mut len = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            len |= (b as usize) << (8 * i);
        }
        Ok(len)
    }
}

impl<'a> Iterator for OpIter<'a> {
    type Item = Result<(usize, Op<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.script.len() {
            return None;
        }
        let start = self.pos;
        let opcode = self.script[self.pos];
        self.pos += 1;
        let op = match opcode {
            0 => Ok(Op::Push { opcode, data: &[] }),
            len @ 1..=75 => self.take(len as usize).map(|data| Op::Push { opcode, data }),
            OP_PUSHDATA1 => self
                .read_len(1)
                .and_then(|len| self.take(len))
                .map(|data| Op::Push { opcode, data }),
            OP_PUSHDATA2 => self
                .read_len(2)
                .and_then(|len| self.take(len))
                .map(|data| Op::Push { opcode, data }),
            OP_PUSHDATA4 => self
                .read_len(4)
                .and_then(|len| self.take(len))
                .map(|data| Op::Push { opcode, data }),
            _ => Ok(Op::Code(opcode)),
        };
        Some(op.map(|op| (start, op)))
    }
}

/// Gets the next operation index in the script, or the script length if at
/// the end.
#[must_use]
pub fn next_op(i: usize, script: &[u8]) -> usize {
    if i >= script.len() {
        return script.len();
    }
    let op = script[i];
    match op {
        len @ 1..=75 => i + 1 + len as usize,
        OP_PUSHDATA1 => {
            if i + 2 > script.len() {
                script.len()
            } else {
                i + 2 + script[i + 1] as usize
            }
        }
        OP_PUSHDATA2 => {
            if i + 3 > script.len() {
                script.len()
            } else {
                i + 3 + u16::from_le_bytes([script[i + 1], script[i + 2]]) as usize
            }
        }
        OP_PUSHDATA4 => {
            if i + 5 > script.len() {
                script.len()
            } else {
                i + 5
                    + u32::from_le_bytes([
                        script[i + 1],
                        script[i + 2],
                        script[i + 3],
                        script[i + 4],
                    ]) as usize
            }
        }
        _ => i + 1,
    }
}

/// Builds the canonical single-push script for the given data.
pub(crate) fn single_push(data: &[u8]) -> Result<Script> {
    let mut script = Script::new();
    script.append_data(data)?;
    Ok(script)
}

/// True when every operation in the script is a push (opcodes through
/// OP_16, reserved included, per the historical rule).
#[must_use]
pub fn is_push_only(script: &[u8]) -> bool {
    for item in OpIter::new(script) {
        match item {
            Ok((_, Op::Push { .. })) => {}
            Ok((_, Op::Code(op))) if op <= OP_16 => {}
            _ => return false,
        }
    }
    true
}

/// True when the data is pushed with its shortest possible encoding.
#[must_use]
pub fn is_minimal_push(opcode: u8, data: &[u8]) -> bool {
    if data.is_empty() {
        return opcode == op_codes::OP_0;
    }
    if data.len() == 1 {
        let value = data[0];
        if value == 0x81 {
            return opcode == OP_1NEGATE;
        }
        if (1..=16).contains(&value) {
            return opcode == OP_1 + value - 1;
        }
    }
    if data.len() <= 75 {
        return opcode as usize == data.len();
    }
    if data.len() <= 0xff {
        return opcode == OP_PUSHDATA1;
    }
    if data.len() <= 0xffff {
        return opcode == OP_PUSHDATA2;
    }
    opcode == OP_PUSHDATA4
}

/// Removes every occurrence of `pattern` that starts on an operation
/// boundary. Used for legacy sighash signature-push removal.
#[must_use]
pub(crate) fn find_and_delete(script: &[u8], pattern: &[u8]) -> Vec<u8> {
    if pattern.is_empty() {
        return script.to_vec();
    }
    let mut result = Vec::with_capacity(script.len());
    let mut i = 0;
    while i < script.len() {
        if script.len() - i >= pattern.len() && script[i..i + pattern.len()] == *pattern {
            i += pattern.len();
            continue;
        }
        let next = next_op(i, script);
        result.extend_from_slice(&script[i..next]);
        i = next;
    }
    result
}

/// True for the BIP16 pay-to-script-hash output pattern.
#[must_use]
pub fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23
        && script[0] == OP_HASH160
        && script[1] == 20
        && script[22] == OP_EQUAL
}

/// Decomposes a segwit output into its witness version and program.
///
/// Returns `None` unless the script is a version opcode followed by one
/// direct push of 2 to 40 bytes.
#[must_use]
pub fn witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version = match script[0] {
        0 => 0,
        v @ OP_1..=OP_16 => v - OP_1 + 1,
        _ => return None,
    };
    if script[1] as usize != script.len() - 2 {
        return None;
    }
    Some((version, &script[2..]))
}

/// Scans a tapscript for OP_SUCCESS opcodes.
///
/// # Errors
/// `ScriptError::BadOpcode` if a push runs past the end of the script.
pub fn contains_op_success(script: &[u8]) -> Result<bool> {
    for item in OpIter::new(script) {
        if let (_, Op::Code(op)) = item? {
            if op_codes::is_op_success(op) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builders_roundtrip() {
        let mut s = Script::new();
        s.append(op_codes::OP_DUP);
        s.append_data(&[1, 2, 3]).unwrap();
        s.append_num(5);
        s.append_num(-1);
        s.append_num(1000);
        assert_eq!(s.0, vec![118, 3, 1, 2, 3, 85, 79, 2, 0xe8, 0x03]);

        // Parsing back yields the same operations and exact bytes.
        let ops: Vec<_> = s.ops().map(|r| r.unwrap()).collect();
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0].1, Op::Code(op_codes::OP_DUP));
        assert_eq!(
            ops[1].1,
            Op::Push {
                opcode: 3,
                data: &[1, 2, 3]
            }
        );
        assert_eq!(ops[4].0, 7);
    }

    #[test]
    fn pushdata_forms() {
        let mut s = Script::new();
        s.append_data(&[7; 80]).unwrap();
        assert_eq!(s.0[0], OP_PUSHDATA1);
        assert_eq!(s.0[1], 80);
        let mut s = Script::new();
        s.append_data(&[7; 300]).unwrap();
        assert_eq!(s.0[0], OP_PUSHDATA2);
        assert_eq!(&s.0[1..3], &300u16.to_le_bytes());
    }

    #[test]
    fn truncated_push_is_parse_error() {
        let s = [5u8, 1, 2]; // claims 5 bytes, provides 2
        let mut iter = OpIter::new(&s);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn push_only() {
        assert!(is_push_only(&[]));
        assert!(is_push_only(&[0, 2, 1, 2, 81, 96, 79, 80]));
        assert!(!is_push_only(&[op_codes::OP_DUP]));
        assert!(!is_push_only(&[op_codes::OP_NOP]));
    }

    #[test]
    fn minimal_push() {
        assert!(is_minimal_push(op_codes::OP_0, &[]));
        assert!(!is_minimal_push(1, &[]));
        assert!(is_minimal_push(OP_1, &[1]));
        assert!(!is_minimal_push(1, &[1]));
        assert!(is_minimal_push(OP_1NEGATE, &[0x81]));
        assert!(is_minimal_push(2, &[5, 6]));
        assert!(is_minimal_push(OP_PUSHDATA1, &[7; 80]));
        assert!(!is_minimal_push(OP_PUSHDATA2, &[7; 80]));
    }

    #[test]
    fn find_and_delete_boundaries() {
        // Pattern only matches on op boundaries.
        let mut script = Script::new();
        script.append_data(&[0xaa, 0xbb]).unwrap();
        script.append(op_codes::OP_DUP);
        let pattern = single_push(&[0xaa, 0xbb]).unwrap();
        let out = find_and_delete(&script.0, &pattern.0);
        assert_eq!(out, vec![op_codes::OP_DUP]);

        // The same bytes inside a larger push survive.
        let mut script = Script::new();
        script.append_data(&[2, 0xaa, 0xbb, 0x00]).unwrap();
        let out = find_and_delete(&script.0, &pattern.0);
        assert_eq!(out, script.0);
    }

    #[test]
    fn p2sh_pattern() {
        let mut s = Script::new();
        s.append(op_codes::OP_HASH160);
        s.append_data(&[9; 20]).unwrap();
        s.append(op_codes::OP_EQUAL);
        assert!(is_p2sh(&s.0));
        s.append(op_codes::OP_NOP);
        assert!(!is_p2sh(&s.0));
    }

    #[test]
    fn witness_program_pattern() {
        let mut v0 = Script::new();
        v0.append(op_codes::OP_0);
        v0.append_data(&[1; 20]).unwrap();
        assert_eq!(witness_program(&v0.0), Some((0u8, &[1u8; 20][..])));

        let mut v1 = Script::new();
        v1.append(OP_1);
        v1.append_data(&[2; 32]).unwrap();
        assert_eq!(witness_program(&v1.0), Some((1u8, &[2u8; 32][..])));

        // Wrong push length prefix.
        assert_eq!(witness_program(&[0, 19, 1, 1]), None);
        // Program too short.
        assert_eq!(witness_program(&[0, 1, 1]), None);
        // Not a version opcode.
        assert_eq!(witness_program(&[op_codes::OP_DUP, 2, 1, 1]), None);
    }

    #[test]
    fn op_success_scan() {
        assert!(!contains_op_success(&[op_codes::OP_CHECKSIG]).unwrap());
        assert!(contains_op_success(&[op_codes::OP_RESERVED]).unwrap());
        assert!(contains_op_success(&[2, 1, 2, 200]).unwrap());
        // 0x50 inside a push payload is data, not an opcode.
        assert!(!contains_op_success(&[2, 80, 80]).unwrap());
        assert!(contains_op_success(&[5, 1]).is_err());
    }
}
