//! Script interpreter for Bitcoin consensus evaluation.
//!
//! [`eval`] executes one script against a caller-supplied stack and reports
//! only whether execution completed or failed; judging the final stack is
//! the redemption-rule evaluator's job. All transaction-dependent work
//! (sighashes, curve math, locktimes) is delegated through the
//! [`Checker`] trait.

use crate::script::op_codes::*;
use crate::script::sig_encoding::{check_pubkey_encoding, check_signature_encoding};
use crate::script::stack::{
    NUM_MAX_LEN_EXTENDED, decode_bool, decode_num, encode_num, pop_item, pop_num,
};
use crate::script::{
    Checker, MAX_OPS_PER_SCRIPT, MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_ELEMENT_SIZE,
    MAX_SCRIPT_SIZE, MAX_STACK_SIZE, Op, OpIter, ScriptError, SigVersion,
    VERIFY_CHECKLOCKTIMEVERIFY, VERIFY_CHECKSEQUENCEVERIFY, VERIFY_DISCOURAGE_UPGRADABLE_NOPS,
    VERIFY_DISCOURAGE_UPGRADABLE_PUBKEYTYPE, VERIFY_MINIMALDATA, VERIFY_MINIMALIF,
    VERIFY_NULLDUMMY, VERIFY_NULLFAIL, find_and_delete, is_minimal_push, single_push,
};
use crate::transaction::sighash::TapscriptExt;
use crate::util::{Error, Result, hash160, sha256d};
use bitcoin_hashes::{
    Hash as BHHash, ripemd160 as bh_ripemd160, sha1 as bh_sha1, sha256 as bh_sha256,
};

/// Validation weight consumed by each passing tapscript signature check.
pub(crate) const VALIDATION_WEIGHT_PER_SIGOP_PASSED: i64 = 50;
/// Free validation weight granted to every tapscript input.
pub(crate) const VALIDATION_WEIGHT_OFFSET: i64 = 50;

/// Per-run execution data for taproot script-path spends.
///
/// Created fresh for every script run; the evaluator fills in the leaf
/// commitment and weight budget before executing a tapscript.
#[derive(Debug, Clone)]
pub struct ExecData {
    /// Tapleaf hash of the executing script (script-path only).
    pub tapleaf_hash: Option<[u8; 32]>,
    /// Opcode position of the last executed OP_CODESEPARATOR, or
    /// 0xffffffff if none has executed.
    pub codesep_pos: u32,
    /// Remaining BIP342 validation weight, if budgeted.
    pub validation_weight_left: Option<i64>,
}

impl Default for ExecData {
    fn default() -> Self {
        ExecData {
            tapleaf_hash: None,
            codesep_pos: u32::MAX,
            validation_weight_left: None,
        }
    }
}

/// Executes a script against the supplied stack.
///
/// Returns normally iff every operation completed; the stack is left in
/// whatever state execution produced and is unspecified after an error.
///
/// # Errors
/// Any [`ScriptError`] raised by parsing or execution, wrapped in
/// [`Error::Script`].
pub fn eval<T: Checker>(
    script: &[u8],
    stack: &mut Vec<Vec<u8>>,
    checker: &mut T,
    flags: u32,
    sig_version: SigVersion,
    exec: &mut ExecData,
) -> Result<()> {
    let legacy_limits = matches!(sig_version, SigVersion::Base | SigVersion::WitnessV0);
    if legacy_limits && script.len() > MAX_SCRIPT_SIZE {
        return Err(Error::Script(ScriptError::ScriptSize));
    }
    let require_minimal = flags & VERIFY_MINIMALDATA != 0;
    let mut alt_stack: Vec<Vec<u8>> = Vec::new();
    let mut branch_exec: Vec<bool> = Vec::new();
    // Byte offset where the signed script code starts (past the last
    // executed OP_CODESEPARATOR).
    let mut check_index = 0usize;
    let mut op_count = 0usize;
    let mut opcode_pos = 0u32;

    for item in OpIter::new(script) {
        let (pos, op) = item?;
        let executing = branch_exec.iter().all(|&b| b);
        match op {
            Op::Push { opcode, data } => {
                if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(Error::Script(ScriptError::PushSize));
                }
                if executing {
                    if require_minimal && !is_minimal_push(opcode, data) {
                        return Err(Error::Script(ScriptError::MinimalData));
                    }
                    stack.push(data.to_vec());
                }
            }
            Op::Code(opcode) => {
                // Rejected wherever they appear, executing branch or not.
                if opcode == OP_VERIF || opcode == OP_VERNOTIF {
                    return Err(Error::Script(ScriptError::BadOpcode));
                }
                if legacy_limits {
                    if is_disabled(opcode) {
                        return Err(Error::Script(ScriptError::DisabledOpcode));
                    }
                    if opcode > OP_16 {
                        op_count += 1;
                        if op_count > MAX_OPS_PER_SCRIPT {
                            return Err(Error::Script(ScriptError::OpCount));
                        }
                    }
                }
                match opcode {
                    OP_IF | OP_NOTIF => {
                        // A frame is pushed even in a skipping branch so
                        // that nesting depth stays balanced.
                        let mut value = false;
                        if executing {
                            if stack.is_empty() {
                                return Err(Error::Script(ScriptError::UnbalancedConditional));
                            }
                            let condition = pop_item(stack)?;
                            let enforce_minimal = match sig_version {
                                SigVersion::WitnessV0 => flags & VERIFY_MINIMALIF != 0,
                                SigVersion::Tapscript => true,
                                _ => false,
                            };
                            if enforce_minimal
                                && !(condition.is_empty()
                                    || (condition.len() == 1 && condition[0] == 1))
                            {
                                return Err(Error::Script(ScriptError::MinimalIf));
                            }
                            value = decode_bool(&condition);
                            if opcode == OP_NOTIF {
                                value = !value;
                            }
                        }
                        branch_exec.push(value);
                    }
                    OP_ELSE => {
                        let Some(top) = branch_exec.last_mut() else {
                            return Err(Error::Script(ScriptError::UnbalancedConditional));
                        };
                        *top = !*top;
                    }
                    OP_ENDIF => {
                        if branch_exec.pop().is_none() {
                            return Err(Error::Script(ScriptError::UnbalancedConditional));
                        }
                    }
                    _ if !executing => {}
                    OP_1NEGATE => stack.push(encode_num(-1)),
                    OP_1..=OP_16 => stack.push(encode_num((opcode - OP_1 + 1) as i64)),
                    OP_NOP => {}
                    OP_VERIFY => {
                        let top = pop_item(stack)?;
                        if !decode_bool(&top) {
                            return Err(Error::Script(ScriptError::Verify));
                        }
                    }
                    OP_RETURN => return Err(Error::Script(ScriptError::OpReturn)),
                    OP_TOALTSTACK => alt_stack.push(pop_item(stack)?),
                    OP_FROMALTSTACK => {
                        let top = alt_stack
                            .pop()
                            .ok_or(Error::Script(ScriptError::InvalidAltStackOperation))?;
                        stack.push(top);
                    }
                    OP_2DROP => {
                        check_stack_size(2, stack)?;
                        stack.pop();
                        stack.pop();
                    }
                    OP_2DUP => {
                        check_stack_size(2, stack)?;
                        let a = stack[stack.len() - 2].clone();
                        let b = stack[stack.len() - 1].clone();
                        stack.push(a);
                        stack.push(b);
                    }
                    OP_3DUP => {
                        check_stack_size(3, stack)?;
                        let a = stack[stack.len() - 3].clone();
                        let b = stack[stack.len() - 2].clone();
                        let c = stack[stack.len() - 1].clone();
                        stack.push(a);
                        stack.push(b);
                        stack.push(c);
                    }
                    OP_2OVER => {
                        check_stack_size(4, stack)?;
                        let a = stack[stack.len() - 4].clone();
                        let b = stack[stack.len() - 3].clone();
                        stack.push(a);
                        stack.push(b);
                    }
                    OP_2ROT => {
                        check_stack_size(6, stack)?;
                        let index = stack.len() - 6;
                        let x1 = stack.remove(index);
                        let x2 = stack.remove(index);
                        stack.push(x1);
                        stack.push(x2);
                    }
                    OP_2SWAP => {
                        check_stack_size(4, stack)?;
                        let index = stack.len() - 4;
                        let x1 = stack.remove(index);
                        let x2 = stack.remove(index);
                        stack.push(x1);
                        stack.push(x2);
                    }
                    OP_IFDUP => {
                        check_stack_size(1, stack)?;
                        if decode_bool(&stack[stack.len() - 1]) {
                            let copy = stack[stack.len() - 1].clone();
                            stack.push(copy);
                        }
                    }
                    OP_DEPTH => {
                        let depth = stack.len() as i64;
                        stack.push(encode_num(depth));
                    }
                    OP_DROP => {
                        pop_item(stack)?;
                    }
                    OP_DUP => {
                        check_stack_size(1, stack)?;
                        let copy = stack[stack.len() - 1].clone();
                        stack.push(copy);
                    }
                    OP_NIP => {
                        check_stack_size(2, stack)?;
                        let index = stack.len() - 2;
                        stack.remove(index);
                    }
                    OP_OVER => {
                        check_stack_size(2, stack)?;
                        let copy = stack[stack.len() - 2].clone();
                        stack.push(copy);
                    }
                    OP_PICK | OP_ROLL => {
                        check_stack_size(2, stack)?;
                        let n = pop_num(stack, require_minimal)?;
                        if n < 0 || n as usize >= stack.len() {
                            return Err(Error::Script(ScriptError::InvalidStackOperation));
                        }
                        let index = stack.len() - 1 - n as usize;
                        if opcode == OP_PICK {
                            let copy = stack[index].clone();
                            stack.push(copy);
                        } else {
                            let item = stack.remove(index);
                            stack.push(item);
                        }
                    }
                    OP_ROT => {
                        check_stack_size(3, stack)?;
                        let index = stack.len() - 3;
                        let third = stack.remove(index);
                        stack.push(third);
                    }
                    OP_SWAP => {
                        check_stack_size(2, stack)?;
                        let index = stack.len() - 2;
                        let second = stack.remove(index);
                        stack.push(second);
                    }
                    OP_TUCK => {
                        check_stack_size(2, stack)?;
                        let len = stack.len();
                        let top = stack[len - 1].clone();
                        stack.insert(len - 2, top);
                    }
                    OP_SIZE => {
                        check_stack_size(1, stack)?;
                        let len = stack[stack.len() - 1].len() as i64;
                        stack.push(encode_num(len));
                    }
                    OP_EQUAL => {
                        check_stack_size(2, stack)?;
                        let a = pop_item(stack)?;
                        let b = pop_item(stack)?;
                        stack.push(encode_num((a == b) as i64));
                    }
                    OP_EQUALVERIFY => {
                        check_stack_size(2, stack)?;
                        let a = pop_item(stack)?;
                        let b = pop_item(stack)?;
                        if a != b {
                            return Err(Error::Script(ScriptError::EqualVerify));
                        }
                    }
                    OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                        let n = pop_num(stack, require_minimal)?;
                        let result = match opcode {
                            OP_1ADD => n + 1,
                            OP_1SUB => n - 1,
                            OP_NEGATE => -n,
                            OP_ABS => n.abs(),
                            OP_NOT => (n == 0) as i64,
                            _ => (n != 0) as i64,
                        };
                        stack.push(encode_num(result));
                    }
                    OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMNOTEQUAL
                    | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
                    | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                        let b = pop_num(stack, require_minimal)?;
                        let a = pop_num(stack, require_minimal)?;
                        let result = match opcode {
                            OP_ADD => a + b,
                            OP_SUB => a - b,
                            OP_BOOLAND => (a != 0 && b != 0) as i64,
                            OP_BOOLOR => (a != 0 || b != 0) as i64,
                            OP_NUMEQUAL => (a == b) as i64,
                            OP_NUMNOTEQUAL => (a != b) as i64,
                            OP_LESSTHAN => (a < b) as i64,
                            OP_GREATERTHAN => (a > b) as i64,
                            OP_LESSTHANOREQUAL => (a <= b) as i64,
                            OP_GREATERTHANOREQUAL => (a >= b) as i64,
                            OP_MIN => a.min(b),
                            _ => a.max(b),
                        };
                        stack.push(encode_num(result));
                    }
                    OP_NUMEQUALVERIFY => {
                        let b = pop_num(stack, require_minimal)?;
                        let a = pop_num(stack, require_minimal)?;
                        if a != b {
                            return Err(Error::Script(ScriptError::NumEqualVerify));
                        }
                    }
                    OP_WITHIN => {
                        let max = pop_num(stack, require_minimal)?;
                        let min = pop_num(stack, require_minimal)?;
                        let x = pop_num(stack, require_minimal)?;
                        stack.push(encode_num((x >= min && x < max) as i64));
                    }
                    OP_RIPEMD160 => {
                        let v = pop_item(stack)?;
                        let h = bh_ripemd160::Hash::hash(&v).to_byte_array();
                        stack.push(h.to_vec());
                    }
                    OP_SHA1 => {
                        let v = pop_item(stack)?;
                        let h = bh_sha1::Hash::hash(&v).to_byte_array();
                        stack.push(h.to_vec());
                    }
                    OP_SHA256 => {
                        let v = pop_item(stack)?;
                        let h = bh_sha256::Hash::hash(&v).to_byte_array();
                        stack.push(h.to_vec());
                    }
                    OP_HASH160 => {
                        let v = pop_item(stack)?;
                        stack.push(hash160(&v).0.to_vec());
                    }
                    OP_HASH256 => {
                        let v = pop_item(stack)?;
                        stack.push(sha256d(&v).0.to_vec());
                    }
                    OP_CODESEPARATOR => {
                        check_index = pos + 1;
                        if sig_version == SigVersion::Tapscript {
                            exec.codesep_pos = opcode_pos;
                        }
                    }
                    OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                        check_stack_size(2, stack)?;
                        let pubkey = pop_item(stack)?;
                        let sig = pop_item(stack)?;
                        let success = match sig_version {
                            SigVersion::Base | SigVersion::WitnessV0 => {
                                check_signature_encoding(&sig, flags)?;
                                check_pubkey_encoding(&pubkey, flags, sig_version)?;
                                let mut script_code = script[check_index..].to_vec();
                                if sig_version == SigVersion::Base {
                                    let pattern = single_push(&sig)?;
                                    script_code = find_and_delete(&script_code, &pattern.0);
                                }
                                let ok = checker.check_ecdsa_sig(
                                    &sig,
                                    &pubkey,
                                    &script_code,
                                    sig_version,
                                )?;
                                if !ok && flags & VERIFY_NULLFAIL != 0 && !sig.is_empty() {
                                    return Err(Error::Script(ScriptError::NullFail));
                                }
                                ok
                            }
                            SigVersion::Taproot | SigVersion::Tapscript => {
                                tapscript_checksig(&sig, &pubkey, checker, flags, exec)?
                            }
                        };
                        if opcode == OP_CHECKSIGVERIFY {
                            if !success {
                                return Err(Error::Script(ScriptError::CheckSigVerify));
                            }
                        } else {
                            stack.push(encode_num(success as i64));
                        }
                    }
                    OP_CHECKSIGADD => {
                        if sig_version != SigVersion::Tapscript {
                            return Err(Error::Script(ScriptError::BadOpcode));
                        }
                        check_stack_size(3, stack)?;
                        let pubkey = pop_item(stack)?;
                        let n = pop_num(stack, require_minimal)?;
                        let sig = pop_item(stack)?;
                        let success = tapscript_checksig(&sig, &pubkey, checker, flags, exec)?;
                        stack.push(encode_num(n + success as i64));
                    }
                    OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                        if matches!(sig_version, SigVersion::Taproot | SigVersion::Tapscript) {
                            return Err(Error::Script(ScriptError::TapscriptCheckMultiSig));
                        }
                        let n_keys = pop_num(stack, require_minimal)?;
                        if n_keys < 0 || n_keys > MAX_PUBKEYS_PER_MULTISIG as i64 {
                            return Err(Error::Script(ScriptError::PubkeyCount));
                        }
                        let n_keys = n_keys as usize;
                        op_count += n_keys;
                        if op_count > MAX_OPS_PER_SCRIPT {
                            return Err(Error::Script(ScriptError::OpCount));
                        }
                        check_stack_size(n_keys, stack)?;
                        let mut keys = Vec::with_capacity(n_keys);
                        for _ in 0..n_keys {
                            keys.push(pop_item(stack)?);
                        }
                        let n_sigs = pop_num(stack, require_minimal)?;
                        if n_sigs < 0 || n_sigs > n_keys as i64 {
                            return Err(Error::Script(ScriptError::SigCount));
                        }
                        let n_sigs = n_sigs as usize;
                        check_stack_size(n_sigs, stack)?;
                        let mut sigs = Vec::with_capacity(n_sigs);
                        for _ in 0..n_sigs {
                            sigs.push(pop_item(stack)?);
                        }
                        // The historical bug consumes one extra element.
                        let dummy = pop_item(stack)?;
                        if flags & VERIFY_NULLDUMMY != 0 && !dummy.is_empty() {
                            return Err(Error::Script(ScriptError::SigNullDummy));
                        }
                        let mut script_code = script[check_index..].to_vec();
                        if sig_version == SigVersion::Base {
                            for sig in &sigs {
                                let pattern = single_push(sig)?;
                                script_code = find_and_delete(&script_code, &pattern.0);
                            }
                        }
                        let mut success = true;
                        let mut key_index = 0usize;
                        let mut sig_index = 0usize;
                        while success && sig_index < sigs.len() {
                            // Too few keys left for the remaining signatures.
                            if sigs.len() - sig_index > keys.len() - key_index {
                                success = false;
                                break;
                            }
                            check_signature_encoding(&sigs[sig_index], flags)?;
                            check_pubkey_encoding(&keys[key_index], flags, sig_version)?;
                            if checker.check_ecdsa_sig(
                                &sigs[sig_index],
                                &keys[key_index],
                                &script_code,
                                sig_version,
                            )? {
                                sig_index += 1;
                            }
                            key_index += 1;
                        }
                        if !success
                            && flags & VERIFY_NULLFAIL != 0
                            && sigs.iter().any(|sig| !sig.is_empty())
                        {
                            return Err(Error::Script(ScriptError::NullFail));
                        }
                        if opcode == OP_CHECKMULTISIGVERIFY {
                            if !success {
                                return Err(Error::Script(ScriptError::CheckMultiSigVerify));
                            }
                        } else {
                            stack.push(encode_num(success as i64));
                        }
                    }
                    OP_CHECKLOCKTIMEVERIFY => {
                        if flags & VERIFY_CHECKLOCKTIMEVERIFY == 0 {
                            if flags & VERIFY_DISCOURAGE_UPGRADABLE_NOPS != 0 {
                                return Err(Error::Script(
                                    ScriptError::DiscourageUpgradableNops,
                                ));
                            }
                        } else {
                            check_stack_size(1, stack)?;
                            // Compared without popping.
                            let locktime = decode_num(
                                &stack[stack.len() - 1],
                                require_minimal,
                                NUM_MAX_LEN_EXTENDED,
                            )?;
                            if locktime < 0 {
                                return Err(Error::Script(ScriptError::NegativeLockTime));
                            }
                            if !checker.check_locktime(locktime)? {
                                return Err(Error::Script(ScriptError::UnsatisfiedLockTime));
                            }
                        }
                    }
                    OP_CHECKSEQUENCEVERIFY => {
                        if flags & VERIFY_CHECKSEQUENCEVERIFY == 0 {
                            if flags & VERIFY_DISCOURAGE_UPGRADABLE_NOPS != 0 {
                                return Err(Error::Script(
                                    ScriptError::DiscourageUpgradableNops,
                                ));
                            }
                        } else {
                            check_stack_size(1, stack)?;
                            let sequence = decode_num(
                                &stack[stack.len() - 1],
                                require_minimal,
                                NUM_MAX_LEN_EXTENDED,
                            )?;
                            if sequence < 0 {
                                return Err(Error::Script(ScriptError::NegativeLockTime));
                            }
                            if !checker.check_sequence(sequence)? {
                                return Err(Error::Script(ScriptError::UnsatisfiedLockTime));
                            }
                        }
                    }
                    OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9
                    | OP_NOP10 => {
                        if flags & VERIFY_DISCOURAGE_UPGRADABLE_NOPS != 0 {
                            return Err(Error::Script(ScriptError::DiscourageUpgradableNops));
                        }
                    }
                    _ => return Err(Error::Script(ScriptError::BadOpcode)),
                }
            }
        }
        if stack.len() + alt_stack.len() > MAX_STACK_SIZE {
            return Err(Error::Script(ScriptError::StackSize));
        }
        opcode_pos += 1;
    }

    if !branch_exec.is_empty() {
        return Err(Error::Script(ScriptError::UnbalancedConditional));
    }
    Ok(())
}

/// BIP342 signature opcode semantics: success mirrors signature
/// non-emptiness, a non-empty signature must verify, and each passing
/// check consumes validation weight.
#[inline]
fn tapscript_checksig<T: Checker>(
    sig: &[u8],
    pubkey: &[u8],
    checker: &mut T,
    flags: u32,
    exec: &mut ExecData,
) -> Result<bool> {
    let success = !sig.is_empty();
    if success {
        let weight = exec
            .validation_weight_left
            .as_mut()
            .ok_or_else(|| Error::IllegalState("No validation weight budget".to_string()))?;
        *weight -= VALIDATION_WEIGHT_PER_SIGOP_PASSED;
        if *weight < 0 {
            return Err(Error::Script(ScriptError::TapscriptValidationWeight));
        }
    }
    if pubkey.is_empty() {
        return Err(Error::Script(ScriptError::PubkeyType));
    }
    if pubkey.len() == 32 {
        if success {
            let ext = TapscriptExt {
                leaf_hash: exec
                    .tapleaf_hash
                    .ok_or_else(|| Error::IllegalState("No tapleaf hash".to_string()))?,
                codesep_pos: exec.codesep_pos,
            };
            if !checker.check_schnorr_sig(sig, pubkey, Some(&ext))? {
                return Err(Error::Script(ScriptError::SchnorrSig));
            }
        }
    } else if flags & VERIFY_DISCOURAGE_UPGRADABLE_PUBKEYTYPE != 0 {
        // Unknown key types succeed silently for upgradeability.
        return Err(Error::Script(ScriptError::DiscourageUpgradablePubkeyType));
    }
    Ok(success)
}

#[inline]
fn check_stack_size(minsize: usize, stack: &[Vec<u8>]) -> Result<()> {
    if stack.len() < minsize {
        return Err(Error::Script(ScriptError::InvalidStackOperation));
    }
    Ok(())
}
