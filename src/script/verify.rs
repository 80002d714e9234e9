//! Top-level redemption rules: which scripts run for a spend, in what
//! order, and how witness data maps to interpreter invocations.

use crate::script::checker::Checker;
use crate::script::interpreter::VALIDATION_WEIGHT_OFFSET;
use crate::script::stack::decode_bool;
use crate::script::taproot::{
    ControlBlock, TAPROOT_ANNEX_PREFIX, TAPROOT_LEAF_TAPSCRIPT, leaf_hash, verify_commitment,
};
use crate::script::{
    ExecData, MAX_SCRIPT_ELEMENT_SIZE, MAX_STACK_SIZE, ScriptError, SigVersion,
    TransactionChecker, VERIFY_CLEANSTACK, VERIFY_DISCOURAGE_OP_SUCCESS,
    VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION, VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM,
    VERIFY_P2SH, VERIFY_SIGPUSHONLY, VERIFY_TAPROOT, VERIFY_WITNESS, contains_op_success, eval,
    is_p2sh, is_push_only, single_push, witness_program,
};
use crate::transaction::sighash::SigHashCache;
use crate::transaction::{Tx, TxOut};
use crate::util::{Error, Hash160, Result, var_int};
use bitcoin_hashes::{Hash as BHHash, sha256 as bh_sha256};
use secp256k1::{Secp256k1, VerifyOnly};

/// Transaction input verifier.
///
/// Owns the secp256k1 verification context, which is expensive to build
/// and safe for unlimited concurrent use. Construct once and share across
/// workers; `verify_input` is a pure function of its arguments.
pub struct Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    /// Creates a verifier with a fresh verification context.
    #[must_use]
    pub fn new() -> Self {
        Verifier {
            secp: Secp256k1::verification_only(),
        }
    }

    /// Verifies that one input of `tx` is authorized to spend its previous
    /// output, under the given verification flags.
    ///
    /// `prevouts` lists every output spent by the transaction, aligned
    /// with its inputs; entry `input` is the one this call checks. The
    /// full list is required because taproot signatures commit to all
    /// spent amounts and scripts.
    ///
    /// # Errors
    /// `Error::BadArgument` for index or prevout misalignment,
    /// `Error::Script` carrying the specific [`ScriptError`] otherwise.
    pub fn verify_input(
        &self,
        tx: &Tx,
        input: usize,
        prevouts: &[TxOut],
        flags: u32,
    ) -> Result<()> {
        let flags = apply_implied_flags(flags);
        if input >= tx.inputs.len() {
            return Err(Error::BadArgument("Input index out of range".to_string()));
        }
        if prevouts.len() != tx.inputs.len() {
            return Err(Error::BadArgument(
                "Previous outputs must match inputs".to_string(),
            ));
        }
        let spent = &prevouts[input];
        let mut cache = SigHashCache::new();
        let mut checker = TransactionChecker::new(
            tx,
            &mut cache,
            input,
            spent.satoshis,
            prevouts,
            &self.secp,
        );
        let txin = &tx.inputs[input];
        self.verify_script(
            &mut checker,
            &txin.unlock_script.0,
            &spent.lock_script.0,
            &txin.witness,
            flags,
        )
    }

    fn verify_script(
        &self,
        checker: &mut TransactionChecker,
        script_sig: &[u8],
        script_pubkey: &[u8],
        witness: &[Vec<u8>],
        flags: u32,
    ) -> Result<()> {
        if flags & VERIFY_SIGPUSHONLY != 0 && !is_push_only(script_sig) {
            return Err(Error::Script(ScriptError::SigPushOnly));
        }

        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut exec = ExecData::default();
        eval(
            script_sig,
            &mut stack,
            checker,
            flags,
            SigVersion::Base,
            &mut exec,
        )?;
        // P2SH needs the stack as the scriptSig left it.
        let p2sh_stack = if flags & VERIFY_P2SH != 0 && is_p2sh(script_pubkey) {
            Some(stack.clone())
        } else {
            None
        };
        let mut exec = ExecData::default();
        eval(
            script_pubkey,
            &mut stack,
            checker,
            flags,
            SigVersion::Base,
            &mut exec,
        )?;
        if !stack_truthy(&stack) {
            return Err(Error::Script(ScriptError::EvalFalse));
        }

        let mut had_witness = false;
        if flags & VERIFY_WITNESS != 0 {
            if let Some((version, program)) = witness_program(script_pubkey) {
                had_witness = true;
                if !script_sig.is_empty() {
                    return Err(Error::Script(ScriptError::WitnessMalleated));
                }
                self.verify_witness_program(checker, version, program, witness, flags, false)?;
                stack = vec![vec![1]];
            }
        }

        if let Some(mut stack_copy) = p2sh_stack {
            if !is_push_only(script_sig) {
                return Err(Error::Script(ScriptError::SigPushOnly));
            }
            let Some(redeem_script) = stack_copy.pop() else {
                return Err(Error::Script(ScriptError::EvalFalse));
            };
            let mut exec = ExecData::default();
            eval(
                &redeem_script,
                &mut stack_copy,
                checker,
                flags,
                SigVersion::Base,
                &mut exec,
            )?;
            if !stack_truthy(&stack_copy) {
                return Err(Error::Script(ScriptError::EvalFalse));
            }
            if flags & VERIFY_WITNESS != 0 {
                if let Some((version, program)) = witness_program(&redeem_script) {
                    had_witness = true;
                    // The scriptSig must be exactly the canonical push of
                    // the witness-program redeem script.
                    let expected = single_push(&redeem_script)?;
                    if script_sig != expected.0.as_slice() {
                        return Err(Error::Script(ScriptError::WitnessMalleatedP2SH));
                    }
                    self.verify_witness_program(checker, version, program, witness, flags, true)?;
                    stack_copy = vec![vec![1]];
                }
            }
            stack = stack_copy;
        }

        if flags & VERIFY_CLEANSTACK != 0 && stack.len() != 1 {
            return Err(Error::Script(ScriptError::CleanStack));
        }
        if flags & VERIFY_WITNESS != 0 && !had_witness && !witness.is_empty() {
            return Err(Error::Script(ScriptError::WitnessUnexpected));
        }
        Ok(())
    }

    fn verify_witness_program(
        &self,
        checker: &mut TransactionChecker,
        version: u8,
        program: &[u8],
        witness: &[Vec<u8>],
        flags: u32,
        in_p2sh: bool,
    ) -> Result<()> {
        if version == 0 {
            match program.len() {
                20 => {
                    // P2WPKH: implicit P2PKH over the witness program.
                    if witness.len() != 2 {
                        return Err(Error::Script(ScriptError::WitnessProgramMismatch));
                    }
                    let mut pkh = Hash160([0; 20]);
                    pkh.0.copy_from_slice(program);
                    let script_code = crate::transaction::p2pkh::create_lock_script(&pkh);
                    let mut stack = witness_stack(witness, witness.len())?;
                    self.run_witness_script(
                        checker,
                        &script_code.0,
                        &mut stack,
                        flags,
                        SigVersion::WitnessV0,
                        ExecData::default(),
                    )
                }
                32 => {
                    // P2WSH: the last witness element is the script.
                    if witness.is_empty() {
                        return Err(Error::Script(ScriptError::WitnessProgramWitnessEmpty));
                    }
                    let witness_script = witness[witness.len() - 1].clone();
                    let hash = bh_sha256::Hash::hash(&witness_script).to_byte_array();
                    if hash != program {
                        return Err(Error::Script(ScriptError::WitnessProgramMismatch));
                    }
                    let mut stack = witness_stack(witness, witness.len() - 1)?;
                    self.run_witness_script(
                        checker,
                        &witness_script,
                        &mut stack,
                        flags,
                        SigVersion::WitnessV0,
                        ExecData::default(),
                    )
                }
                _ => Err(Error::Script(ScriptError::WitnessProgramWrongLength)),
            }
        } else if version == 1 && program.len() == 32 && !in_p2sh {
            self.verify_taproot_spend(checker, program, witness, flags)
        } else if flags & VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM != 0 {
            Err(Error::Script(
                ScriptError::DiscourageUpgradableWitnessProgram,
            ))
        } else {
            // Unknown versions stay spendable for future soft forks.
            Ok(())
        }
    }

    fn verify_taproot_spend(
        &self,
        checker: &mut TransactionChecker,
        program: &[u8],
        witness: &[Vec<u8>],
        flags: u32,
    ) -> Result<()> {
        if flags & VERIFY_TAPROOT == 0 {
            return Ok(());
        }
        if witness.is_empty() {
            return Err(Error::Script(ScriptError::WitnessProgramWitnessEmpty));
        }

        let mut stack_len = witness.len();
        if stack_len >= 2 {
            let last = &witness[stack_len - 1];
            if !last.is_empty() && last[0] == TAPROOT_ANNEX_PREFIX {
                checker.annex = Some(last.clone());
                stack_len -= 1;
            }
        }

        if stack_len == 1 {
            // Key path: one Schnorr signature against the output key.
            if !checker.check_schnorr_sig(&witness[0], program, None)? {
                return Err(Error::Script(ScriptError::SchnorrSig));
            }
            return Ok(());
        }

        // Script path: the last two elements are the control block and the
        // revealed leaf script.
        let control = ControlBlock::parse(&witness[stack_len - 1])?;
        let script = witness[stack_len - 2].clone();
        stack_len -= 2;
        let leaf_version = control.leaf_version();
        let tapleaf_hash = leaf_hash(&script, leaf_version);
        let merkle_root = control.merkle_root(tapleaf_hash);
        if !verify_commitment(&self.secp, program, &control, &merkle_root) {
            return Err(Error::Script(ScriptError::WitnessProgramMismatch));
        }

        if leaf_version == TAPROOT_LEAF_TAPSCRIPT {
            if contains_op_success(&script)? {
                if flags & VERIFY_DISCOURAGE_OP_SUCCESS != 0 {
                    return Err(Error::Script(ScriptError::DiscourageOpSuccess));
                }
                // OP_SUCCESS makes the whole leaf unconditionally valid.
                return Ok(());
            }
            let mut stack = witness_stack(witness, stack_len)?;
            if stack.len() > MAX_STACK_SIZE {
                return Err(Error::Script(ScriptError::StackSize));
            }
            let exec = ExecData {
                tapleaf_hash: Some(tapleaf_hash),
                codesep_pos: u32::MAX,
                validation_weight_left: Some(
                    witness_serialized_size(witness) + VALIDATION_WEIGHT_OFFSET,
                ),
            };
            self.run_witness_script(
                checker,
                &script,
                &mut stack,
                flags,
                SigVersion::Tapscript,
                exec,
            )
        } else if flags & VERIFY_DISCOURAGE_UPGRADABLE_TAPROOT_VERSION != 0 {
            Err(Error::Script(ScriptError::DiscourageUpgradableTaprootVersion))
        } else {
            Ok(())
        }
    }

    fn run_witness_script(
        &self,
        checker: &mut TransactionChecker,
        script: &[u8],
        stack: &mut Vec<Vec<u8>>,
        flags: u32,
        sig_version: SigVersion,
        mut exec: ExecData,
    ) -> Result<()> {
        eval(script, stack, checker, flags, sig_version, &mut exec)?;
        if stack.len() != 1 {
            return Err(Error::Script(ScriptError::CleanStack));
        }
        if !decode_bool(&stack[0]) {
            return Err(Error::Script(ScriptError::EvalFalse));
        }
        Ok(())
    }
}

/// Witness evaluation requires P2SH, and taproot requires witness.
fn apply_implied_flags(mut flags: u32) -> u32 {
    if flags & VERIFY_TAPROOT != 0 {
        flags |= VERIFY_WITNESS;
    }
    if flags & VERIFY_WITNESS != 0 {
        flags |= VERIFY_P2SH;
    }
    flags
}

fn stack_truthy(stack: &[Vec<u8>]) -> bool {
    match stack.last() {
        Some(top) => decode_bool(top),
        None => false,
    }
}

fn witness_stack(witness: &[Vec<u8>], end: usize) -> Result<Vec<Vec<u8>>> {
    let mut stack = Vec::with_capacity(end);
    for item in &witness[..end] {
        if item.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(Error::Script(ScriptError::PushSize));
        }
        stack.push(item.clone());
    }
    Ok(stack)
}

fn witness_serialized_size(witness: &[Vec<u8>]) -> i64 {
    let mut total = var_int::size(witness.len() as u64) as i64;
    for item in witness {
        total += (var_int::size(item.len() as u64) + item.len()) as i64;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::op_codes::*;
    use crate::script::taproot::{output_key, tap_tweak_hash};
    use crate::script::{NO_FLAGS, Script};
    use crate::transaction::p2pkh;
    use crate::transaction::sighash::{
        SIGHASH_ALL, SIGHASH_DEFAULT, TapscriptExt, taproot_sighash, witness_v0_sighash,
        legacy_sighash,
    };
    use crate::transaction::{OutPoint, TxIn, generate_schnorr_signature, generate_signature};
    use crate::util::{Hash256, hash160};
    use secp256k1::{Keypair, PublicKey, Scalar, SecretKey};

    fn spend_fixture(lock_script: Script, satoshis: i64) -> (Tx, Vec<TxOut>) {
        let prevouts = vec![TxOut {
            satoshis,
            lock_script,
        }];
        let tx = Tx {
            version: 2,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256([0x11; 32]),
                    index: 0,
                },
                unlock_script: Script(vec![]),
                sequence: 0xffffffff,
                witness: Vec::new(),
            }],
            outputs: vec![TxOut {
                satoshis: satoshis - 1000,
                lock_script: Script(vec![0x51]),
            }],
            lock_time: 0,
        };
        (tx, prevouts)
    }

    fn script_err(result: Result<()>) -> ScriptError {
        match result {
            Err(Error::Script(e)) => e,
            other => panic!("expected script error, got {:?}", other),
        }
    }

    #[test]
    fn p2pkh_spend() {
        let secp = Secp256k1::new();
        let private_key = [5; 32];
        let pk = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        )
        .serialize();
        let lock_script = p2pkh::create_lock_script(&hash160(&pk));
        let (mut tx, prevouts) = spend_fixture(lock_script.clone(), 50_000);

        let sig_hash = legacy_sighash(&tx, 0, &lock_script.0, SIGHASH_ALL).unwrap();
        let sig = generate_signature(&private_key, &sig_hash, SIGHASH_ALL).unwrap();
        tx.inputs[0].unlock_script = p2pkh::create_unlock_script(&sig, &pk);

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS).is_ok());

        // Identical arguments give identical results.
        assert!(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS).is_ok());

        // A corrupted signature is just false, not a structural error.
        let mut bad_sig = sig.clone();
        bad_sig[10] ^= 1;
        tx.inputs[0].unlock_script = p2pkh::create_unlock_script(&bad_sig, &pk);
        assert_eq!(
            script_err(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS)),
            ScriptError::EvalFalse
        );
    }

    #[test]
    fn p2sh_spend() {
        let redeem_script = Script(vec![OP_1]);
        let mut lock_script = Script::new();
        lock_script.append(OP_HASH160);
        lock_script.append_data(&hash160(&redeem_script.0).0).unwrap();
        lock_script.append(OP_EQUAL);

        let (mut tx, prevouts) = spend_fixture(lock_script, 10_000);
        let mut unlock = Script::new();
        unlock.append_data(&redeem_script.0).unwrap();
        tx.inputs[0].unlock_script = unlock;

        let verifier = Verifier::new();
        assert!(
            verifier
                .verify_input(&tx, 0, &prevouts, VERIFY_P2SH | VERIFY_CLEANSTACK)
                .is_ok()
        );

        // Non-push scriptSig is malleable and rejected.
        let mut non_push = Script::new();
        non_push.append(OP_NOP);
        non_push.append_data(&redeem_script.0).unwrap();
        tx.inputs[0].unlock_script = non_push;
        assert_eq!(
            script_err(verifier.verify_input(&tx, 0, &prevouts, VERIFY_P2SH)),
            ScriptError::SigPushOnly
        );
    }

    #[test]
    fn p2wpkh_spend() {
        let secp = Secp256k1::new();
        let private_key = [7; 32];
        let pk = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        )
        .serialize();
        let pkh = hash160(&pk);
        let mut lock_script = Script::new();
        lock_script.append(OP_0);
        lock_script.append_data(&pkh.0).unwrap();

        let (mut tx, prevouts) = spend_fixture(lock_script, 70_000);
        let script_code = p2pkh::create_lock_script(&pkh);
        let mut cache = SigHashCache::new();
        let sig_hash =
            witness_v0_sighash(&tx, 0, &script_code.0, 70_000, SIGHASH_ALL, &mut cache).unwrap();
        let sig = generate_signature(&private_key, &sig_hash, SIGHASH_ALL).unwrap();
        tx.inputs[0].witness = vec![sig.clone(), pk.to_vec()];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_WITNESS).is_ok());

        // A non-empty scriptSig on a native witness spend is malleation.
        let mut malleated = tx.clone();
        malleated.inputs[0].unlock_script = Script(vec![OP_1]);
        assert_eq!(
            script_err(verifier.verify_input(&malleated, 0, &prevouts, VERIFY_WITNESS)),
            ScriptError::WitnessMalleated
        );

        // Witness stack must be exactly signature and key.
        let mut extra = tx.clone();
        extra.inputs[0].witness.push(vec![]);
        assert_eq!(
            script_err(verifier.verify_input(&extra, 0, &prevouts, VERIFY_WITNESS)),
            ScriptError::WitnessProgramMismatch
        );
    }

    #[test]
    fn witness_on_legacy_output_is_unexpected() {
        let lock_script = Script(vec![OP_1]);
        let (mut tx, prevouts) = spend_fixture(lock_script, 5_000);
        tx.inputs[0].witness = vec![vec![1]];
        let verifier = Verifier::new();
        assert_eq!(
            script_err(verifier.verify_input(&tx, 0, &prevouts, VERIFY_WITNESS)),
            ScriptError::WitnessUnexpected
        );
        // Without witness evaluation the spend stands.
        assert!(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS).is_ok());
    }

    #[test]
    fn p2wsh_spend() {
        let secp = Secp256k1::new();
        let private_key = [9; 32];
        let pk = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        )
        .serialize();
        // Witness script: <pk> CHECKSIG
        let mut witness_script = Script::new();
        witness_script.append_data(&pk).unwrap();
        witness_script.append(OP_CHECKSIG);
        let program = bh_sha256::Hash::hash(&witness_script.0).to_byte_array();
        let mut lock_script = Script::new();
        lock_script.append(OP_0);
        lock_script.append_data(&program).unwrap();

        let (mut tx, prevouts) = spend_fixture(lock_script, 80_000);
        let mut cache = SigHashCache::new();
        let sig_hash =
            witness_v0_sighash(&tx, 0, &witness_script.0, 80_000, SIGHASH_ALL, &mut cache)
                .unwrap();
        let sig = generate_signature(&private_key, &sig_hash, SIGHASH_ALL).unwrap();
        tx.inputs[0].witness = vec![sig, witness_script.0.clone()];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_WITNESS).is_ok());

        // A witness script that does not hash to the program fails.
        let mut mismatch = tx.clone();
        let mut other = witness_script.clone();
        other.append(OP_NOP);
        *mismatch.inputs[0].witness.last_mut().unwrap() = other.0;
        assert_eq!(
            script_err(verifier.verify_input(&mismatch, 0, &prevouts, VERIFY_WITNESS)),
            ScriptError::WitnessProgramMismatch
        );
    }

    #[test]
    fn p2sh_p2wpkh_spend() {
        let secp = Secp256k1::new();
        let private_key = [13; 32];
        let pk = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        )
        .serialize();
        let pkh = hash160(&pk);
        let mut redeem_script = Script::new();
        redeem_script.append(OP_0);
        redeem_script.append_data(&pkh.0).unwrap();
        let mut lock_script = Script::new();
        lock_script.append(OP_HASH160);
        lock_script.append_data(&hash160(&redeem_script.0).0).unwrap();
        lock_script.append(OP_EQUAL);

        let (mut tx, prevouts) = spend_fixture(lock_script, 30_000);
        let mut unlock = Script::new();
        unlock.append_data(&redeem_script.0).unwrap();
        tx.inputs[0].unlock_script = unlock;
        let script_code = p2pkh::create_lock_script(&pkh);
        let mut cache = SigHashCache::new();
        let sig_hash =
            witness_v0_sighash(&tx, 0, &script_code.0, 30_000, SIGHASH_ALL, &mut cache).unwrap();
        let sig = generate_signature(&private_key, &sig_hash, SIGHASH_ALL).unwrap();
        tx.inputs[0].witness = vec![sig, pk.to_vec()];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_WITNESS).is_ok());

        // Anything beyond the single redeem-script push is malleation.
        let mut malleated = tx.clone();
        let mut padded = Script::new();
        padded.append(OP_0);
        padded.append_data(&redeem_script.0).unwrap();
        malleated.inputs[0].unlock_script = padded;
        assert_eq!(
            script_err(verifier.verify_input(&malleated, 0, &prevouts, VERIFY_WITNESS)),
            ScriptError::WitnessMalleatedP2SH
        );
    }

    fn taproot_key_path_fixture(
        private_key: [u8; 32],
    ) -> (Tx, Vec<TxOut>, [u8; 32], [u8; 32], Keypair) {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        );
        let (internal, _) = keypair.x_only_public_key();
        let internal_bytes = internal.serialize();
        let (program, _) = output_key(&secp, &internal_bytes, None).unwrap();
        let mut lock_script = Script::new();
        lock_script.append(OP_1);
        lock_script.append_data(&program).unwrap();
        let (tx, prevouts) = spend_fixture(lock_script, 100_000);
        (tx, prevouts, internal_bytes, program, keypair)
    }

    #[test]
    fn taproot_key_path_spend() {
        let secp = Secp256k1::new();
        let (mut tx, prevouts, internal_bytes, _program, keypair) =
            taproot_key_path_fixture([21; 32]);

        // Key-path signatures come from the tweaked key.
        let tweak = Scalar::from_be_bytes(tap_tweak_hash(&internal_bytes, None)).unwrap();
        let tweaked = keypair.add_xonly_tweak(&secp, &tweak).unwrap();
        let mut cache = SigHashCache::new();
        let sig_hash =
            taproot_sighash(&tx, 0, &prevouts, SIGHASH_DEFAULT, None, None, &mut cache).unwrap();
        let sig =
            generate_schnorr_signature(&tweaked.secret_bytes(), &sig_hash, SIGHASH_DEFAULT)
                .unwrap();
        assert_eq!(sig.len(), 64);
        tx.inputs[0].witness = vec![sig.clone()];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_TAPROOT).is_ok());

        // The same signature against the untweaked internal key fails.
        let mut untweaked_lock = Script::new();
        untweaked_lock.append(OP_1);
        untweaked_lock.append_data(&internal_bytes).unwrap();
        let mut wrong_prevouts = prevouts.clone();
        wrong_prevouts[0].lock_script = untweaked_lock;
        assert!(
            verifier
                .verify_input(&tx, 0, &wrong_prevouts, VERIFY_TAPROOT)
                .is_err()
        );

        // Without the taproot flag the output is anyone-can-spend.
        let mut no_sig = tx.clone();
        no_sig.inputs[0].witness = vec![vec![0; 64]];
        assert!(
            verifier
                .verify_input(&no_sig, 0, &prevouts, VERIFY_WITNESS)
                .is_ok()
        );
    }

    #[test]
    fn taproot_key_path_with_annex() {
        let secp = Secp256k1::new();
        let (mut tx, prevouts, internal_bytes, _program, keypair) =
            taproot_key_path_fixture([22; 32]);
        let tweak = Scalar::from_be_bytes(tap_tweak_hash(&internal_bytes, None)).unwrap();
        let tweaked = keypair.add_xonly_tweak(&secp, &tweak).unwrap();

        let annex = vec![0x50, 0xde, 0xad];
        let mut cache = SigHashCache::new();
        let sig_hash = taproot_sighash(
            &tx,
            0,
            &prevouts,
            SIGHASH_DEFAULT,
            Some(&annex),
            None,
            &mut cache,
        )
        .unwrap();
        let sig =
            generate_schnorr_signature(&tweaked.secret_bytes(), &sig_hash, SIGHASH_DEFAULT)
                .unwrap();
        tx.inputs[0].witness = vec![sig, annex];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_TAPROOT).is_ok());
    }

    #[test]
    fn taproot_script_path_spend() {
        let secp = Secp256k1::new();
        // Internal key and a separate script key.
        let internal_keypair = Keypair::from_secret_key(
            &secp,
            &SecretKey::from_byte_array([31; 32]).unwrap(),
        );
        let script_keypair = Keypair::from_secret_key(
            &secp,
            &SecretKey::from_byte_array([32; 32]).unwrap(),
        );
        let (internal, _) = internal_keypair.x_only_public_key();
        let internal_bytes = internal.serialize();
        let (script_key, _) = script_keypair.x_only_public_key();

        // Leaf script: <xonly key> CHECKSIG
        let mut leaf_script = Script::new();
        leaf_script.append_data(&script_key.serialize()).unwrap();
        leaf_script.append(OP_CHECKSIG);
        let tapleaf = leaf_hash(&leaf_script.0, TAPROOT_LEAF_TAPSCRIPT);

        // Single-leaf tree: the merkle root is the leaf hash.
        let (program, parity) = output_key(&secp, &internal_bytes, Some(&tapleaf)).unwrap();
        let mut control = vec![TAPROOT_LEAF_TAPSCRIPT | parity];
        control.extend_from_slice(&internal_bytes);

        let mut lock_script = Script::new();
        lock_script.append(OP_1);
        lock_script.append_data(&program).unwrap();
        let (mut tx, prevouts) = spend_fixture(lock_script, 120_000);

        let ext = TapscriptExt {
            leaf_hash: tapleaf,
            codesep_pos: u32::MAX,
        };
        let mut cache = SigHashCache::new();
        let sig_hash = taproot_sighash(
            &tx,
            0,
            &prevouts,
            SIGHASH_DEFAULT,
            None,
            Some(&ext),
            &mut cache,
        )
        .unwrap();
        let sig = generate_schnorr_signature(
            &script_keypair.secret_bytes(),
            &sig_hash,
            SIGHASH_DEFAULT,
        )
        .unwrap();
        tx.inputs[0].witness = vec![sig, leaf_script.0.clone(), control.clone()];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_TAPROOT).is_ok());

        // A control block claiming the wrong parity breaks the commitment.
        let mut bad_control = control.clone();
        bad_control[0] ^= 1;
        let mut bad = tx.clone();
        *bad.inputs[0].witness.last_mut().unwrap() = bad_control;
        assert_eq!(
            script_err(verifier.verify_input(&bad, 0, &prevouts, VERIFY_TAPROOT)),
            ScriptError::WitnessProgramMismatch
        );

        // Truncated control blocks are rejected by size.
        let mut short = tx.clone();
        *short.inputs[0].witness.last_mut().unwrap() = control[..32].to_vec();
        assert_eq!(
            script_err(verifier.verify_input(&short, 0, &prevouts, VERIFY_TAPROOT)),
            ScriptError::TaprootWrongControlSize
        );

        // An empty signature makes CHECKSIG yield false, failing the leaf.
        let mut empty_sig = tx.clone();
        empty_sig.inputs[0].witness[0] = vec![];
        assert_eq!(
            script_err(verifier.verify_input(&empty_sig, 0, &prevouts, VERIFY_TAPROOT)),
            ScriptError::EvalFalse
        );
    }

    #[test]
    fn taproot_op_success() {
        let secp = Secp256k1::new();
        let internal_keypair = Keypair::from_secret_key(
            &secp,
            &SecretKey::from_byte_array([41; 32]).unwrap(),
        );
        let (internal, _) = internal_keypair.x_only_public_key();
        let internal_bytes = internal.serialize();

        // A leaf consisting of a lone OP_SUCCESS opcode.
        let leaf_script = vec![OP_RESERVED];
        let tapleaf = leaf_hash(&leaf_script, TAPROOT_LEAF_TAPSCRIPT);
        let (program, parity) = output_key(&secp, &internal_bytes, Some(&tapleaf)).unwrap();
        let mut control = vec![TAPROOT_LEAF_TAPSCRIPT | parity];
        control.extend_from_slice(&internal_bytes);

        let mut lock_script = Script::new();
        lock_script.append(OP_1);
        lock_script.append_data(&program).unwrap();
        let (mut tx, prevouts) = spend_fixture(lock_script, 40_000);
        tx.inputs[0].witness = vec![leaf_script, control];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_TAPROOT).is_ok());
        assert_eq!(
            script_err(verifier.verify_input(
                &tx,
                0,
                &prevouts,
                VERIFY_TAPROOT | VERIFY_DISCOURAGE_OP_SUCCESS
            )),
            ScriptError::DiscourageOpSuccess
        );
    }

    #[test]
    fn unknown_witness_versions() {
        let mut lock_script = Script::new();
        lock_script.append(OP_2);
        lock_script.append_data(&[0xab; 20]).unwrap();
        let (mut tx, prevouts) = spend_fixture(lock_script, 9_000);
        tx.inputs[0].witness = vec![vec![1, 2, 3]];

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, VERIFY_WITNESS).is_ok());
        assert_eq!(
            script_err(verifier.verify_input(
                &tx,
                0,
                &prevouts,
                VERIFY_WITNESS | VERIFY_DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM
            )),
            ScriptError::DiscourageUpgradableWitnessProgram
        );
    }

    #[test]
    fn cleanstack_rejects_leftovers() {
        let secp = Secp256k1::new();
        let private_key = [6; 32];
        let pk = PublicKey::from_secret_key(
            &secp,
            &SecretKey::from_byte_array(private_key).unwrap(),
        )
        .serialize();
        let lock_script = p2pkh::create_lock_script(&hash160(&pk));
        let (mut tx, prevouts) = spend_fixture(lock_script.clone(), 20_000);
        let sig_hash = legacy_sighash(&tx, 0, &lock_script.0, SIGHASH_ALL).unwrap();
        let sig = generate_signature(&private_key, &sig_hash, SIGHASH_ALL).unwrap();
        let mut unlock = Script::new();
        unlock.append(OP_1);
        unlock.append_data(&sig).unwrap();
        unlock.append_data(&pk).unwrap();
        tx.inputs[0].unlock_script = unlock;

        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS).is_ok());
        assert_eq!(
            script_err(verifier.verify_input(
                &tx,
                0,
                &prevouts,
                VERIFY_P2SH | VERIFY_CLEANSTACK
            )),
            ScriptError::CleanStack
        );
    }

    #[test]
    fn prevouts_must_align() {
        let (tx, _) = spend_fixture(Script(vec![OP_1]), 1_000);
        let verifier = Verifier::new();
        assert!(verifier.verify_input(&tx, 0, &[], NO_FLAGS).is_err());
        assert!(verifier.verify_input(&tx, 5, &[], NO_FLAGS).is_err());
    }
}
