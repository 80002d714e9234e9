//! Transaction sighash computation.
//!
//! Three digest algorithms, selected by signature version: legacy (modified
//! transaction copy, double SHA256), segwit v0 (BIP143 fixed preimage with
//! the spent amount bound in), and taproot (BIP341 tagged hash over the
//! full set of spent outputs). Intermediate hashes are cached for multi-sig
//! efficiency.

use crate::script::op_codes::OP_CODESEPARATOR;
use crate::script::{ScriptError, next_op};
use crate::transaction::{Tx, TxOut};
use crate::util::{Error, Hash256, Result, Serializable, sha256d, var_int};
use bitcoin_hashes::{Hash as BHHash, sha256 as bh_sha256, sha256d as bh_sha256d};
use byteorder::{LittleEndian, WriteBytesExt};

/// Signs all outputs.
pub const SIGHASH_ALL: u8 = 0x01;
/// Signs no outputs (anyone can spend the value).
pub const SIGHASH_NONE: u8 = 0x02;
/// Signs only the matching output.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Anyone can add inputs.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;
/// Taproot default hash type, committing like ALL but omitted from the
/// signature's trailing byte.
pub const SIGHASH_DEFAULT: u8 = 0x00;

/// Mask selecting the base hash type.
const SIGHASH_BASE_MASK: u8 = 0x1f;

/// Cache for sighash intermediates.
///
/// Reuse across signature checks of one transaction makes repeated
/// verification O(1) in hashing after the first signature.
#[derive(Default, Debug)]
pub struct SigHashCache {
    hash_prevouts: Option<Hash256>,
    hash_sequence: Option<Hash256>,
    hash_outputs: Option<Hash256>,
    sha_prevouts: Option<[u8; 32]>,
    sha_amounts: Option<[u8; 32]>,
    sha_script_pubkeys: Option<[u8; 32]>,
    sha_sequences: Option<[u8; 32]>,
    sha_outputs: Option<[u8; 32]>,
}

impl SigHashCache {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// The BIP342 tapscript message extension: the executed leaf and the
/// position of the last executed OP_CODESEPARATOR (0xffffffff if none).
#[derive(Debug, Clone, Copy)]
pub struct TapscriptExt {
    /// Tapleaf hash of the script being executed.
    pub leaf_hash: [u8; 32],
    /// Opcode position of the last executed OP_CODESEPARATOR.
    pub codesep_pos: u32,
}

/// Tapscript public key version byte, constant in the current consensus.
const TAPSCRIPT_KEY_VERSION: u8 = 0x00;

/// Legacy sighash: double SHA256 of a modified transaction copy.
///
/// Inputs other than the one being signed get empty scripts (and zero
/// sequence under NONE/SINGLE); outputs are pruned per the hash type; the
/// 4-byte hash type is appended. OP_CODESEPARATOR occurrences are removed
/// from the script code during serialization.
///
/// # Errors
/// `Error::BadArgument` if the input index is out of range.
pub fn legacy_sighash(
    tx: &Tx,
    n_input: usize,
    script_code: &[u8],
    sighash_type: u8,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument("Input index out of range".to_string()));
    }
    let base_type = sighash_type & SIGHASH_BASE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    // The historical SIGHASH_SINGLE bug: an input with no matching output
    // signs the constant digest 1 rather than failing.
    if base_type == SIGHASH_SINGLE && n_input >= tx.outputs.len() {
        let mut one = [0u8; 32];
        one[0] = 1;
        return Ok(Hash256(one));
    }

    // Sub-script with OP_CODESEPARATOR removed
    let mut sub_script = Vec::with_capacity(script_code.len());
    let mut i = 0;
    while i < script_code.len() {
        let next = next_op(i, script_code);
        if script_code[i] != OP_CODESEPARATOR {
            sub_script.extend_from_slice(&script_code[i..next]);
        }
        i = next;
    }

    let mut s = Vec::with_capacity(tx.size());
    // Version
    s.write_u32::<LittleEndian>(tx.version)?;
    // Inputs
    let n_inputs = if anyone_can_pay { 1 } else { tx.inputs.len() };
    var_int::write(n_inputs as u64, &mut s)?;
    for i in 0..tx.inputs.len() {
        let input_idx = if anyone_can_pay { n_input } else { i };
        let mut tx_in = tx.inputs[input_idx].clone();
        tx_in.witness.clear();
        if input_idx == n_input {
            tx_in.unlock_script.0 = sub_script.clone();
        } else {
            tx_in.unlock_script.0 = Vec::new();
            if base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE {
                tx_in.sequence = 0;
            }
        }
        tx_in.write(&mut s)?;
        if anyone_can_pay {
            break;
        }
    }
    // Outputs
    let n_outputs = if base_type == SIGHASH_NONE {
        0
    } else if base_type == SIGHASH_SINGLE {
        n_input + 1
    } else {
        tx.outputs.len()
    };
    var_int::write(n_outputs as u64, &mut s)?;
    for i in 0..n_outputs {
        if base_type == SIGHASH_SINGLE && i != n_input {
            // Blanked outputs below the signed index carry value -1.
            let empty = TxOut {
                satoshis: -1,
                lock_script: crate::script::Script(vec![]),
            };
            empty.write(&mut s)?;
        } else {
            tx.outputs[i].write(&mut s)?;
        }
    }
    // Locktime
    s.write_u32::<LittleEndian>(tx.lock_time)?;
    // Sighash type
    s.write_u32::<LittleEndian>(sighash_type as u32)?;
    Ok(sha256d(&s))
}

/// BIP143 segwit v0 sighash.
///
/// Serializes: version | hashPrevouts | hashSequence | outpoint |
/// scriptCode | amount | sequence | hashOutputs | locktime | type, then
/// double SHA256. Binding the spent amount is the defining improvement
/// over the legacy algorithm.
///
/// # Errors
/// `Error::BadArgument` if the input index is out of range.
pub fn witness_v0_sighash(
    tx: &Tx,
    n_input: usize,
    script_code: &[u8],
    satoshis: i64,
    sighash_type: u8,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument("Input index out of range".to_string()));
    }
    let mut s = Vec::with_capacity(200);
    let base_type = sighash_type & SIGHASH_BASE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    // 1. nVersion
    s.write_u32::<LittleEndian>(tx.version)?;
    // 2. hashPrevouts
    if !anyone_can_pay {
        if cache.hash_prevouts.is_none() {
            let mut prevouts = Vec::with_capacity(36 * tx.inputs.len());
            for input in &tx.inputs {
                input.prev_output.write(&mut prevouts)?;
            }
            cache.hash_prevouts = Some(Hash256(bh_sha256d::Hash::hash(&prevouts).to_byte_array()));
        }
        s.extend_from_slice(&cache.hash_prevouts.as_ref().unwrap().0);
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 3. hashSequence
    if !anyone_can_pay && base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        if cache.hash_sequence.is_none() {
            let mut sequences = Vec::with_capacity(4 * tx.inputs.len());
            for input in &tx.inputs {
                sequences.write_u32::<LittleEndian>(input.sequence)?;
            }
            cache.hash_sequence = Some(Hash256(bh_sha256d::Hash::hash(&sequences).to_byte_array()));
        }
        s.extend_from_slice(&cache.hash_sequence.as_ref().unwrap().0);
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 4. outpoint
    tx.inputs[n_input].prev_output.write(&mut s)?;
    // 5. scriptCode length + code
    var_int::write(script_code.len() as u64, &mut s)?;
    s.extend_from_slice(script_code);
    // 6. value
    s.write_i64::<LittleEndian>(satoshis)?;
    // 7. nSequence
    s.write_u32::<LittleEndian>(tx.inputs[n_input].sequence)?;
    // 8. hashOutputs
    if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        if cache.hash_outputs.is_none() {
            let mut outputs_size = 0usize;
            for out in &tx.outputs {
                outputs_size += out.size();
            }
            let mut outputs = Vec::with_capacity(outputs_size);
            for out in &tx.outputs {
                out.write(&mut outputs)?;
            }
            cache.hash_outputs = Some(Hash256(bh_sha256d::Hash::hash(&outputs).to_byte_array()));
        }
        s.extend_from_slice(&cache.hash_outputs.as_ref().unwrap().0);
    } else if base_type == SIGHASH_SINGLE && n_input < tx.outputs.len() {
        let mut single_out = Vec::with_capacity(tx.outputs[n_input].size());
        tx.outputs[n_input].write(&mut single_out)?;
        s.extend_from_slice(&bh_sha256d::Hash::hash(&single_out).to_byte_array());
    } else {
        s.extend_from_slice(&[0u8; 32]);
    }
    // 9. nLockTime
    s.write_u32::<LittleEndian>(tx.lock_time)?;
    // 10. sighash type
    s.write_u32::<LittleEndian>(sighash_type as u32)?;
    Ok(sha256d(&s))
}

/// BIP341 taproot sighash: a single tagged hash, not double SHA256.
///
/// `prevouts` must align one-to-one with the transaction inputs. `annex`
/// is the witness annex with its 0x50 prefix, if present. `ext` carries
/// the tapscript leaf commitment for script-path spends; key-path spends
/// pass `None`.
///
/// # Errors
/// - `Error::BadArgument` for index or prevout misalignment.
/// - `ScriptError::SchnorrSigHashType` for an undefined hash type or a
///   SINGLE spend without a matching output.
pub fn taproot_sighash(
    tx: &Tx,
    n_input: usize,
    prevouts: &[TxOut],
    sighash_type: u8,
    annex: Option<&[u8]>,
    ext: Option<&TapscriptExt>,
    cache: &mut SigHashCache,
) -> Result<Hash256> {
    if n_input >= tx.inputs.len() {
        return Err(Error::BadArgument("Input index out of range".to_string()));
    }
    if prevouts.len() != tx.inputs.len() {
        return Err(Error::BadArgument(
            "Previous outputs must match inputs".to_string(),
        ));
    }
    if !matches!(sighash_type, 0x00 | 0x01 | 0x02 | 0x03 | 0x81 | 0x82 | 0x83) {
        return Err(Error::Script(ScriptError::SchnorrSigHashType));
    }
    let base_type = sighash_type & SIGHASH_BASE_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let is_single = base_type == SIGHASH_SINGLE;
    let is_none = base_type == SIGHASH_NONE;
    if is_single && n_input >= tx.outputs.len() {
        return Err(Error::Script(ScriptError::SchnorrSigHashType));
    }

    let mut msg = Vec::with_capacity(256);
    // Epoch and hash type
    msg.push(0u8);
    msg.push(sighash_type);
    // Transaction-wide commitments
    msg.write_u32::<LittleEndian>(tx.version)?;
    msg.write_u32::<LittleEndian>(tx.lock_time)?;
    if !anyone_can_pay {
        if cache.sha_prevouts.is_none() {
            let mut data = Vec::with_capacity(36 * tx.inputs.len());
            for input in &tx.inputs {
                input.prev_output.write(&mut data)?;
            }
            cache.sha_prevouts = Some(bh_sha256::Hash::hash(&data).to_byte_array());
        }
        msg.extend_from_slice(cache.sha_prevouts.as_ref().unwrap());

        if cache.sha_amounts.is_none() {
            let mut data = Vec::with_capacity(8 * prevouts.len());
            for prevout in prevouts {
                data.write_i64::<LittleEndian>(prevout.satoshis)?;
            }
            cache.sha_amounts = Some(bh_sha256::Hash::hash(&data).to_byte_array());
        }
        msg.extend_from_slice(cache.sha_amounts.as_ref().unwrap());

        if cache.sha_script_pubkeys.is_none() {
            let mut data = Vec::new();
            for prevout in prevouts {
                var_int::write(prevout.lock_script.0.len() as u64, &mut data)?;
                data.extend_from_slice(&prevout.lock_script.0);
            }
            cache.sha_script_pubkeys = Some(bh_sha256::Hash::hash(&data).to_byte_array());
        }
        msg.extend_from_slice(cache.sha_script_pubkeys.as_ref().unwrap());

        if cache.sha_sequences.is_none() {
            let mut data = Vec::with_capacity(4 * tx.inputs.len());
            for input in &tx.inputs {
                data.write_u32::<LittleEndian>(input.sequence)?;
            }
            cache.sha_sequences = Some(bh_sha256::Hash::hash(&data).to_byte_array());
        }
        msg.extend_from_slice(cache.sha_sequences.as_ref().unwrap());
    }
    if !is_none && !is_single {
        if cache.sha_outputs.is_none() {
            let mut data = Vec::new();
            for output in &tx.outputs {
                output.write(&mut data)?;
            }
            cache.sha_outputs = Some(bh_sha256::Hash::hash(&data).to_byte_array());
        }
        msg.extend_from_slice(cache.sha_outputs.as_ref().unwrap());
    }
    // Data about this input
    let ext_flag: u8 = if ext.is_some() { 1 } else { 0 };
    let spend_type = ext_flag * 2 + if annex.is_some() { 1 } else { 0 };
    msg.push(spend_type);
    if anyone_can_pay {
        tx.inputs[n_input].prev_output.write(&mut msg)?;
        msg.write_i64::<LittleEndian>(prevouts[n_input].satoshis)?;
        var_int::write(prevouts[n_input].lock_script.0.len() as u64, &mut msg)?;
        msg.extend_from_slice(&prevouts[n_input].lock_script.0);
        msg.write_u32::<LittleEndian>(tx.inputs[n_input].sequence)?;
    } else {
        msg.write_u32::<LittleEndian>(n_input as u32)?;
    }
    if let Some(annex) = annex {
        // Committed with its compact-size length prefix, 0x50 included.
        let mut data = Vec::with_capacity(var_int::size(annex.len() as u64) + annex.len());
        var_int::write(annex.len() as u64, &mut data)?;
        data.extend_from_slice(annex);
        msg.extend_from_slice(&bh_sha256::Hash::hash(&data).to_byte_array());
    }
    // Data about this output
    if is_single {
        let mut data = Vec::with_capacity(tx.outputs[n_input].size());
        tx.outputs[n_input].write(&mut data)?;
        msg.extend_from_slice(&bh_sha256::Hash::hash(&data).to_byte_array());
    }
    // Tapscript extension
    if let Some(ext) = ext {
        msg.extend_from_slice(&ext.leaf_hash);
        msg.push(TAPSCRIPT_KEY_VERSION);
        msg.write_u32::<LittleEndian>(ext.codesep_pos)?;
    }
    Ok(Hash256(crate::script::taproot::tagged_hash(
        "TapSighash",
        &msg,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::transaction::{OutPoint, TxIn};
    use crate::util::Serializable;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn legacy_sighash_test() -> Result<()> {
        let lock_script = hex::decode("76a914d951eb562f1ff26b6cbe89f04eda365ea6bd95ce88ac")?;
        let tx = Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256::decode(
                        "bf6c1139ea01ca054b8d00aa0a088daaeab4f3b8e111626c6be7d603a9dd8dff",
                    )?,
                    index: 0,
                },
                unlock_script: Script(vec![]),
                sequence: 0xffffffff,
                witness: Vec::new(),
            }],
            outputs: vec![TxOut {
                satoshis: 49990000,
                lock_script: Script(hex::decode(
                    "76a9147865b0b301119fc3eadc7f3406ff1339908e46d488ac",
                )?),
            }],
            lock_time: 0,
        };
        let sighash = legacy_sighash(&tx, 0, &lock_script, SIGHASH_ALL)?;
        let expected = "ad16084eccf26464a84c5ee2f8b96b4daff9a3154ac3c1b320346aed042abe57";
        assert_eq!(hex::encode(sighash.0), expected);
        Ok(())
    }

    #[test]
    fn legacy_single_bug() -> Result<()> {
        // Input index beyond the outputs signs the constant digest 1.
        let tx = Tx {
            version: 1,
            inputs: vec![
                TxIn::default(),
                TxIn {
                    prev_output: OutPoint {
                        hash: Hash256([1; 32]),
                        index: 1,
                    },
                    ..Default::default()
                },
            ],
            outputs: vec![TxOut {
                satoshis: 1,
                lock_script: Script(vec![0x51]),
            }],
            lock_time: 0,
        };
        let sighash = legacy_sighash(&tx, 1, &[0x51], SIGHASH_SINGLE)?;
        let mut one = [0u8; 32];
        one[0] = 1;
        assert_eq!(sighash.0, one);
        Ok(())
    }

    #[test]
    fn bip143_p2wpkh_vector() -> Result<()> {
        // Native P2WPKH example from BIP143: the second input signs with
        // SIGHASH_ALL over an amount of 6 BTC.
        let raw = hex::decode(
            "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f\
             0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57\
             b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85\
             c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2\
             f0167faa815988ac11000000",
        )?;
        let tx = Tx::read(&mut Cursor::new(&raw))?;
        assert_eq!(tx.inputs.len(), 2);
        let script_code = hex::decode("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac")?;
        let mut cache = SigHashCache::new();
        let sighash = witness_v0_sighash(&tx, 1, &script_code, 600_000_000, SIGHASH_ALL, &mut cache)?;
        let expected = "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670";
        assert_eq!(hex::encode(sighash.0), expected);
        assert!(cache.hash_prevouts.is_some());
        assert!(cache.hash_sequence.is_some());
        assert!(cache.hash_outputs.is_some());
        Ok(())
    }

    fn taproot_fixture() -> (Tx, Vec<TxOut>) {
        let tx = Tx {
            version: 2,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256([0xaa; 32]),
                    index: 0,
                },
                unlock_script: Script(vec![]),
                sequence: 0xfffffffd,
                witness: Vec::new(),
            }],
            outputs: vec![TxOut {
                satoshis: 90_000,
                lock_script: Script(vec![0x51]),
            }],
            lock_time: 0,
        };
        let mut prevout_script = Script::new();
        prevout_script.append(crate::script::op_codes::OP_1);
        prevout_script.append_data(&[0x55; 32]).unwrap();
        let prevouts = vec![TxOut {
            satoshis: 100_000,
            lock_script: prevout_script,
        }];
        (tx, prevouts)
    }

    #[test]
    fn taproot_sighash_distinguishes_inputs() -> Result<()> {
        let (tx, prevouts) = taproot_fixture();
        let mut cache = SigHashCache::new();
        let default = taproot_sighash(&tx, 0, &prevouts, SIGHASH_DEFAULT, None, None, &mut cache)?;
        let all = taproot_sighash(&tx, 0, &prevouts, SIGHASH_ALL, None, None, &mut cache)?;
        // Default commits like ALL but with a different type byte, so the
        // digests differ.
        assert_ne!(default, all);

        let annexed = taproot_sighash(
            &tx,
            0,
            &prevouts,
            SIGHASH_DEFAULT,
            Some(&[0x50, 1, 2]),
            None,
            &mut cache,
        )?;
        assert_ne!(default, annexed);

        let ext = TapscriptExt {
            leaf_hash: [7; 32],
            codesep_pos: 0xffffffff,
        };
        let script_path = taproot_sighash(
            &tx,
            0,
            &prevouts,
            SIGHASH_DEFAULT,
            None,
            Some(&ext),
            &mut cache,
        )?;
        assert_ne!(default, script_path);
        Ok(())
    }

    #[test]
    fn taproot_sighash_rejects_bad_types() {
        let (tx, prevouts) = taproot_fixture();
        let mut cache = SigHashCache::new();
        for ty in [0x04u8, 0x10, 0x40, 0x84, 0xff] {
            assert!(
                taproot_sighash(&tx, 0, &prevouts, ty, None, None, &mut cache).is_err(),
                "type {:#x} accepted",
                ty
            );
        }
        // SINGLE with no matching output is rejected, unlike legacy.
        let mut no_outputs = tx.clone();
        no_outputs.outputs.clear();
        let single = taproot_sighash(
            &no_outputs,
            0,
            &prevouts,
            SIGHASH_SINGLE,
            None,
            None,
            &mut cache,
        );
        assert!(single.is_err());
    }

    #[test]
    fn taproot_sighash_requires_aligned_prevouts() {
        let (tx, _) = taproot_fixture();
        let mut cache = SigHashCache::new();
        assert!(taproot_sighash(&tx, 0, &[], SIGHASH_DEFAULT, None, None, &mut cache).is_err());
        assert!(taproot_sighash(&tx, 9, &[], SIGHASH_DEFAULT, None, None, &mut cache).is_err());
    }
}
