//! Bitcoin transaction.

use crate::transaction::{TxIn, TxOut};
use crate::util::{Error, Hash256, Result, Serializable, sha256d, var_int};
use std::io;
use std::io::{Read, Write};

/// Sanity bound on a single serialized witness element, derived from the
/// block weight limit.
const MAX_WITNESS_ELEMENT_LEN: usize = 4_000_000;

/// Segwit serialization marker byte.
const SEGWIT_MARKER: u8 = 0x00;
/// Segwit serialization flag byte.
const SEGWIT_FLAG: u8 = 0x01;

/// Bitcoin transaction.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct Tx {
    /// Transaction version.
    pub version: u32,
    /// Transaction inputs.
    pub inputs: Vec<TxIn>,
    /// Transaction outputs.
    pub outputs: Vec<TxOut>,
    /// The block number or timestamp at which this transaction is unlocked.
    pub lock_time: u32,
}

impl Tx {
    /// True when any input carries witness data.
    #[must_use]
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Calculates the hash of the transaction (txid). Witness data is
    /// excluded, so the txid is stable under witness malleation.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        let mut b = Vec::with_capacity(self.size());
        self.write_no_witness(&mut b).unwrap();
        sha256d(&b)
    }

    /// Returns the full serialized size of the transaction in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut size = 4 + 4;
        size += var_int::size(self.inputs.len() as u64);
        for input in &self.inputs {
            size += input.size();
        }
        size += var_int::size(self.outputs.len() as u64);
        for output in &self.outputs {
            size += output.size();
        }
        if self.has_witness() {
            size += 2;
            for input in &self.inputs {
                size += var_int::size(input.witness.len() as u64);
                for item in &input.witness {
                    size += var_int::size(item.len() as u64) + item.len();
                }
            }
        }
        size
    }

    /// Serializes in the legacy layout regardless of witness data.
    pub(crate) fn write_no_witness(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.version.to_le_bytes())?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for input in &self.inputs {
            input.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for output in &self.outputs {
            output.write(writer)?;
        }
        writer.write_all(&self.lock_time.to_le_bytes())
    }
}

impl Serializable<Tx> for Tx {
    fn read(reader: &mut dyn Read) -> Result<Tx> {
        let mut version = [0u8; 4];
        reader.read_exact(&mut version).map_err(Error::IOError)?;
        let version = u32::from_le_bytes(version);

        let mut n_inputs = var_int::read(reader)?;
        let mut segwit = false;
        if n_inputs == SEGWIT_MARKER as u64 {
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag).map_err(Error::IOError)?;
            if flag[0] != SEGWIT_FLAG {
                return Err(Error::BadData(format!("Bad segwit flag: {}", flag[0])));
            }
            segwit = true;
            n_inputs = var_int::read(reader)?;
        }

        let mut inputs = Vec::with_capacity(n_inputs.min(1024) as usize);
        for _ in 0..n_inputs {
            inputs.push(TxIn::read(reader)?);
        }

        let n_outputs = var_int::read(reader)?;
        let mut outputs = Vec::with_capacity(n_outputs.min(1024) as usize);
        for _ in 0..n_outputs {
            outputs.push(TxOut::read(reader)?);
        }

        if segwit {
            for input in &mut inputs {
                let n_items = var_int::read(reader)?;
                let mut witness = Vec::with_capacity(n_items.min(1024) as usize);
                for _ in 0..n_items {
                    let len = var_int::read(reader)? as usize;
                    if len > MAX_WITNESS_ELEMENT_LEN {
                        return Err(Error::BadData(format!(
                            "Witness element too long: {}",
                            len
                        )));
                    }
                    let mut item = vec![0; len];
                    reader.read_exact(&mut item).map_err(Error::IOError)?;
                    witness.push(item);
                }
                input.witness = witness;
            }
        }

        let mut lock_time = [0u8; 4];
        reader.read_exact(&mut lock_time).map_err(Error::IOError)?;
        let lock_time = u32::from_le_bytes(lock_time);

        Ok(Tx {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        if !self.has_witness() {
            return self.write_no_witness(writer);
        }
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[SEGWIT_MARKER, SEGWIT_FLAG])?;
        var_int::write(self.inputs.len() as u64, writer)?;
        for input in &self.inputs {
            input.write(writer)?;
        }
        var_int::write(self.outputs.len() as u64, writer)?;
        for output in &self.outputs {
            output.write(writer)?;
        }
        for input in &self.inputs {
            var_int::write(input.witness.len() as u64, writer)?;
            for item in &input.witness {
                var_int::write(item.len() as u64, writer)?;
                writer.write_all(item)?;
            }
        }
        writer.write_all(&self.lock_time.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::transaction::OutPoint;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn sample_tx() -> Tx {
        Tx {
            version: 2,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    hash: Hash256([4; 32]),
                    index: 3,
                },
                unlock_script: Script(vec![5; 10]),
                sequence: 0xfffffffe,
                witness: Vec::new(),
            }],
            outputs: vec![TxOut {
                satoshis: 42,
                lock_script: Script(vec![9; 4]),
            }],
            lock_time: 100,
        }
    }

    #[test]
    fn write_read_legacy() {
        let tx = sample_tx();
        let mut v = Vec::new();
        tx.write(&mut v).unwrap();
        assert_eq!(v.len(), tx.size());
        assert_eq!(Tx::read(&mut Cursor::new(&v)).unwrap(), tx);
    }

    #[test]
    fn write_read_segwit() {
        let mut tx = sample_tx();
        tx.inputs[0].witness = vec![vec![1, 2, 3], vec![], vec![7; 70]];
        let mut v = Vec::new();
        tx.write(&mut v).unwrap();
        assert_eq!(v.len(), tx.size());
        assert_eq!(&v[4..6], &[SEGWIT_MARKER, SEGWIT_FLAG]);
        assert_eq!(Tx::read(&mut Cursor::new(&v)).unwrap(), tx);
    }

    #[test]
    fn txid_ignores_witness() {
        let legacy = sample_tx();
        let mut segwit = sample_tx();
        segwit.inputs[0].witness = vec![vec![0xaa; 64]];
        assert_eq!(legacy.hash(), segwit.hash());
    }

    #[test]
    fn bad_segwit_flag() {
        let mut v = Vec::new();
        v.extend_from_slice(&1u32.to_le_bytes());
        v.push(0x00);
        v.push(0x02);
        assert!(Tx::read(&mut Cursor::new(&v)).is_err());
    }
}
