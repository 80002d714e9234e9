//! Transaction input.
use crate::script::{MAX_SCRIPT_SIZE, Script};
use crate::transaction::out_point::OutPoint;
use crate::util::{Error, Result, Serializable, var_int};
use std::io;
use std::io::{Read, Write};

/// Transaction input.
///
/// The witness is carried here but serialized at the transaction level
/// (BIP144); `read`/`write` on a single input cover the legacy fields only.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct TxIn {
    /// The previous output being spent.
    pub prev_output: OutPoint,
    /// Script proving authorization to spend the previous output.
    pub unlock_script: Script,
    /// Sequence number for relative locktime and replacement signaling.
    pub sequence: u32,
    /// Segregated witness stack, possibly empty.
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    /// Returns the size of the input's legacy serialization in bytes.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        OutPoint::SIZE
            + var_int::size(self.unlock_script.0.len() as u64)
            + self.unlock_script.0.len()
            + 4
    }
}

impl Serializable<TxIn> for TxIn {
    fn read(reader: &mut dyn Read) -> Result<TxIn> {
        let prev_output = OutPoint::read(reader)?;
        let script_len = var_int::read(reader)? as usize;
        if script_len > MAX_SCRIPT_SIZE {
            return Err(Error::BadData(format!(
                "Unlock script too long: {}",
                script_len
            )));
        }
        let mut unlock_script = vec![0; script_len];
        reader.read_exact(&mut unlock_script).map_err(Error::IOError)?;
        let mut sequence = [0u8; 4];
        reader.read_exact(&mut sequence).map_err(Error::IOError)?;
        let sequence = u32::from_le_bytes(sequence);
        Ok(TxIn {
            prev_output,
            unlock_script: Script(unlock_script),
            sequence,
            witness: Vec::new(),
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.prev_output.write(writer)?;
        var_int::write(self.unlock_script.0.len() as u64, writer)?;
        writer.write_all(&self.unlock_script.0)?;
        writer.write_all(&self.sequence.to_le_bytes())?;
        Ok(())
    }
}
