//! Transaction output.

use crate::script::{MAX_SCRIPT_SIZE, Script};
use crate::util::{Error, Result, Serializable, var_int};
use std::io;
use std::io::{Read, Write};

/// Maximum number of satoshis possible (21M BTC).
pub const MAX_SATOSHIS: i64 = 21_000_000 * 100_000_000;

/// Transaction output.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone)]
pub struct TxOut {
    /// Number of satoshis locked in this output.
    pub satoshis: i64,
    /// Public key script that must be satisfied to spend.
    pub lock_script: Script,
}

impl TxOut {
    /// Returns the size of the output in bytes.
    #[must_use]
    #[inline]
    pub fn size(&self) -> usize {
        8 + var_int::size(self.lock_script.0.len() as u64) + self.lock_script.0.len()
    }

    /// Validates the output's value range and script size.
    ///
    /// # Errors
    /// `Error::BadData` for negative or excessive satoshis, or an oversized
    /// lock script.
    pub fn validate(&self) -> Result<()> {
        if self.satoshis < 0 {
            return Err(Error::BadData("Negative satoshis".to_string()));
        }
        if self.satoshis > MAX_SATOSHIS {
            return Err(Error::BadData("Satoshis exceeds max".to_string()));
        }
        if self.lock_script.0.len() > MAX_SCRIPT_SIZE {
            return Err(Error::BadData(format!(
                "Lock script too long: {}",
                self.lock_script.0.len()
            )));
        }
        Ok(())
    }
}

impl Serializable<TxOut> for TxOut {
    fn read(reader: &mut dyn Read) -> Result<TxOut> {
        let mut satoshis = [0u8; 8];
        reader.read_exact(&mut satoshis).map_err(Error::IOError)?;
        let satoshis = i64::from_le_bytes(satoshis);
        let script_len = var_int::read(reader)? as usize;
        if script_len > MAX_SCRIPT_SIZE {
            return Err(Error::BadData(format!(
                "Lock script too long: {}",
                script_len
            )));
        }
        let mut lock_script = vec![0; script_len];
        reader.read_exact(&mut lock_script).map_err(Error::IOError)?;
        Ok(TxOut {
            satoshis,
            lock_script: Script(lock_script),
        })
    }

    fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.satoshis.to_le_bytes())?;
        var_int::write(self.lock_script.0.len() as u64, writer)?;
        writer.write_all(&self.lock_script.0)?;
        Ok(())
    }
}
