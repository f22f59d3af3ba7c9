//! LOB values
//!
//! A [`Lob`] is a live reference to a CLOB, NCLOB, BLOB or BFILE held by the
//! native client. Object attributes and collection elements of LOB type are
//! fetched as [`Lob`] values; byte sequences stored into a LOB slot are
//! written into a fresh temporary LOB first.

use bytes::Bytes;

use crate::constants::OracleType;
use crate::error::{Error, Result};
use crate::handle::LobRef;
use crate::native::LobHandle;

/// Live reference to a native LOB
#[derive(Debug)]
pub struct Lob {
    handle: LobRef,
    oracle_type: OracleType,
}

impl Lob {
    pub(crate) fn new(handle: LobRef, oracle_type: OracleType) -> Self {
        Self {
            handle,
            oracle_type,
        }
    }

    /// LOB type (CLOB, NCLOB, BLOB or BFILE)
    pub fn oracle_type(&self) -> OracleType {
        self.oracle_type
    }

    /// Native handle
    pub fn handle(&self) -> LobHandle {
        self.handle.handle()
    }

    /// Check if this LOB holds character data
    pub fn is_character(&self) -> bool {
        matches!(self.oracle_type, OracleType::Clob | OracleType::Nclob)
    }

    /// Size of the content in bytes
    pub fn size(&self) -> Result<u64> {
        self.handle
            .client()
            .lob_size(self.handle())
            .map_err(|e| Error::native(format!("size of {}", self.oracle_type), e))
    }

    /// Read the whole content
    pub fn read_all(&self) -> Result<Bytes> {
        self.handle
            .client()
            .lob_read_all(self.handle())
            .map_err(|e| Error::native(format!("read {}", self.oracle_type), e))
    }

    /// Read the whole content as UTF-8 text
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read_all()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::conversion(format!("{} is not valid UTF-8: {}", self.oracle_type, e)))
    }

    /// Write at a byte offset, extending the content as needed
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.oracle_type == OracleType::Bfile {
            return Err(Error::conversion("BFILE values are read-only"));
        }
        self.handle
            .client()
            .lob_write(self.handle(), offset, data)
            .map_err(|e| Error::native(format!("write {} at {}", self.oracle_type, offset), e))
    }

    /// Replace the whole content
    pub fn set_from_bytes(&self, data: &[u8]) -> Result<()> {
        self.handle
            .client()
            .lob_set_from_bytes(self.handle(), data)
            .map_err(|e| Error::native(format!("set {} from bytes", self.oracle_type), e))
    }

    /// Another reference to the same LOB
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self::new(self.handle.try_clone()?, self.oracle_type))
    }

    /// Release the reference now, reporting failure
    pub fn close(self) -> Result<()> {
        self.handle.release()
    }
}
