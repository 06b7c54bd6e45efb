//! Rebuilding a memory image from a list of read transactions.
//!
//! Both the i2c and spiflash parsers produce the same thing: an ordered
//! list of (address, data) reads pulled off the bus. The image is sized to
//! the highest address any read touches, filled with 0xff (erased flash /
//! eeprom convention), and then each read is laid on top in log order, so
//! a later read of the same range wins.

use thiserror::Error;

/// value for bytes no transaction covered
pub const FILL: u8 = 0xff;

/// refuse to allocate images past this (largest commodity SPI NOR part).
/// spiflash addresses come straight from the log, so a bogus line could
/// otherwise ask for terabytes.
pub const MAX_IMAGE_LEN: u64 = 256 * 1024 * 1024;

/// one read pulled off the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("transaction range 0x{addr:x}+{len} overflows")]
    AddressRange { addr: u64, len: usize },
    #[error("image of {size} bytes is over the {MAX_IMAGE_LEN} byte limit")]
    TooLarge { size: u64 },
}

#[derive(Debug)]
pub struct Image {
    pub bytes: Vec<u8>,
    /// 0xff where at least one transaction wrote the byte, 0x00 otherwise
    pub mask: Option<Vec<u8>>,
}

impl Image {
    pub fn assemble(txns: Vec<Transaction>) -> Result<Self, ImageError> {
        Self::build(txns, false)
    }

    pub fn assemble_with_mask(txns: Vec<Transaction>) -> Result<Self, ImageError> {
        Self::build(txns, true)
    }

    fn build(txns: Vec<Transaction>, with_mask: bool) -> Result<Self, ImageError> {
        let mut size: u64 = 0;
        for txn in &txns {
            let end = txn
                .addr
                .checked_add(txn.data.len() as u64)
                .ok_or(ImageError::AddressRange {
                    addr: txn.addr,
                    len: txn.data.len(),
                })?;
            size = size.max(end);
        }

        if size > MAX_IMAGE_LEN {
            return Err(ImageError::TooLarge { size });
        }
        let size = size as usize;

        let mut bytes = vec![FILL; size];
        let mut mask = with_mask.then(|| vec![0u8; size]);

        for txn in &txns {
            let start = txn.addr as usize;
            let end = start + txn.data.len();
            bytes[start..end].copy_from_slice(&txn.data);
            if let Some(mask) = mask.as_mut() {
                mask[start..end].fill(0xff);
            }
        }

        Ok(Self { bytes, mask })
    }
}
