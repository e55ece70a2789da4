//! RTU application data unit framing.
//!
//! An RTU ADU is one server address byte, the PDU bytes and a trailing
//! CRC-16 stored low byte first. Unwrapping performs no validation: the
//! server state machine owns the accept/reject decisions because each
//! failure reason feeds a different diagnostic counter. This module is also
//! the seam where an ASCII or TCP framing variant would plug in.

use crate::calc_crc16;
use crate::consts::{MAX_DATA_SIZE, MIN_ADU_SIZE};
use crate::pdu::Pdu;
use crate::{ErrorKind, VectorTrait};

/// Borrowed view over one raw frame chunk.
///
/// Accessors degrade to empty/zero values on chunks shorter than
/// [`MIN_ADU_SIZE`]; callers decide what to do with such frames before
/// trusting anything beyond `raw_size`.
#[derive(Debug, Clone, Copy)]
pub struct SerialAdu<'a> {
    raw: &'a [u8],
}

impl<'a> SerialAdu<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &[u8] {
        self.raw
    }

    pub fn raw_size(&self) -> usize {
        self.raw.len()
    }

    pub fn server_address(&self) -> u8 {
        self.raw.first().copied().unwrap_or(0)
    }

    /// PDU bytes: everything between the address byte and the CRC.
    pub fn pdu_bytes(&self) -> &[u8] {
        if self.raw.len() < MIN_ADU_SIZE {
            return &[];
        }
        &self.raw[1..self.raw.len() - 2]
    }

    pub fn pdu(&self) -> Pdu {
        Pdu::from_wire(self.pdu_bytes())
    }

    /// Trailing checksum, low byte first.
    pub fn checksum(&self) -> u16 {
        if self.raw.len() < 2 {
            return 0;
        }
        u16::from_le_bytes([self.raw[self.raw.len() - 2], self.raw[self.raw.len() - 1]])
    }

    /// Recomputes the CRC over address + PDU bytes and compares it to the
    /// trailing checksum.
    pub fn matching_checksum(&self) -> bool {
        if self.raw.len() < MIN_ADU_SIZE {
            return false;
        }
        calc_crc16(&self.raw[..self.raw.len() - 2]) == self.checksum()
    }
}

/// Validates a complete frame and extracts its PDU.
///
/// Client-side convenience for response frames: the server state machine
/// does not use this because its reject branches need to tell the failure
/// reasons apart.
pub fn parse_frame(raw: &[u8]) -> Result<Pdu, ErrorKind> {
    if raw.len() < MIN_ADU_SIZE {
        return Err(ErrorKind::FrameBroken);
    }
    let adu = SerialAdu::new(raw);
    if !adu.matching_checksum() {
        return Err(ErrorKind::FrameCRCError);
    }
    Ok(adu.pdu())
}

/// Wraps `pdu` into a complete RTU frame for `server_address`.
///
/// `frame` is cleared first; on success it holds address byte + PDU bytes +
/// CRC low byte first.
pub fn create<V: VectorTrait<u8>>(
    server_address: u8,
    pdu: &Pdu,
    frame: &mut V,
) -> Result<(), ErrorKind> {
    if pdu.data_size() > MAX_DATA_SIZE {
        return Err(ErrorKind::OOB);
    }
    frame.clear();
    frame.push(server_address)?;
    pdu.encode_into(frame)?;
    let crc = calc_crc16(frame.as_slice());
    frame.extend(&crc.to_le_bytes())
}
