//! MODBUS RTU constants

/// Server address + function code + 2 bytes CRC
pub const MIN_ADU_SIZE: usize = 4;
/// Maximum PDU payload length (256-byte ADU minus address, function code and CRC)
pub const MAX_DATA_SIZE: usize = 252;
/// ADU bytes around the PDU payload: address + function code head, CRC tail
pub const ADU_OVERHEAD: usize = 4;

pub const BROADCAST_ADDRESS: u8 = 0;

/// Function-code bit marking an exception response
pub const EXCEPTION_BIT: u8 = 0x80;

// WriteSingleCoil wire values
pub const COIL_ON: u16 = 0xff00;
pub const COIL_OFF: u16 = 0x0000;

/// Registers per WriteMultipleRegisters request/echo
pub const MAX_WRITE_REGISTER_COUNT: u16 = 123;

/// Communication event log depth (GetCommEventLog returns at most 64 events)
pub const EVENT_LOG_SIZE: usize = 64;

// Vendor-specific poll codes that never bump the CommEvent counter
pub const POLL_484: u8 = 0x0a;
pub const POLL_CONTROLLER: u8 = 0x0e;
