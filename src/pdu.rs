//! Protocol data units and the per-function-code size tables.
//!
//! A PDU is a function code plus an opaque payload of 0-252 bytes. All
//! structural validation is expressed as predicates or `Option` results so
//! that the server state machine and the response decoder can map each
//! failure to its own counter/event side effect.

use crate::consts::{EXCEPTION_BIT, MAX_DATA_SIZE};
use crate::{ErrorKind, VectorTrait};

/// Modbus public function codes.
///
/// `Custom` is the single extension arm for vendor and future codes; the
/// crate itself never gives those a framing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FunctionCode {
    Invalid,
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    ReadExceptionStatus,
    Diagnostics,
    GetCommEventCounter,
    GetCommEventLog,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    ReportServerId,
    ReadFileRecord,
    WriteFileRecord,
    MaskWriteRegister,
    ReadWriteMultipleRegisters,
    ReadFifoQueue,
    EncapsulatedInterfaceTransport,
    Custom(u8),
}

impl FunctionCode {
    pub fn new(code: u8) -> Self {
        match code {
            0x00 => FunctionCode::Invalid,
            0x01 => FunctionCode::ReadCoils,
            0x02 => FunctionCode::ReadDiscreteInputs,
            0x03 => FunctionCode::ReadHoldingRegisters,
            0x04 => FunctionCode::ReadInputRegisters,
            0x05 => FunctionCode::WriteSingleCoil,
            0x06 => FunctionCode::WriteSingleRegister,
            0x07 => FunctionCode::ReadExceptionStatus,
            0x08 => FunctionCode::Diagnostics,
            0x0b => FunctionCode::GetCommEventCounter,
            0x0c => FunctionCode::GetCommEventLog,
            0x0f => FunctionCode::WriteMultipleCoils,
            0x10 => FunctionCode::WriteMultipleRegisters,
            0x11 => FunctionCode::ReportServerId,
            0x14 => FunctionCode::ReadFileRecord,
            0x15 => FunctionCode::WriteFileRecord,
            0x16 => FunctionCode::MaskWriteRegister,
            0x17 => FunctionCode::ReadWriteMultipleRegisters,
            0x18 => FunctionCode::ReadFifoQueue,
            0x2b => FunctionCode::EncapsulatedInterfaceTransport,
            other => FunctionCode::Custom(other),
        }
    }

    pub fn value(self) -> u8 {
        match self {
            FunctionCode::Invalid => 0x00,
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteSingleCoil => 0x05,
            FunctionCode::WriteSingleRegister => 0x06,
            FunctionCode::ReadExceptionStatus => 0x07,
            FunctionCode::Diagnostics => 0x08,
            FunctionCode::GetCommEventCounter => 0x0b,
            FunctionCode::GetCommEventLog => 0x0c,
            FunctionCode::WriteMultipleCoils => 0x0f,
            FunctionCode::WriteMultipleRegisters => 0x10,
            FunctionCode::ReportServerId => 0x11,
            FunctionCode::ReadFileRecord => 0x14,
            FunctionCode::WriteFileRecord => 0x15,
            FunctionCode::MaskWriteRegister => 0x16,
            FunctionCode::ReadWriteMultipleRegisters => 0x17,
            FunctionCode::ReadFifoQueue => 0x18,
            FunctionCode::EncapsulatedInterfaceTransport => 0x2b,
            FunctionCode::Custom(code) => code,
        }
    }
}

/// Modbus exception codes carried in the first payload byte of an
/// exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    NegativeAcknowledge,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetNoResponse,
    /// Placeholder for codes outside the public set, also the "no protocol
    /// error recorded" default on a pending reply
    ExtendedException,
}

impl ExceptionCode {
    pub fn new(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::ServerDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::ServerDeviceBusy,
            0x07 => ExceptionCode::NegativeAcknowledge,
            0x08 => ExceptionCode::MemoryParityError,
            0x0a => ExceptionCode::GatewayPathUnavailable,
            0x0b => ExceptionCode::GatewayTargetNoResponse,
            _ => ExceptionCode::ExtendedException,
        }
    }

    pub fn value(self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::NegativeAcknowledge => 0x07,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0a,
            ExceptionCode::GatewayTargetNoResponse => 0x0b,
            ExceptionCode::ExtendedException => 0xff,
        }
    }
}

/// Function code + opaque payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pdu {
    function: u8,
    data: Vec<u8>,
}

/// A PDU travelling master-to-server. Size rules come from the request
/// tables below.
pub type Request = Pdu;
/// A PDU travelling server-to-master. Size rules come from the response
/// tables below.
pub type Response = Pdu;

impl Pdu {
    pub fn new(code: FunctionCode, data: &[u8]) -> Self {
        Self {
            function: code.value(),
            data: data.to_vec(),
        }
    }

    /// Reconstructs a PDU from wire bytes (function code first). An empty
    /// slice yields the invalid PDU.
    pub fn from_wire(bytes: &[u8]) -> Self {
        match bytes.split_first() {
            Some((function, data)) => Self {
                function: *function,
                data: data.to_vec(),
            },
            None => Self::invalid(),
        }
    }

    /// Exception response for `code`: function code with the top bit set,
    /// exception code as the single payload byte.
    pub fn exception(code: FunctionCode, exception: ExceptionCode) -> Self {
        Self {
            function: code.value() | EXCEPTION_BIT,
            data: vec![exception.value()],
        }
    }

    /// The "no reply" marker a request handler returns when it decides to
    /// stay silent.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Function code byte as seen on the wire, exception bit included.
    pub fn raw_function(&self) -> u8 {
        self.function
    }

    pub fn function_code(&self) -> FunctionCode {
        FunctionCode::new(self.function)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn is_valid(&self) -> bool {
        self.function != 0 && self.data.len() <= MAX_DATA_SIZE
    }

    pub fn is_exception(&self) -> bool {
        self.function & EXCEPTION_BIT != 0
    }

    /// First payload byte; meaningful only when `is_exception()`.
    pub fn exception_code(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    /// Appends the wire form (function code, then payload) to `out`.
    pub fn encode_into<V: VectorTrait<u8>>(&self, out: &mut V) -> Result<(), ErrorKind> {
        if self.data.len() > MAX_DATA_SIZE {
            return Err(ErrorKind::OOB);
        }
        out.push(self.function)?;
        out.extend(&self.data)
    }
}

/// Minimum payload size of a well-formed request, `None` for codes without
/// a known framing.
pub fn request_minimum_size(code: FunctionCode) -> Option<usize> {
    match code {
        FunctionCode::ReadCoils
        | FunctionCode::ReadDiscreteInputs
        | FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters
        | FunctionCode::WriteSingleCoil
        | FunctionCode::WriteSingleRegister
        | FunctionCode::Diagnostics => Some(4),
        FunctionCode::ReadExceptionStatus
        | FunctionCode::GetCommEventCounter
        | FunctionCode::GetCommEventLog
        | FunctionCode::ReportServerId => Some(0),
        FunctionCode::WriteMultipleCoils => Some(6),
        FunctionCode::WriteMultipleRegisters => Some(7),
        FunctionCode::ReadFileRecord => Some(8),
        FunctionCode::WriteFileRecord => Some(10),
        FunctionCode::MaskWriteRegister => Some(6),
        FunctionCode::ReadWriteMultipleRegisters => Some(11),
        FunctionCode::ReadFifoQueue => Some(2),
        FunctionCode::EncapsulatedInterfaceTransport => Some(2),
        FunctionCode::Invalid | FunctionCode::Custom(_) => None,
    }
}

/// Minimum payload size of a well-formed response, `None` for codes without
/// a known framing.
pub fn response_minimum_size(code: FunctionCode) -> Option<usize> {
    match code {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => Some(2),
        FunctionCode::ReadHoldingRegisters
        | FunctionCode::ReadInputRegisters
        | FunctionCode::ReportServerId
        | FunctionCode::ReadWriteMultipleRegisters => Some(3),
        FunctionCode::WriteSingleCoil
        | FunctionCode::WriteSingleRegister
        | FunctionCode::Diagnostics
        | FunctionCode::GetCommEventCounter
        | FunctionCode::WriteMultipleCoils
        | FunctionCode::WriteMultipleRegisters => Some(4),
        FunctionCode::ReadExceptionStatus => Some(1),
        FunctionCode::GetCommEventLog => Some(8),
        FunctionCode::ReadFileRecord => Some(5),
        FunctionCode::WriteFileRecord => Some(10),
        FunctionCode::MaskWriteRegister => Some(6),
        FunctionCode::ReadFifoQueue => Some(6),
        FunctionCode::EncapsulatedInterfaceTransport
        | FunctionCode::Invalid
        | FunctionCode::Custom(_) => None,
    }
}

/// Full payload size a request's own fields imply.
///
/// For byte-count-prefixed codes the count byte sits at a fixed structural
/// offset; a payload too short to hold even that byte (or a code with no
/// known framing, exception-bit codes included) yields `None`, which the
/// server treats as malformed.
pub fn request_data_size(request: &Request) -> Option<usize> {
    let data = request.data();
    match request.function_code() {
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            // address (2) + quantity (2) + byte count (1) + payload
            data.get(4).map(|count| 5 + *count as usize)
        }
        FunctionCode::ReadWriteMultipleRegisters => {
            // read address/quantity (4) + write address/quantity (4) + byte count (1)
            data.get(8).map(|count| 9 + *count as usize)
        }
        FunctionCode::ReadFileRecord | FunctionCode::WriteFileRecord => {
            data.first().map(|count| 1 + *count as usize)
        }
        FunctionCode::EncapsulatedInterfaceTransport
        | FunctionCode::Invalid
        | FunctionCode::Custom(_) => None,
        fixed => request_minimum_size(fixed),
    }
}
