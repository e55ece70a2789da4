//! Client-side request generation and response decoding.
//!
//! Requests are built from a [`RegisterUnit`] describing the access; the
//! caller frames them with [`crate::adu::create`] and ships them over its
//! own link. Responses travel the other way: an unframed PDU is decoded
//! back into a `RegisterUnit`, with every structural rule checked before
//! any field is trusted. Decode failures are `None`, never a panic or an
//! error value - a malformed response carries no more information than
//! "not decodable".

use crate::consts::{COIL_OFF, COIL_ON, MAX_WRITE_REGISTER_COUNT};
use crate::data::{RegisterType, RegisterUnit};
use crate::pdu::{self, FunctionCode, Pdu, Request, Response};
use crate::ErrorKind;

fn unit_address(unit: &RegisterUnit) -> Result<u16, ErrorKind> {
    u16::try_from(unit.start_address()).map_err(|_| ErrorKind::InvalidUnit)
}

/// Builds the read request matching `unit`'s register type, start address
/// and value count.
pub fn read_request(unit: &RegisterUnit) -> Result<Request, ErrorKind> {
    let code = match unit.register_type() {
        RegisterType::Coils => FunctionCode::ReadCoils,
        RegisterType::DiscreteInputs => FunctionCode::ReadDiscreteInputs,
        RegisterType::HoldingRegisters => FunctionCode::ReadHoldingRegisters,
        RegisterType::InputRegisters => FunctionCode::ReadInputRegisters,
        RegisterType::Invalid => return Err(ErrorKind::InvalidUnit),
    };
    let address = unit_address(unit)?;
    let count = u16::try_from(unit.value_count()).map_err(|_| ErrorKind::InvalidUnit)?;
    let mut data = Vec::with_capacity(4);
    data.extend_from_slice(&address.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    Ok(Pdu::new(code, &data))
}

/// Builds the write request matching `unit`.
///
/// A single value maps to WriteSingleCoil/WriteSingleRegister, several to
/// the multiple-write forms. Discrete inputs and input registers are
/// read-only tables and yield `InvalidUnit`.
pub fn write_request(unit: &RegisterUnit) -> Result<Request, ErrorKind> {
    if unit.values().is_empty() {
        return Err(ErrorKind::InvalidUnit);
    }
    let address = unit_address(unit)?;
    match unit.register_type() {
        RegisterType::Coils => write_coils_request(unit, address),
        RegisterType::HoldingRegisters => write_registers_request(unit, address),
        RegisterType::DiscreteInputs | RegisterType::InputRegisters | RegisterType::Invalid => {
            Err(ErrorKind::InvalidUnit)
        }
    }
}

fn write_coils_request(unit: &RegisterUnit, address: u16) -> Result<Request, ErrorKind> {
    let values = unit.values();
    if values.len() == 1 {
        let state = if values[0] == 0 { COIL_OFF } else { COIL_ON };
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&address.to_be_bytes());
        data.extend_from_slice(&state.to_be_bytes());
        return Ok(Pdu::new(FunctionCode::WriteSingleCoil, &data));
    }
    let count = u16::try_from(values.len()).map_err(|_| ErrorKind::InvalidUnit)?;
    let byte_count = values.len().div_ceil(8);
    let byte_count_u8 = u8::try_from(byte_count).map_err(|_| ErrorKind::OOB)?;
    let mut data = Vec::with_capacity(5 + byte_count);
    data.extend_from_slice(&address.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    data.push(byte_count_u8);
    let mut packed = vec![0u8; byte_count];
    for (i, value) in values.iter().enumerate() {
        if *value != 0 {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    data.extend_from_slice(&packed);
    Ok(Pdu::new(FunctionCode::WriteMultipleCoils, &data))
}

fn write_registers_request(unit: &RegisterUnit, address: u16) -> Result<Request, ErrorKind> {
    let values = unit.values();
    if values.len() == 1 {
        let mut data = Vec::with_capacity(4);
        data.extend_from_slice(&address.to_be_bytes());
        data.extend_from_slice(&values[0].to_be_bytes());
        return Ok(Pdu::new(FunctionCode::WriteSingleRegister, &data));
    }
    if values.len() > MAX_WRITE_REGISTER_COUNT as usize {
        return Err(ErrorKind::InvalidUnit);
    }
    let count = values.len() as u16;
    let mut data = Vec::with_capacity(5 + values.len() * 2);
    data.extend_from_slice(&address.to_be_bytes());
    data.extend_from_slice(&count.to_be_bytes());
    data.push((values.len() * 2) as u8);
    for value in values {
        data.extend_from_slice(&value.to_be_bytes());
    }
    Ok(Pdu::new(FunctionCode::WriteMultipleRegisters, &data))
}

/// Decodes a response into the register-access result it confirms.
///
/// Function codes outside the dispatch table fail; use
/// [`decode_response_with`] to supply an extension hook for them.
pub fn decode_response(response: &Response) -> Option<RegisterUnit> {
    decode_response_with(response, |_| None)
}

/// [`decode_response`] with a fallback for unrecognized function codes.
///
/// `decode_custom` runs only for codes the built-in table does not claim;
/// everything else keeps its structural checks.
pub fn decode_response_with<F>(response: &Response, decode_custom: F) -> Option<RegisterUnit>
where
    F: FnOnce(&Response) -> Option<RegisterUnit>,
{
    match response.function_code() {
        FunctionCode::ReadCoils => {
            decode_read_bits(response, FunctionCode::ReadCoils, RegisterType::Coils)
        }
        FunctionCode::ReadDiscreteInputs => decode_read_bits(
            response,
            FunctionCode::ReadDiscreteInputs,
            RegisterType::DiscreteInputs,
        ),
        FunctionCode::ReadHoldingRegisters => decode_read_registers(
            response,
            FunctionCode::ReadHoldingRegisters,
            RegisterType::HoldingRegisters,
            Some(0),
        ),
        FunctionCode::ReadInputRegisters => decode_read_registers(
            response,
            FunctionCode::ReadInputRegisters,
            RegisterType::InputRegisters,
            None,
        ),
        FunctionCode::WriteSingleCoil => decode_write_single_coil(response),
        FunctionCode::WriteSingleRegister => decode_write_single_register(response),
        // Administrative codes without a dedicated decoder share the echo
        // paths; the function-code prologue rejects them there, so they
        // decode to None until someone claims them.
        FunctionCode::ReadExceptionStatus
        | FunctionCode::Diagnostics
        | FunctionCode::GetCommEventCounter
        | FunctionCode::GetCommEventLog
        | FunctionCode::WriteMultipleCoils => {
            decode_write_multiple(response, FunctionCode::WriteMultipleCoils, RegisterType::Coils)
        }
        FunctionCode::WriteMultipleRegisters => decode_write_multiple(
            response,
            FunctionCode::WriteMultipleRegisters,
            RegisterType::HoldingRegisters,
        ),
        FunctionCode::ReportServerId
        | FunctionCode::ReadFileRecord
        | FunctionCode::WriteFileRecord
        | FunctionCode::MaskWriteRegister
        | FunctionCode::ReadWriteMultipleRegisters => decode_read_registers(
            response,
            FunctionCode::ReadWriteMultipleRegisters,
            RegisterType::HoldingRegisters,
            None,
        ),
        FunctionCode::ReadFifoQueue
        | FunctionCode::EncapsulatedInterfaceTransport
        | FunctionCode::Invalid
        | FunctionCode::Custom(_) => decode_custom(response),
    }
}

/// Shared prologue: structurally valid, not an exception, and the function
/// code this decode path is for.
fn accepted(response: &Response, expected: FunctionCode) -> bool {
    response.is_valid() && !response.is_exception() && response.function_code() == expected
}

fn u16_at(data: &[u8], index: usize) -> u16 {
    u16::from_be_bytes([data[index], data[index + 1]])
}

fn decode_read_bits(
    response: &Response,
    expected: FunctionCode,
    register_type: RegisterType,
) -> Option<RegisterUnit> {
    if !accepted(response, expected) {
        return None;
    }
    let data = response.data();
    if data.len() < pdu::response_minimum_size(expected)? {
        return None;
    }
    // declared byte count must match the bytes that actually arrived
    let byte_count = data[0] as usize;
    if data.len() - 1 != byte_count {
        return None;
    }
    let mut values = Vec::with_capacity(byte_count * 8);
    for byte in &data[1..] {
        for bit in 0..8 {
            values.push(u16::from(byte >> bit & 1));
        }
    }
    // the reported count stays bit-padded (byte_count * 8); the requester
    // knows how many of the trailing values are padding
    Some(RegisterUnit::new(register_type, -1, values))
}

fn decode_read_registers(
    response: &Response,
    expected: FunctionCode,
    register_type: RegisterType,
    start_address: Option<i32>,
) -> Option<RegisterUnit> {
    if !accepted(response, expected) {
        return None;
    }
    let data = response.data();
    if data.len() < pdu::response_minimum_size(expected)? {
        return None;
    }
    let byte_count = data[0] as usize;
    if data.len() - 1 != byte_count || byte_count % 2 != 0 {
        return None;
    }
    let values: Vec<u16> = data[1..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Some(RegisterUnit::new(
        register_type,
        start_address.unwrap_or(-1),
        values,
    ))
}

fn decode_write_single_coil(response: &Response) -> Option<RegisterUnit> {
    if !accepted(response, FunctionCode::WriteSingleCoil) {
        return None;
    }
    let data = response.data();
    if data.len() != pdu::response_minimum_size(FunctionCode::WriteSingleCoil)? {
        return None;
    }
    let address = u16_at(data, 0);
    let state = u16_at(data, 2);
    if state != COIL_ON && state != COIL_OFF {
        return None;
    }
    Some(RegisterUnit::new(
        RegisterType::Coils,
        i32::from(address),
        vec![u16::from(state == COIL_ON)],
    ))
}

fn decode_write_single_register(response: &Response) -> Option<RegisterUnit> {
    if !accepted(response, FunctionCode::WriteSingleRegister) {
        return None;
    }
    let data = response.data();
    if data.len() != pdu::response_minimum_size(FunctionCode::WriteSingleRegister)? {
        return None;
    }
    Some(RegisterUnit::new(
        RegisterType::HoldingRegisters,
        i32::from(u16_at(data, 0)),
        vec![u16_at(data, 2)],
    ))
}

fn decode_write_multiple(
    response: &Response,
    expected: FunctionCode,
    register_type: RegisterType,
) -> Option<RegisterUnit> {
    if !accepted(response, expected) {
        return None;
    }
    let data = response.data();
    if data.len() != pdu::response_minimum_size(expected)? {
        return None;
    }
    let address = u16_at(data, 0);
    let count = u16_at(data, 2);
    if expected == FunctionCode::WriteMultipleRegisters
        && !(1..=MAX_WRITE_REGISTER_COUNT).contains(&count)
    {
        return None;
    }
    // echo-only confirmation: a count comes back, the values do not
    Some(RegisterUnit::with_count(
        register_type,
        i32::from(address),
        count as usize,
    ))
}
