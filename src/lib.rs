//! Transport-independent Modbus RTU protocol core.
//!
//! The crate translates between raw RTU byte frames and structured
//! register-access requests/responses and implements the server-side
//! frame-acceptance state machine with the protocol-mandated diagnostic
//! counters and communication event log.
//!
//! What is deliberately **not** here: opening serial ports, baud/parity
//! configuration, request queueing and timeout tracking. The core consumes
//! complete frame chunks and a byte-write capability and leaves the link
//! layer to the application.
//!
//! Server side:
//!
//! ```rust
//! use rtubus::pdu::{Pdu, Request, Response};
//! use rtubus::server::RtuServer;
//!
//! let mut server = RtuServer::new(1);
//! let mut handler = |request: &Request| -> Response {
//!     // echo-style handler; real applications dispatch on
//!     // request.function_code() against their register storage
//!     Pdu::new(request.function_code(), request.data())
//! };
//! let mut port: Vec<u8> = Vec::new(); // any FramePort, e.g. a serial writer
//!
//! // one chunk = one complete frame, per the RTU silent-interval framing
//! let chunk = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0a, 0xc5, 0xcd];
//! server.process_frame(&chunk, &mut handler, &mut port).unwrap();
//! ```
//!
//! Client side:
//!
//! ```rust
//! use rtubus::client::{decode_response, read_request};
//! use rtubus::data::{RegisterType, RegisterUnit};
//!
//! let unit = RegisterUnit::with_count(RegisterType::HoldingRegisters, 0x10, 3);
//! let request = read_request(&unit).unwrap();
//! # let _ = request;
//! # let response = rtubus::pdu::Pdu::new(
//! #     rtubus::pdu::FunctionCode::ReadHoldingRegisters,
//! #     &[6, 0, 1, 0, 2, 0, 3]);
//! // send the framed request, receive and unframe the response ADU, then:
//! let result = decode_response(&response).unwrap();
//! assert_eq!(result.values(), &[1, 2, 3]);
//! ```

pub mod adu;
pub mod client;
pub mod consts;
pub mod data;
pub mod pdu;
pub mod reply;
pub mod server;

mod vector;
pub use vector::VectorTrait;

mod error;
pub use error::ErrorKind;

#[cfg(test)]
mod tests;

/// CRC-16/Modbus over a byte sequence.
///
/// Polynomial 0xA001 (reflected 0x8005), initial value 0xFFFF, processed
/// LSB-first, no final XOR. Appended to RTU frames low byte first.
pub fn calc_crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for i in data {
        crc ^= u16::from(*i);
        for _ in (0..8).rev() {
            if (crc & 0x0001) == 0 {
                crc >>= 1;
            } else {
                crc >>= 1;
                crc ^= 0xA001;
            }
        }
    }
    crc
}
