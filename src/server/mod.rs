//! Server-side frame acceptance state machine.
//!
//! [`RtuServer`] consumes one complete raw frame per call, decides whether
//! to accept it (address match or broadcast, declared size, CRC), hands
//! accepted requests to the application's [`RequestHandler`] and writes the
//! framed response through a [`FramePort`]. Every branch updates the
//! diagnostic counters and the communication event log exactly as the
//! serial-line protocol mandates, so the diagnostics stay truthful even
//! for traffic the server ignores.
//!
//! Processing is run-to-completion: a chunk is carried through to either a
//! rejection or a finished request/response cycle before the call returns.
//! Partial-frame reassembly across chunks is the link layer's job.

pub mod diagnostics;

use log::{debug, warn};

use crate::adu::{self, SerialAdu};
use crate::calc_crc16;
use crate::consts::{ADU_OVERHEAD, BROADCAST_ADDRESS, MIN_ADU_SIZE, POLL_484, POLL_CONTROLLER};
use crate::pdu::{self, ExceptionCode, FunctionCode, Request, Response};
use crate::ErrorKind;
use diagnostics::{CommEvent, CommEventLog, Counter, CounterSet, ReceiveFlag, SendFlag};

/// Frame processing phase. Outside a [`RtuServer::process_frame`] call the
/// machine always rests in `Idle`; the terminal decision of each call is
/// its return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameState {
    Idle,
    FrameReceived,
    Accepted,
    Rejected,
}

/// Application hook turning an accepted request into a response.
///
/// Returning an invalid PDU ([`crate::pdu::Pdu::invalid`]) means "no reply
/// by handler decision"; the server then counts ServerNoResponse and stays
/// silent. An exception response is a perfectly normal return value and is
/// written to the bus like any other.
pub trait RequestHandler {
    fn process_request(&mut self, request: &Request) -> Response;
}

impl<F: FnMut(&Request) -> Response> RequestHandler for F {
    fn process_request(&mut self, request: &Request) -> Response {
        self(request)
    }
}

/// Outbound byte-write capability.
///
/// A written count below the frame length is a failure; the protocol has
/// no notion of a partially sent frame.
pub trait FramePort {
    fn is_open(&self) -> bool {
        true
    }
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, ErrorKind>;
}

/// Always-open sink, mostly useful for loopback tests and demos.
impl FramePort for Vec<u8> {
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, ErrorKind> {
        self.extend_from_slice(frame);
        Ok(frame.len())
    }
}

/// One served device instance on an RTU bus.
pub struct RtuServer {
    server_address: u8,
    listen_only: bool,
    state: FrameState,
    counters: CounterSet,
    event_log: CommEventLog,
}

impl RtuServer {
    pub fn new(server_address: u8) -> Self {
        Self {
            server_address,
            listen_only: false,
            state: FrameState::Idle,
            counters: CounterSet::new(),
            event_log: CommEventLog::new(),
        }
    }

    pub fn server_address(&self) -> u8 {
        self.server_address
    }

    pub fn set_server_address(&mut self, server_address: u8) {
        self.server_address = server_address;
    }

    pub fn is_listen_only(&self) -> bool {
        self.listen_only
    }

    /// In listen-only mode frames are still validated, dispatched and
    /// counted, but no response ever reaches the bus.
    pub fn set_listen_only(&mut self, listen_only: bool) {
        self.listen_only = listen_only;
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn counters(&self) -> &CounterSet {
        &self.counters
    }

    pub fn counter(&self, counter: Counter) -> u16 {
        self.counters.value(counter)
    }

    pub fn comm_event_log(&self) -> &CommEventLog {
        &self.event_log
    }

    /// The protocol's "clear counters" operation. Must not race an
    /// in-flight `process_frame` call; the caller synchronizes if clearing
    /// from elsewhere.
    pub fn clear_counters(&mut self) {
        self.counters.clear();
    }

    pub fn clear_comm_event_log(&mut self) {
        self.event_log.clear();
    }

    /// Processes one raw frame chunk to completion.
    ///
    /// Returns the acceptance decision, or an error when a response could
    /// not be written (`PortClosed`, `WriteFailed`). Write errors are fatal
    /// to the exchange only, not to the device instance.
    pub fn process_frame<H: RequestHandler, P: FramePort>(
        &mut self,
        chunk: &[u8],
        handler: &mut H,
        port: &mut P,
    ) -> Result<FrameState, ErrorKind> {
        self.state = FrameState::FrameReceived;
        let outcome = self.run(chunk, handler, port);
        self.state = FrameState::Idle;
        outcome
    }

    #[allow(clippy::too_many_lines)]
    fn run<H: RequestHandler, P: FramePort>(
        &mut self,
        chunk: &[u8],
        handler: &mut H,
        port: &mut P,
    ) -> Result<FrameState, ErrorKind> {
        let raw = SerialAdu::new(chunk);
        debug!("received adu: {:02x?}", raw.raw());

        let mut event = CommEvent::RECEIVE;
        if self.listen_only {
            event |= ReceiveFlag::ListenOnlyMode;
        }

        // below the address + function code + CRC floor the checksum cannot
        // even be located
        if raw.raw_size() < MIN_ADU_SIZE {
            warn!("incomplete adu received, ignoring");
            self.counters.increment(Counter::BusCharacterOverrun);
            self.event_log.push(event | ReceiveFlag::CommunicationError);
            return Ok(self.rejected());
        }

        let broadcast = raw.server_address() == BROADCAST_ADDRESS;
        if broadcast {
            event |= ReceiveFlag::BroadcastReceived;
        }

        let request = raw.pdu();
        // address byte + function code byte + declared content + 2 bytes CRC
        let matches_declared_size = pdu::request_data_size(&request)
            .is_some_and(|size| 2 + size + 2 == raw.raw_size());
        if !matches_declared_size {
            warn!("adu does not match expected size, ignoring");
            self.counters.increment(Counter::BusCharacterOverrun);
            self.event_log.push(event | ReceiveFlag::CommunicationError);
            return Ok(self.rejected());
        }

        if !raw.matching_checksum() {
            warn!(
                "discarding request with wrong crc {:#06x}, calculated {:#06x}",
                raw.checksum(),
                calc_crc16(&raw.raw()[..raw.raw_size() - 2])
            );
            self.counters.increment(Counter::BusCommunicationError);
            self.event_log.push(event | ReceiveFlag::CommunicationError);
            return Ok(self.rejected());
        }

        // a syntactically valid frame was seen on the bus, whoever it is for
        self.counters.increment(Counter::BusMessage);

        if !broadcast && raw.server_address() != self.server_address {
            // normal bus traffic for another device, no diagnostic trace
            debug!(
                "wrong server address, expected {} got {}",
                self.server_address,
                raw.server_address()
            );
            return Ok(self.rejected());
        }

        self.counters.increment(Counter::ServerMessage);
        self.event_log.push(event);

        debug!("request pdu: {:?}", request);
        let response = handler.process_request(&request);

        let mut event = CommEvent::SENT;
        if self.listen_only {
            event |= SendFlag::ListenOnlyMode;
        }

        // "no response": the handler stayed silent, or this node must not
        // answer (listen-only, broadcast) even though a response PDU exists
        if !response.is_valid() || self.listen_only || broadcast {
            self.counters.increment(Counter::ServerNoResponse);
            self.event_log.push(event);
            return Ok(self.accepted());
        }

        debug!("response pdu: {:?}", response);
        let mut frame: Vec<u8> = Vec::with_capacity(response.data_size() + ADU_OVERHEAD);
        if adu::create(self.server_address, &response, &mut frame).is_err() {
            warn!("handler response does not fit a frame, dropping");
            self.counters.increment(Counter::ServerNoResponse);
            self.event_log.push(event);
            return Err(ErrorKind::WriteFailed);
        }
        debug!("response adu: {:02x?}", frame.as_slice());

        if !port.is_open() {
            debug!("frame port is closed");
            self.counters.increment(Counter::ServerNoResponse);
            self.event_log.push(event);
            return Err(ErrorKind::PortClosed);
        }
        let written = port.write_frame(&frame);
        if !matches!(written, Ok(n) if n == frame.len()) {
            debug!("cannot write response to frame port");
            self.counters.increment(Counter::ServerNoResponse);
            self.event_log.push(event);
            return Err(ErrorKind::WriteFailed);
        }

        if response.is_exception() {
            match ExceptionCode::new(response.exception_code()) {
                ExceptionCode::IllegalFunction
                | ExceptionCode::IllegalDataAddress
                | ExceptionCode::IllegalDataValue => {
                    event |= SendFlag::ReadExceptionSent;
                }
                ExceptionCode::ServerDeviceFailure => {
                    event |= SendFlag::ServerAbortExceptionSent;
                }
                ExceptionCode::ServerDeviceBusy => {
                    self.counters.increment(Counter::ServerBusy);
                    event |= SendFlag::ServerBusyExceptionSent;
                }
                ExceptionCode::NegativeAcknowledge => {
                    self.counters.increment(Counter::ServerNak);
                    event |= SendFlag::ServerProgramNakExceptionSent;
                }
                _ => {}
            }
            self.counters.increment(Counter::BusExceptionError);
        } else {
            // exception responses, poll commands and event-counter fetches
            // never count as a completed comm event
            match request.function_code() {
                FunctionCode::Custom(POLL_484 | POLL_CONTROLLER)
                | FunctionCode::GetCommEventCounter => {}
                _ => self.counters.increment(Counter::CommEvent),
            }
        }

        self.event_log.push(event);
        Ok(self.accepted())
    }

    fn accepted(&mut self) -> FrameState {
        self.state = FrameState::Accepted;
        FrameState::Accepted
    }

    fn rejected(&mut self) -> FrameState {
        self.state = FrameState::Rejected;
        FrameState::Rejected
    }
}
