use crate::adu;
use crate::pdu::{ExceptionCode, FunctionCode, Pdu, Request, Response};
use crate::server::diagnostics::{CommEvent, CommEventLog, Counter, CounterSet, ReceiveFlag};
use crate::server::{FramePort, FrameState, RtuServer};
use crate::ErrorKind;

#[derive(Default)]
struct TestPort {
    closed: bool,
    partial: bool,
    written: Vec<u8>,
}

impl FramePort for TestPort {
    fn is_open(&self) -> bool {
        !self.closed
    }
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, ErrorKind> {
        if self.partial {
            return Ok(frame.len().saturating_sub(1));
        }
        self.written.extend_from_slice(frame);
        Ok(frame.len())
    }
}

fn framed(address: u8, pdu: &Pdu) -> Vec<u8> {
    let mut frame = Vec::new();
    adu::create(address, pdu, &mut frame).unwrap();
    frame
}

fn read_holdings_request() -> Pdu {
    Pdu::new(FunctionCode::ReadHoldingRegisters, &[0x00, 0x00, 0x00, 0x01])
}

fn holdings_response() -> Pdu {
    Pdu::new(FunctionCode::ReadHoldingRegisters, &[0x02, 0x00, 0x01])
}

fn assert_counters(server: &RtuServer, expected: &[(Counter, u16)]) {
    for counter in Counter::ALL {
        let want = expected
            .iter()
            .find(|(c, _)| *c == counter)
            .map_or(0, |(_, v)| *v);
        assert_eq!(server.counter(counter), want, "counter {:?}", counter);
    }
}

#[test]
fn test_short_frame_rejected() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    let state = server
        .process_frame(&[0x01, 0x03, 0x05], &mut handler, &mut port)
        .unwrap();
    assert_eq!(state, FrameState::Rejected);
    assert_eq!(calls, 0);
    assert!(port.written.is_empty());
    assert_counters(&server, &[(Counter::BusCharacterOverrun, 1)]);
    assert_eq!(server.comm_event_log().as_bytes(), &[0x82]);
}

#[test]
fn test_size_mismatch_rejected() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    // read-holdings frame truncated to a 2-byte payload; the declared
    // content size no longer matches the raw length
    let chunk = [0x01, 0x03, 0x00, 0x00, 0xaa, 0xbb];
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Rejected);
    assert_eq!(calls, 0);
    assert_counters(&server, &[(Counter::BusCharacterOverrun, 1)]);
    assert_eq!(server.comm_event_log().as_bytes(), &[0x82]);
}

#[test]
fn test_crc_mismatch_rejected() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |_: &Request| -> Response { holdings_response() };

    let mut chunk = framed(1, &read_holdings_request());
    let last = chunk.len() - 1;
    chunk[last] ^= 0xff;
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Rejected);
    assert!(port.written.is_empty());
    assert_counters(&server, &[(Counter::BusCommunicationError, 1)]);
    assert_eq!(server.comm_event_log().as_bytes(), &[0x82]);
}

#[test]
fn test_other_address_ignored_silently() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    let chunk = framed(2, &read_holdings_request());
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Rejected);
    assert_eq!(calls, 0);
    assert!(port.written.is_empty());
    // bus traffic for another device: counted on the bus, no event logged
    assert_counters(&server, &[(Counter::BusMessage, 1)]);
    assert!(server.comm_event_log().is_empty());
}

#[test]
fn test_normal_exchange() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |request: &Request| -> Response {
        assert_eq!(request.function_code(), FunctionCode::ReadHoldingRegisters);
        assert_eq!(request.data(), &[0x00, 0x00, 0x00, 0x01]);
        holdings_response()
    };

    let chunk = framed(1, &read_holdings_request());
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Accepted);
    assert_eq!(server.state(), FrameState::Idle);
    assert_eq!(port.written, framed(1, &holdings_response()));
    assert_counters(
        &server,
        &[
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::CommEvent, 1),
        ],
    );
    // newest first: the sent event in front of the receive event
    assert_eq!(server.comm_event_log().as_bytes(), &[0x40, 0x80]);
}

#[test]
fn test_broadcast_dispatches_but_stays_silent() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    let chunk = framed(0, &read_holdings_request());
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Accepted);
    assert_eq!(calls, 1);
    assert!(port.written.is_empty());
    assert_counters(
        &server,
        &[
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::ServerNoResponse, 1),
        ],
    );
    assert_eq!(server.comm_event_log().as_bytes(), &[0x40, 0xc0]);
}

#[test]
fn test_listen_only_mode() {
    let mut server = RtuServer::new(1);
    server.set_listen_only(true);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    let chunk = framed(1, &read_holdings_request());
    server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(calls, 1);
    assert!(port.written.is_empty());
    assert_counters(
        &server,
        &[
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::ServerNoResponse, 1),
        ],
    );
    assert_eq!(server.comm_event_log().as_bytes(), &[0x60, 0xa0]);
}

#[test]
fn test_handler_declines_to_answer() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |_: &Request| -> Response { Pdu::invalid() };

    let chunk = framed(1, &read_holdings_request());
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Accepted);
    assert!(port.written.is_empty());
    assert_counters(
        &server,
        &[
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::ServerNoResponse, 1),
        ],
    );
}

#[test]
fn test_exception_response_flags() {
    let cases = [
        (ExceptionCode::IllegalFunction, 0x41, None),
        (ExceptionCode::IllegalDataAddress, 0x41, None),
        (ExceptionCode::IllegalDataValue, 0x41, None),
        (ExceptionCode::ServerDeviceFailure, 0x42, None),
        (ExceptionCode::ServerDeviceBusy, 0x44, Some(Counter::ServerBusy)),
        (
            ExceptionCode::NegativeAcknowledge,
            0x48,
            Some(Counter::ServerNak),
        ),
    ];
    for (exception, sent_event, extra_counter) in cases {
        let mut server = RtuServer::new(1);
        let mut port = TestPort::default();
        let mut handler = |request: &Request| -> Response {
            Pdu::exception(request.function_code(), exception)
        };

        let chunk = framed(1, &read_holdings_request());
        server.process_frame(&chunk, &mut handler, &mut port).unwrap();
        assert_eq!(
            port.written,
            framed(1, &Pdu::exception(FunctionCode::ReadHoldingRegisters, exception)),
            "{:?}",
            exception
        );
        let mut expected = vec![
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::BusExceptionError, 1),
        ];
        if let Some(counter) = extra_counter {
            expected.push((counter, 1));
        }
        assert_counters(&server, &expected);
        assert_eq!(
            server.comm_event_log().as_bytes(),
            &[sent_event, 0x80],
            "{:?}",
            exception
        );
    }
}

#[test]
fn test_comm_event_counter_request_does_not_count() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |_: &Request| -> Response {
        Pdu::new(FunctionCode::GetCommEventCounter, &[0x00, 0x00, 0x00, 0x05])
    };

    let chunk = framed(1, &Pdu::new(FunctionCode::GetCommEventCounter, &[]));
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Accepted);
    assert!(!port.written.is_empty());
    assert_counters(
        &server,
        &[(Counter::BusMessage, 1), (Counter::ServerMessage, 1)],
    );
}

#[test]
fn test_ordinary_response_counts_comm_event() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |_: &Request| -> Response {
        Pdu::new(FunctionCode::WriteSingleRegister, &[0x00, 0x01, 0x00, 0x03])
    };

    let request = Pdu::new(FunctionCode::WriteSingleRegister, &[0x00, 0x01, 0x00, 0x03]);
    let chunk = framed(1, &request);
    server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(server.counter(Counter::CommEvent), 1);
}

#[test]
fn test_unknown_function_code_rejected_before_dispatch() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut calls = 0;
    let mut handler = |_: &Request| -> Response {
        calls += 1;
        holdings_response()
    };

    let chunk = framed(1, &Pdu::from_wire(&[0x42]));
    let state = server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_eq!(state, FrameState::Rejected);
    assert_eq!(calls, 0);
    assert_counters(&server, &[(Counter::BusCharacterOverrun, 1)]);
}

#[test]
fn test_closed_port() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort {
        closed: true,
        ..TestPort::default()
    };
    let mut handler = |_: &Request| -> Response { holdings_response() };

    let chunk = framed(1, &read_holdings_request());
    let result = server.process_frame(&chunk, &mut handler, &mut port);
    assert_eq!(result, Err(ErrorKind::PortClosed));
    assert!(port.written.is_empty());
    assert_counters(
        &server,
        &[
            (Counter::BusMessage, 1),
            (Counter::ServerMessage, 1),
            (Counter::ServerNoResponse, 1),
        ],
    );
    assert_eq!(server.comm_event_log().as_bytes(), &[0x40, 0x80]);
}

#[test]
fn test_partial_write() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort {
        partial: true,
        ..TestPort::default()
    };
    let mut handler = |_: &Request| -> Response { holdings_response() };

    let chunk = framed(1, &read_holdings_request());
    let result = server.process_frame(&chunk, &mut handler, &mut port);
    assert_eq!(result, Err(ErrorKind::WriteFailed));
    assert_eq!(server.counter(Counter::ServerNoResponse), 1);
}

#[test]
fn test_clear_operations() {
    let mut server = RtuServer::new(1);
    let mut port = TestPort::default();
    let mut handler = |_: &Request| -> Response { holdings_response() };

    let chunk = framed(1, &read_holdings_request());
    server.process_frame(&chunk, &mut handler, &mut port).unwrap();
    assert_ne!(server.counter(Counter::BusMessage), 0);
    assert!(!server.comm_event_log().is_empty());

    server.clear_counters();
    assert_counters(&server, &[]);
    server.clear_comm_event_log();
    assert!(server.comm_event_log().is_empty());
}

#[test]
fn test_counter_wraparound() {
    let mut counters = CounterSet::new();
    for _ in 0..u16::MAX {
        counters.increment(Counter::CommEvent);
    }
    assert_eq!(counters.value(Counter::CommEvent), u16::MAX);
    counters.increment(Counter::CommEvent);
    assert_eq!(counters.value(Counter::CommEvent), 0);
}

#[test]
fn test_event_log_bounded_newest_first() {
    let mut log = CommEventLog::new();
    assert!(log.is_empty());

    for _ in 0..70 {
        log.push(CommEvent::RECEIVE);
    }
    assert_eq!(log.len(), 64);

    log.push(CommEvent::SENT | crate::server::diagnostics::SendFlag::ListenOnlyMode);
    assert_eq!(log.len(), 64);
    assert_eq!(log.as_bytes()[0], 0x60);
    assert_eq!(log.as_bytes()[1], 0x80);
}

#[test]
fn test_comm_event_composition() {
    let mut event = CommEvent::RECEIVE;
    event |= ReceiveFlag::BroadcastReceived;
    assert_eq!(event.value(), 0xc0);
    assert_eq!((CommEvent::RECEIVE | ReceiveFlag::CharacterOverrun).value(), 0x90);
    assert_eq!(CommEvent::ENTERED_LISTEN_ONLY.value(), 0x04);
    assert_eq!(CommEvent::COMMUNICATION_RESTART.value(), 0x00);
}
