// In-memory request/response loop: a client-side request is framed, pushed
// through the server state machine against a small holding-register bank,
// and the response frame is decoded back into a register unit.

use rtubus::adu;
use rtubus::client::{decode_response, read_request, write_request};
use rtubus::data::{RegisterType, RegisterUnit};
use rtubus::pdu::{ExceptionCode, FunctionCode, Pdu, Request, Response};
use rtubus::server::diagnostics::Counter;
use rtubus::server::RtuServer;

struct Bank {
    holdings: [u16; 16],
}

impl Bank {
    fn process(&mut self, request: &Request) -> Response {
        let data = request.data();
        match request.function_code() {
            FunctionCode::ReadHoldingRegisters => {
                let reg = u16::from_be_bytes([data[0], data[1]]) as usize;
                let count = u16::from_be_bytes([data[2], data[3]]) as usize;
                if reg + count > self.holdings.len() {
                    return Pdu::exception(
                        request.function_code(),
                        ExceptionCode::IllegalDataAddress,
                    );
                }
                let mut payload = vec![(count * 2) as u8];
                for value in &self.holdings[reg..reg + count] {
                    payload.extend_from_slice(&value.to_be_bytes());
                }
                Pdu::new(request.function_code(), &payload)
            }
            FunctionCode::WriteSingleRegister => {
                let reg = u16::from_be_bytes([data[0], data[1]]) as usize;
                if reg >= self.holdings.len() {
                    return Pdu::exception(
                        request.function_code(),
                        ExceptionCode::IllegalDataAddress,
                    );
                }
                self.holdings[reg] = u16::from_be_bytes([data[2], data[3]]);
                Pdu::new(request.function_code(), data)
            }
            _ => Pdu::exception(request.function_code(), ExceptionCode::IllegalFunction),
        }
    }
}

fn main() {
    env_logger::init();

    let unit_id = 1;
    let mut server = RtuServer::new(unit_id);
    let mut bank = Bank { holdings: [0; 16] };

    let write = write_request(&RegisterUnit::new(
        RegisterType::HoldingRegisters,
        3,
        vec![0x0102],
    ))
    .unwrap();
    let read = read_request(&RegisterUnit::with_count(
        RegisterType::HoldingRegisters,
        0,
        8,
    ))
    .unwrap();

    for request in [write, read] {
        let mut chunk: Vec<u8> = Vec::new();
        adu::create(unit_id, &request, &mut chunk).unwrap();

        let mut wire: Vec<u8> = Vec::new();
        let mut handler = |req: &Request| bank.process(req);
        server.process_frame(&chunk, &mut handler, &mut wire).unwrap();

        let response = adu::parse_frame(&wire).unwrap();
        match decode_response(&response) {
            Some(unit) => println!("{:?}", unit),
            None => println!("response not decodable: {:?}", response),
        }
    }

    println!(
        "bus messages: {}, served: {}, event log: {:02x?}",
        server.counter(Counter::BusMessage),
        server.counter(Counter::ServerMessage),
        server.comm_event_log().as_bytes()
    );
}
