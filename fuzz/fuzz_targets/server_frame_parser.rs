#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rtubus::pdu::{Pdu, Request, Response};
use rtubus::server::RtuServer;

#[derive(Debug, Arbitrary)]
struct FuzzInput<'a> {
    server_address: u8,
    listen_only: bool,
    chunk: &'a [u8],
}

fuzz_target!(|input: FuzzInput| {
    // we only care about panics so results are ignored
    let mut server = RtuServer::new(input.server_address);
    server.set_listen_only(input.listen_only);

    let mut port: Vec<u8> = Vec::new();
    let mut handler =
        |request: &Request| -> Response { Pdu::new(request.function_code(), request.data()) };
    let _ = server.process_frame(input.chunk, &mut handler, &mut port);
});
