extern crate sbmp_rs as sbmp;
use log::{info, LevelFilter};
use std::cell::RefCell;

const DG_PING: u8 = 4;
const DG_PONG: u8 = 5;

struct App {
    name: String,
}

impl App {
    fn new(name: String) -> Self {
        App { name: name }
    }

    fn print_msg(&self, dg: &sbmp::Datagram) {
        let mut output = String::from("");
        output.push_str(
            format!(
                "session=0x{:04x}, type={}, data: [ ",
                dg.session, dg.dg_type
            )
            .as_str(),
        );
        for byte in dg.payload {
            output.push_str(format!("0x{:02x} ", byte).as_str());
        }
        output.push_str("]");
        info!(target: self.name.as_str(), "{}", output);
    }
}

struct Wire {
    bytes: RefCell<Vec<u8>>,
}

impl Wire {
    fn new() -> Self {
        Wire {
            bytes: RefCell::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<u8> {
        self.bytes.borrow_mut().split_off(0)
    }
}

impl sbmp::Interface for Wire {
    fn tx_byte(&self, byte: u8) -> bool {
        self.bytes.borrow_mut().push(byte);
        true
    }
}

fn print_dg(app: &App, _rsp: &mut sbmp::Responder<Wire>, dg: &sbmp::Datagram) {
    app.print_msg(dg);
}

// answers every ping with a pong in the same session
fn request_handler(app: &App, rsp: &mut sbmp::Responder<Wire>, dg: &sbmp::Datagram) {
    app.print_msg(dg);
    if dg.dg_type == DG_PING {
        rsp.send_response(DG_PONG, b"pong", dg.session).unwrap_or(0);
    }
}

fn reply_listener(app: &App, _rsp: &mut sbmp::Responder<Wire>, dg: &sbmp::Datagram) {
    app.print_msg(dg);
}

fn main() {
    log::set_max_level(LevelFilter::Trace);
    env_logger::init();

    let wire1 = Wire::new(); // e1 -> e2
    let wire2 = Wire::new(); // e2 -> e1
    let app1 = App::new(String::from("app1"));
    let app2 = App::new(String::from("app2"));

    let mut e1 = sbmp::Endpoint::new(
        String::from("e1"),
        &wire1,
        &app1,
        sbmp::EndpointConfig::default(),
        print_dg,
    );
    let mut e2 = sbmp::Endpoint::new(
        String::from("e2"),
        &wire2,
        &app2,
        sbmp::EndpointConfig::default().with_buffer_size(64),
        request_handler,
    );

    // negotiate origin bits and capabilities
    e1.start_handshake().unwrap();
    e2.poll(&wire1.take());
    e1.poll(&wire2.take());
    info!(
        "e1: hsk={:?}, origin={}, peer buffer={} B",
        e1.handshake_status(),
        e1.origin(),
        e1.peer_buffer_size()
    );
    info!(
        "e2: hsk={:?}, origin={}, peer buffer={} B",
        e2.handshake_status(),
        e2.origin(),
        e2.peer_buffer_size()
    );

    // a ping from e1; the reply comes back through a session listener
    let (session, _) = match e1.send_message(DG_PING, b"ping") {
        Ok(ok) => ok,
        Err(_) => panic!("Opps!"),
    };
    e1.add_listener(session, reply_listener).unwrap();

    e2.poll(&wire1.take());
    e1.poll(&wire2.take());

    e1.remove_listener(session);
}
