extern crate sbmp_rs as sbmp;
use log::{info, LevelFilter};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

const DG_GREETING: u8 = 4;

struct Uart {
    name: String,
    sender: Sender<u8>,
    receiver: Receiver<u8>,
}

impl Uart {
    fn new(name: String, sender: Sender<u8>, receiver: Receiver<u8>) -> Self {
        Uart {
            name: name,
            sender: sender,
            receiver: receiver,
        }
    }
}

impl sbmp::Interface for Uart {
    fn tx_byte(&self, byte: u8) -> bool {
        match self.sender.send(byte) {
            Ok(_) => true,
            Err(e) => {
                info!(target: self.name.as_str(), "{}", e);
                false
            }
        }
    }
}

struct App {
    name: String,
}

fn print_dg(app: &App, _rsp: &mut sbmp::Responder<Uart>, dg: &sbmp::Datagram) {
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
    info!(target: app.name.as_str(), "{}", output);
}

fn main() {
    log::set_max_level(LevelFilter::Trace);
    env_logger::init();

    let (tx1, rx2) = channel();
    let (tx2, rx1) = channel();

    let app1_builder = thread::Builder::new().name("app1".into());
    let app1 = app1_builder
        .spawn(move || {
            let uart1 = Uart::new(String::from("uart1"), tx1, rx1);
            let app = App {
                name: String::from("app1"),
            };
            let mut ep = sbmp::Endpoint::new(
                String::from("e1"),
                &uart1,
                &app,
                sbmp::EndpointConfig::default(),
                print_dg,
            );

            ep.start_handshake().unwrap();
            while ep.handshake_status() == sbmp::HandshakeStatus::AwaitReply {
                match uart1.receiver.recv_timeout(Duration::from_millis(500)) {
                    Ok(byte) => ep.receive(byte),
                    Err(_) => break,
                }
            }
            info!(
                "e1: hsk={:?}, origin={}, peer buffer={} B",
                ep.handshake_status(),
                ep.origin(),
                ep.peer_buffer_size()
            );

            match ep.send_message(DG_GREETING, b"hello over the channel") {
                Ok((session, sent)) => {
                    info!("e1: {} bytes sent in session 0x{:04x}.", sent, session);
                }
                Err(_) => panic!("Opps!"),
            };
        })
        .unwrap();

    let app2_builder = thread::Builder::new().name("app2".into());
    let app2 = app2_builder
        .spawn(move || {
            let uart2 = Uart::new(String::from("uart2"), tx2, rx2);
            let app = App {
                name: String::from("app2"),
            };
            let mut ep = sbmp::Endpoint::new(
                String::from("e2"),
                &uart2,
                &app,
                sbmp::EndpointConfig::default(),
                print_dg,
            );

            // accept the handshake, then print whatever arrives
            loop {
                match uart2.receiver.recv_timeout(Duration::from_millis(500)) {
                    Ok(byte) => ep.receive(byte),
                    Err(_) => break,
                }
            }
            info!(
                "e2: hsk={:?}, origin={}",
                ep.handshake_status(),
                ep.origin()
            );
        })
        .unwrap();

    app1.join().unwrap();
    app2.join().unwrap();
}
