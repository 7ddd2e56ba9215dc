//! # SBMP
//! SBMP(Simple Binary Messaging Protocol) is a point-to-point, symmetric
//! messaging protocol carrying typed, session-correlated datagrams over a
//! byte-oriented transport (serial line, pipe, socket).
//!
//! The crate stacks three state machines: the framing layer parses and
//! emits checksummed frames one byte at a time, the datagram layer adds
//! session correlation and message typing, and the endpoint negotiates
//! capabilities with its peer through a symmetric handshake and dispatches
//! received datagrams to per-session listeners or a default handler. A
//! bulk helper splits oversized payloads across multiple frames.

//! ## Example
//! ```
//! extern crate sbmp_rs as sbmp;
//! use std::cell::RefCell;
//!
//! struct App {
//!     received: RefCell<Vec<u8>>,
//! }
//!
//! struct Wire {
//!     bytes: RefCell<Vec<u8>>,
//! }
//!
//! impl sbmp::Interface for Wire {
//!     fn tx_byte(&self, byte: u8) -> bool {
//!         self.bytes.borrow_mut().push(byte);
//!         true
//!     }
//! }
//!
//! fn print_dg(app: &App, _rsp: &mut sbmp::Responder<Wire>, dg: &sbmp::Datagram) {
//!     println!("session=0x{:04x}, type={}, {} B", dg.session, dg.dg_type, dg.payload.len());
//!     app.received.borrow_mut().extend_from_slice(dg.payload);
//! }
//!
//! fn main() {
//!     let wire = Wire { bytes: RefCell::new(Vec::new()) };
//!     let app = App { received: RefCell::new(Vec::new()) };
//!
//!     let mut sender = sbmp::Endpoint::new(
//!         String::from("sender"),
//!         &wire,
//!         &app,
//!         sbmp::EndpointConfig::default(),
//!         print_dg,
//!     );
//!     let mut receiver = sbmp::Endpoint::new(
//!         String::from("receiver"),
//!         &wire,
//!         &app,
//!         sbmp::EndpointConfig::default(),
//!         print_dg,
//!     );
//!
//!     let (_session, sent) = match sender.send_message(42, b"Hi") {
//!         Ok(ok) => ok,
//!         Err(_) => panic!("Opps!"),
//!     };
//!     assert_eq!(2, sent);
//!
//!     let frame = wire.bytes.borrow_mut().split_off(0);
//!     receiver.poll(&frame);
//!
//!     assert_eq!(b"Hi".to_vec(), *app.received.borrow());
//! }
//! ```

use std::fmt;

mod bulk;
mod checksum;
mod datagram;
mod endpoint;
mod framing;
mod interface;

pub use bulk::{BulkRx, BulkTx, BULK_HEADER_LEN};
pub use checksum::{CksumType, HAS_CRC32};
pub use datagram::{dg_start, Datagram, DG_HEADER_LEN};
pub use endpoint::{
    DatagramHandler, Endpoint, EndpointConfig, HandshakeStatus, Responder, SessionListener,
    DG_HSK_ACCEPT, DG_HSK_CONFLICT, DG_HSK_START,
};
pub use framing::{FrmRx, FrmTx, RxState, SOF_BYTE};
pub use interface::Interface;

/// Error
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Transmission is disabled on this endpoint.
    TxDisabled,
    /// A frame is already being transmitted.
    TxBusy,
    /// There is no frame in progress to put payload bytes into.
    TxIdle,
    /// The message does not fit the peer's receive buffer. The value is
    /// the number of bytes over the limit.
    TooLong(u16),
    /// Frame payload too short to carry a datagram header.
    ShortDatagram,
    /// All listener slots are in use.
    NoListenerSlot,
    /// Bulk transfer chunk 0 too short for the length header.
    BadBulkHeader,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TxDisabled => write!(f, "tx disabled"),
            Error::TxBusy => write!(f, "frame already in progress"),
            Error::TxIdle => write!(f, "no frame in progress"),
            Error::TooLong(over) => write!(f, "message {} B over the peer's limit", over),
            Error::ShortDatagram => write!(f, "datagram too short"),
            Error::NoListenerSlot => write!(f, "listener table full"),
            Error::BadBulkHeader => write!(f, "bulk header too short"),
        }
    }
}

impl std::error::Error for Error {}
