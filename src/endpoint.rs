use crate::checksum::{CksumType, HAS_CRC32};
use crate::datagram::{dg_start, Datagram, DG_HEADER_LEN};
use crate::framing::{FrmRx, FrmTx};
use crate::interface::Interface;
use crate::Error;
use log::{debug, info, warn};

/// Reserved datagram type: handshake request (origin bit arbitration).
pub const DG_HSK_START: u8 = 1;
/// Reserved datagram type: handshake accept.
pub const DG_HSK_ACCEPT: u8 = 2;
/// Reserved datagram type: handshake conflict notice.
pub const DG_HSK_CONFLICT: u8 = 3;

// length of the payload sent with a handshake datagram:
// [ pref_cksum 1B | buf_size 2B ]
const HSK_PAYLOAD_LEN: usize = 3;

/// Handshake progress of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandshakeStatus {
    NotStarted,
    AwaitReply,
    Success,
    Conflict,
}

/// Handler for incoming datagrams.
///
/// Receives the user application, a responder for sending replies, and the
/// datagram view. The view borrows the receive buffer and dies with the
/// call; copy the payload out to keep it.
pub type DatagramHandler<T, U> = fn(app: &U, rsp: &mut Responder<'_, '_, T>, dg: &Datagram<'_>);

/// Per-session listener, invoked instead of the default handler for
/// datagrams whose session number matches. Same shape as `DatagramHandler`.
pub type SessionListener<T, U> = fn(app: &U, rsp: &mut Responder<'_, '_, T>, dg: &Datagram<'_>);

/// Per-endpoint configuration.
pub struct EndpointConfig {
    /// Largest payload this endpoint is willing to receive; advertised to
    /// the peer in the handshake.
    pub buffer_size: u16,
    /// Number of concurrent session listener slots.
    pub listener_capacity: usize,
    /// Preferred checksum for frames addressed to this endpoint.
    pub pref_cksum: CksumType,
    /// Initial session counter value (good to randomize).
    pub session_seed: u16,
}

impl EndpointConfig {
    pub fn new() -> Self {
        EndpointConfig {
            buffer_size: 256,
            listener_capacity: 8,
            pref_cksum: if HAS_CRC32 { CksumType::Crc32 } else { CksumType::Xor },
            session_seed: 0,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: u16) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_listener_capacity(mut self, slots: usize) -> Self {
        self.listener_capacity = slots;
        self
    }

    pub fn with_pref_cksum(mut self, cksum_type: CksumType) -> Self {
        self.pref_cksum = cksum_type;
        self
    }

    pub fn with_session_seed(mut self, seed: u16) -> Self {
        self.session_seed = seed;
        self
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig::new()
    }
}

// Session, handshake and capability state of one peer relationship.
struct LinkState {
    name: String,
    /// High bit of outbound session numbers; assigned by the handshake
    origin: bool,
    /// 15-bit session counter
    next_session: u16,
    /// Checksum this endpoint wants on frames addressed to it
    pref_cksum: CksumType,
    /// Checksum the peer asked for; used for outbound frames
    peer_pref_cksum: CksumType,
    /// Rx capacity advertised to the peer
    buffer_size: u16,
    /// Peer's advertised rx capacity; bounds outbound payloads
    peer_buffer_size: u16,
    hsk_status: HandshakeStatus,
    /// Session used by our own outstanding handshake request
    hsk_session: u16,
}

impl LinkState {
    fn hsk_payload(&self) -> [u8; HSK_PAYLOAD_LEN] {
        [
            self.pref_cksum as u8,
            (self.buffer_size & 0xff) as u8,
            (self.buffer_size >> 8) as u8,
        ]
    }
}

struct ListenerSlot<T, U> where T: Interface {
    session: u16,
    callback: Option<SessionListener<T, U>>,
}

/// Send-side handle over an endpoint.
///
/// Receive callbacks get one of these so they can reply while the received
/// payload is still borrowed from the receive buffer. All endpoint send
/// operations are implemented here; `Endpoint` forwards to them.
pub struct Responder<'r, 'a, T> where T: Interface {
    tx: &'r mut FrmTx<'a, T>,
    link: &'r mut LinkState,
}

impl<'r, 'a, T> Responder<'r, 'a, T> where T: Interface {
    /// Largest payload the peer can accept in one datagram.
    pub fn max_payload(&self) -> u16 {
        self.link.peer_buffer_size.saturating_sub(DG_HEADER_LEN)
    }

    fn next_session(&mut self) -> u16 {
        let sesn = self.link.next_session;

        self.link.next_session += 1;
        if self.link.next_session == 0x8000 {
            // overflow into the origin bit
            self.link.next_session = 0; // start from zero
        }

        sesn | (self.link.origin as u16) << 15 // add the origin bit
    }

    /// Start a datagram as a reply, in a peer-chosen session.
    pub fn start_response(&mut self, dg_type: u8, length: u16, session: u16) -> Result<(), Error> {
        let peer_accepts = self.max_payload();

        if length > peer_accepts {
            warn!(target: self.link.name.as_str(), "msg too long ({} B), peer accepts max {} B.",
                length, peer_accepts);
            return Err(Error::TooLong(length - peer_accepts));
        }

        dg_start(self.tx, self.link.peer_pref_cksum, session, dg_type, length)
    }

    /// Start a datagram in a new session; returns the session number.
    pub fn start_session(&mut self, dg_type: u8, length: u16) -> Result<u16, Error> {
        let sesn = self.next_session();
        self.start_response(dg_type, length, sesn)?;
        Ok(sesn)
    }

    /// Send one payload byte of the datagram in progress.
    pub fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.tx.send_byte(byte)
    }

    /// Send payload bytes of the datagram in progress; returns how many
    /// were taken.
    pub fn send_buffer(&mut self, buffer: &[u8]) -> u16 {
        self.tx.send_buffer(buffer)
    }

    /// Start a reply datagram and send the whole payload in one call.
    /// Returns the number of payload bytes sent.
    pub fn send_response(&mut self, dg_type: u8, buffer: &[u8], session: u16) -> Result<u16, Error> {
        let length = buffer.len().min(u16::MAX as usize) as u16;
        self.start_response(dg_type, length, session)?;
        Ok(self.send_buffer(buffer))
    }

    /// Send a message in a new session; returns (session, bytes sent).
    ///
    /// The session counter advances even when the send is refused, but
    /// nothing reaches the wire and no session number escapes.
    pub fn send_message(&mut self, dg_type: u8, buffer: &[u8]) -> Result<(u16, u16), Error> {
        let sesn = self.next_session();
        let length = buffer.len().min(u16::MAX as usize) as u16;
        self.start_response(dg_type, length, sesn)?;
        let sent = self.send_buffer(buffer);
        Ok((sesn, sent))
    }
}

/// One side of an SBMP connection.
///
/// Owns the framing layers, the session counter, the handshake state and
/// the listener table for one peer relationship. `T` is the byte sink the
/// endpoint transmits through, `U` the user application handed to receive
/// callbacks.
pub struct Endpoint<'a, 'b, T, U> where T: Interface {
    /// Transport the endpoint is wired to.
    pub hw_if: &'a T,
    /// Application
    pub app: &'b U,
    frm_rx: FrmRx,
    frm_tx: FrmTx<'a, T>,
    link: LinkState,
    listeners: Vec<ListenerSlot<T, U>>,
    /// Default handler for datagrams no listener claimed
    rx_handler: DatagramHandler<T, U>,
}

impl<'a, 'b, T, U> Endpoint<'a, 'b, T, U> where T: Interface {
    /// Construct an `Endpoint`.
    /// # Arguments
    /// * `name` - identifier string for the log output.
    /// * `hw_if` - Reference of the transport interface.
    /// * `app` - Reference of the application.
    /// * `config` - Buffer, listener and checksum configuration.
    /// * `rx_handler` - Callback. Handles incoming datagrams without a listener.
    pub fn new(
        name: String,
        hw_if: &'a T,
        app: &'b U,
        config: EndpointConfig,
        rx_handler: DatagramHandler<T, U>,
    ) -> Self {
        let mut pref_cksum = config.pref_cksum;
        if pref_cksum == CksumType::Crc32 && !HAS_CRC32 {
            warn!(target: name.as_str(), "CRC32 not avail, using XOR instead.");
            pref_cksum = CksumType::Xor;
        }
        let default_cksum = if HAS_CRC32 { CksumType::Crc32 } else { CksumType::Xor };

        let listeners = (0..config.listener_capacity)
            .map(|_| ListenerSlot {
                session: 0,
                callback: None,
            })
            .collect();

        let mut ep = Endpoint {
            hw_if: hw_if,
            app: app,
            frm_rx: FrmRx::new(name.clone(), config.buffer_size),
            frm_tx: FrmTx::new(name.clone(), hw_if),
            link: LinkState {
                name: name,
                origin: false,
                next_session: 0,
                pref_cksum: pref_cksum,
                peer_pref_cksum: default_cksum,
                buffer_size: config.buffer_size,
                peer_buffer_size: 0xffff,
                hsk_status: HandshakeStatus::NotStarted,
                hsk_session: 0,
            },
            listeners: listeners,
            rx_handler: rx_handler,
        };

        ep.reset();
        ep.seed_session(config.session_seed);
        ep
    }

    /// Discard all handshake and session state and re-initialize framing.
    ///
    /// Checksum preferences and the advertised buffer size survive.
    pub fn reset(&mut self) {
        self.link.next_session = 0;
        self.link.origin = false;

        self.link.hsk_session = 0;
        self.link.hsk_status = HandshakeStatus::NotStarted;

        self.link.peer_buffer_size = 0xffff; // max possible buffer

        self.frm_rx.reset();
        self.frm_tx.reset();
    }

    /// Set the session counter (good to randomize before the first message).
    pub fn seed_session(&mut self, sesn: u16) {
        self.link.next_session = sesn & 0x7fff;
    }

    /// Set the origin bit directly (bypass the handshake).
    pub fn set_origin(&mut self, bit: bool) {
        self.link.origin = bit;
    }

    /// Set the preferred checksum for frames addressed to this endpoint.
    pub fn set_preferred_cksum(&mut self, cksum_type: CksumType) {
        let mut cksum_type = cksum_type;
        if cksum_type == CksumType::Crc32 && !HAS_CRC32 {
            warn!(target: self.link.name.as_str(), "CRC32 not avail, using XOR instead.");
            cksum_type = CksumType::Xor;
        }
        self.link.pref_cksum = cksum_type;
    }

    pub fn name(&self) -> &str {
        self.link.name.as_str()
    }

    pub fn origin(&self) -> bool {
        self.link.origin
    }

    pub fn pref_cksum(&self) -> CksumType {
        self.link.pref_cksum
    }

    pub fn peer_pref_cksum(&self) -> CksumType {
        self.link.peer_pref_cksum
    }

    pub fn buffer_size(&self) -> u16 {
        self.link.buffer_size
    }

    pub fn peer_buffer_size(&self) -> u16 {
        self.link.peer_buffer_size
    }

    /// Enable or disable the receive side.
    pub fn enable_rx(&mut self, enable: bool) {
        self.frm_rx.enable(enable);
    }

    /// Enable or disable the transmit side.
    pub fn enable_tx(&mut self, enable: bool) {
        self.frm_tx.enable(enable);
    }

    /// Enable or disable both directions.
    pub fn enable(&mut self, enable: bool) {
        self.enable_rx(enable);
        self.enable_tx(enable);
    }

    fn responder(&mut self) -> Responder<'_, 'a, T> {
        Responder {
            tx: &mut self.frm_tx,
            link: &mut self.link,
        }
    }

    /// Largest payload the peer can accept in one datagram.
    pub fn max_payload(&self) -> u16 {
        self.link.peer_buffer_size.saturating_sub(DG_HEADER_LEN)
    }

    /// Start a datagram as a reply, in a peer-chosen session.
    pub fn start_response(&mut self, dg_type: u8, length: u16, session: u16) -> Result<(), Error> {
        self.responder().start_response(dg_type, length, session)
    }

    /// Start a datagram in a new session; returns the session number.
    pub fn start_session(&mut self, dg_type: u8, length: u16) -> Result<u16, Error> {
        self.responder().start_session(dg_type, length)
    }

    /// Send one payload byte of the datagram in progress.
    pub fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.frm_tx.send_byte(byte)
    }

    /// Send payload bytes of the datagram in progress; returns how many
    /// were taken.
    pub fn send_buffer(&mut self, buffer: &[u8]) -> u16 {
        self.frm_tx.send_buffer(buffer)
    }

    /// Start a reply datagram and send the whole payload in one call.
    pub fn send_response(&mut self, dg_type: u8, buffer: &[u8], session: u16) -> Result<u16, Error> {
        self.responder().send_response(dg_type, buffer, session)
    }

    /// Send a message in a new session; returns (session, bytes sent).
    pub fn send_message(&mut self, dg_type: u8, buffer: &[u8]) -> Result<(u16, u16), Error> {
        self.responder().send_message(dg_type, buffer)
    }

    /// Handshake progress so far.
    pub fn handshake_status(&self) -> HandshakeStatus {
        self.link.hsk_status
    }

    /// Start a handshake (origin bit arbitration).
    ///
    /// Sends a `DG_HSK_START` carrying this endpoint's preferred checksum
    /// and buffer size; the outcome arrives asynchronously and is visible
    /// through `handshake_status`. Any earlier handshake is aborted first.
    pub fn start_handshake(&mut self) -> Result<(), Error> {
        self.abort_handshake();

        let buf = self.link.hsk_payload();
        self.link.hsk_status = HandshakeStatus::AwaitReply;

        match self.responder().send_message(DG_HSK_START, &buf) {
            Ok((sesn, _)) => {
                self.link.hsk_session = sesn;
                Ok(())
            }
            Err(e) => {
                self.link.hsk_status = HandshakeStatus::NotStarted;
                Err(e)
            }
        }
    }

    /// Abort the current handshake and discard its session.
    pub fn abort_handshake(&mut self) {
        self.link.hsk_session = 0;
        self.link.hsk_status = HandshakeStatus::NotStarted;
    }

    /// Register a listener receiving all datagrams of a session.
    ///
    /// Takes the first free slot; on duplicate sessions the earliest
    /// registration wins.
    pub fn add_listener(&mut self, session: u16, callback: SessionListener<T, U>) -> Result<(), Error> {
        for slot in self.listeners.iter_mut() {
            if slot.callback.is_some() {
                continue; // skip used slot
            }
            slot.session = session;
            slot.callback = Some(callback);
            return Ok(());
        }
        Err(Error::NoListenerSlot)
    }

    /// Drop the first listener registered for a session.
    pub fn remove_listener(&mut self, session: u16) {
        for slot in self.listeners.iter_mut() {
            if slot.callback.is_none() {
                continue; // skip unused
            }
            if slot.session == session {
                slot.callback = None; // mark unused
                return;
            }
        }
    }

    /// Feed one received byte into the engine.
    ///
    /// Completed datagrams are dispatched synchronously from within this
    /// call: handshake control updates the handshake state, everything
    /// else goes to a matching listener or the default handler.
    pub fn receive(&mut self, byte: u8) {
        if self.frm_rx.receive(byte).is_some() {
            self.dispatch();
        }
    }

    /// Feed a batch of received bytes.
    pub fn poll(&mut self, buf: &[u8]) {
        for &byte in buf {
            self.receive(byte);
        }
    }

    fn dispatch(&mut self) {
        let dg_type;
        let session;
        let mut peer_info = [0u8; HSK_PAYLOAD_LEN];
        let mut has_peer_info = false;

        {
            let Endpoint {
                frm_rx,
                frm_tx,
                link,
                listeners,
                rx_handler,
                app,
                ..
            } = self;

            let dg = match Datagram::parse(frm_rx.frame_payload()) {
                Ok(dg) => dg,
                Err(_) => {
                    warn!(target: link.name.as_str(), "frame too short for a datagram, drop.");
                    return;
                }
            };

            match dg.dg_type {
                DG_HSK_START | DG_HSK_ACCEPT | DG_HSK_CONFLICT => {
                    // copy what the handshake needs, then let go of the
                    // receive buffer so the handshake may reset framing
                    dg_type = dg.dg_type;
                    session = dg.session;
                    if dg.payload.len() >= HSK_PAYLOAD_LEN {
                        peer_info.copy_from_slice(&dg.payload[..HSK_PAYLOAD_LEN]);
                        has_peer_info = true;
                    }
                }
                _ => {
                    debug!(target: link.name.as_str(), "incoming datagram session=0x{:04x}, type={}, payload len={}",
                        dg.session, dg.dg_type, dg.length());

                    let mut rsp = Responder {
                        tx: frm_tx,
                        link: link,
                    };

                    // try listeners first...
                    for slot in listeners.iter() {
                        if let Some(callback) = slot.callback {
                            if slot.session == dg.session {
                                callback(*app, &mut rsp, &dg);
                                return;
                            }
                        }
                    }

                    // if no listener consumed it, call the default handler
                    let handler = *rx_handler;
                    handler(*app, &mut rsp, &dg);
                    return;
                }
            }
        }

        self.handle_hsk_datagram(dg_type, session, has_peer_info, &peer_info);
    }

    /// Process handshake datagrams & update the handshake state accordingly.
    fn handle_hsk_datagram(
        &mut self,
        dg_type: u8,
        session: u16,
        has_peer_info: bool,
        peer_info: &[u8; HSK_PAYLOAD_LEN],
    ) {
        let our_info = self.link.hsk_payload();

        match dg_type {
            DG_HSK_START => {
                // peer requests origin
                info!(target: self.link.name.as_str(), "rx HSK request, session=0x{:04x}", session);

                if self.link.hsk_status == HandshakeStatus::AwaitReply {
                    // conflict occured - we're already waiting for a reply
                    let _ = self.responder().send_response(DG_HSK_CONFLICT, &our_info, session);
                    self.link.hsk_status = HandshakeStatus::Conflict;

                    warn!(target: self.link.name.as_str(), "HSK conflict");
                } else {
                    // we're idle, accept the request
                    let peer_origin = session & 0x8000 != 0;
                    self.link.origin = !peer_origin;

                    // read peer's info
                    if has_peer_info {
                        self.parse_peer_hsk_buf(peer_info);
                    }

                    self.link.hsk_status = HandshakeStatus::Success;

                    // Send Accept response
                    let _ = self.responder().send_response(DG_HSK_ACCEPT, &our_info, session);
                }
            }
            DG_HSK_ACCEPT => {
                // peer accepted our request
                info!(target: self.link.name.as_str(), "rx HSK accept");

                if self.link.hsk_status != HandshakeStatus::AwaitReply
                    || self.link.hsk_session != session
                {
                    // but we didn't send any request
                    warn!(target: self.link.name.as_str(), "rx unexpected HSK accept, ignoring.");
                } else {
                    // OK, we were waiting for this reply
                    if has_peer_info {
                        self.parse_peer_hsk_buf(peer_info);
                    }

                    self.link.hsk_status = HandshakeStatus::Success;
                }
            }
            DG_HSK_CONFLICT => {
                // peer rejected our request due to conflict
                info!(target: self.link.name.as_str(), "rx HSK conflict");

                if self.link.hsk_status != HandshakeStatus::AwaitReply
                    || self.link.hsk_session != session
                {
                    warn!(target: self.link.name.as_str(), "rx unexpected HSK conflict, ignoring.");
                } else {
                    // acknowledge the conflict; framing starts over clean
                    self.frm_rx.reset();
                    self.frm_tx.reset();

                    self.link.hsk_session = 0;
                    self.link.hsk_status = HandshakeStatus::Conflict;
                }
            }
            _ => {}
        }
    }

    /// Parse peer info from a received handshake payload.
    fn parse_peer_hsk_buf(&mut self, buf: &[u8; HSK_PAYLOAD_LEN]) {
        match CksumType::from_u8(buf[0]) {
            Some(kind) => self.link.peer_pref_cksum = kind,
            None => {
                warn!(target: self.link.name.as_str(), "peer pref cksum 0x{:02x} unknown, using XOR.", buf[0]);
                self.link.peer_pref_cksum = CksumType::Xor;
            }
        }
        self.link.peer_buffer_size = buf[1] as u16 | (buf[2] as u16) << 8;

        info!(target: self.link.name.as_str(), "HSK success, peer buf {}, pref cksum {:?}",
            self.link.peer_buffer_size, self.link.peer_pref_cksum);

        // check if the checksum is available
        if self.link.peer_pref_cksum == CksumType::Crc32 && !HAS_CRC32 {
            warn!(target: self.link.name.as_str(), "CRC32 not avail, using XOR as peer's pref cksum.");
            self.link.peer_pref_cksum = CksumType::Xor;
        }
    }
}
