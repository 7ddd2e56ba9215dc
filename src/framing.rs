use crate::checksum::{Checksum, CksumType, HAS_CRC32};
use crate::interface::Interface;
use crate::Error;
use log::{trace, warn};

/// Start-of-frame marker.
pub const SOF_BYTE: u8 = 0x01;

/// Receiving state machine
pub enum RxState {
    SearchingForSof,
    ReceivingCksumType,
    ReceivingLengthLo,
    ReceivingLengthHi,
    ReceivingPayload,
    ReceivingChecksum,
}

/// Receive half of the framing layer.
///
/// Consumes the wire one byte at a time and owns the payload buffer.
/// Every rejection (bad SOF, unknown checksum tag, overlong length, trailer
/// mismatch) resynchronizes to `SearchingForSof` and keeps consuming.
pub struct FrmRx {
    name: String,
    enabled: bool,
    /// Largest payload the buffer can hold; longer frames are dropped
    buffer_size: u16,
    /// State of receiver
    state: RxState,
    /// Payload received so far
    buf: Vec<u8>,
    /// Checksum type tag of the frame being received
    cksum_type: CksumType,
    /// Calculated checksum for the receiving frame
    cksum: Checksum,
    /// Payload length announced by the frame header
    frame_length: u16,
    /// Number of payload bytes received so far
    payload_bytes: u16,
    /// Checksum received over the wire, accumulated LSB first
    frame_cksum: u32,
    /// Number of trailer bytes received so far
    cksum_bytes_seen: u8,
}

impl FrmRx {
    pub fn new(name: String, buffer_size: u16) -> Self {
        FrmRx {
            name: name,
            enabled: true,
            buffer_size: buffer_size,
            state: RxState::SearchingForSof,
            buf: vec![0; buffer_size as usize],
            cksum_type: CksumType::None,
            cksum: Checksum::new(CksumType::None),
            frame_length: 0,
            payload_bytes: 0,
            frame_cksum: 0,
            cksum_bytes_seen: 0,
        }
    }

    /// Drop any frame in progress and return to searching for a SOF.
    pub fn reset(&mut self) {
        self.state = RxState::SearchingForSof;
        self.frame_length = 0;
        self.payload_bytes = 0;
        self.frame_cksum = 0;
        self.cksum_bytes_seen = 0;
    }

    pub fn enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    /// Payload of the frame that just completed.
    ///
    /// Valid after `receive` returned `Some(len)`, until the next byte is
    /// fed in. Copy the bytes out to keep them longer.
    pub fn frame_payload(&self) -> &[u8] {
        &self.buf[..self.frame_length as usize]
    }

    /// Handle one received byte.
    ///
    /// Returns `Some(payload_length)` when the byte completed a verified
    /// frame, `None` otherwise. Never blocks, never fails: corrupt input
    /// only ever causes a silent resync.
    pub fn receive(&mut self, byte: u8) -> Option<u16> {
        if !self.enabled {
            self.state = RxState::SearchingForSof;
            return None;
        }

        match self.state {
            RxState::SearchingForSof => {
                if byte == SOF_BYTE {
                    self.state = RxState::ReceivingCksumType;
                }
                // anything else is inter-frame noise
            }
            RxState::ReceivingCksumType => match CksumType::from_u8(byte) {
                Some(kind) => {
                    self.cksum_type = kind;
                    self.cksum = Checksum::new(kind);
                    self.state = RxState::ReceivingLengthLo;
                }
                None => {
                    warn!(target: self.name.as_str(), "unknown cksum type 0x{:02x}, drop this frame.", byte);
                    self.state = RxState::SearchingForSof;
                }
            },
            RxState::ReceivingLengthLo => {
                self.frame_length = byte as u16;
                self.state = RxState::ReceivingLengthHi;
            }
            RxState::ReceivingLengthHi => {
                self.frame_length |= (byte as u16) << 8;
                self.payload_bytes = 0;
                if self.frame_length > self.buffer_size {
                    // Frame dropped because it's longer than any frame we can buffer
                    warn!(target: self.name.as_str(), "frame too long ({} B > {} B buffer), drop this frame.",
                        self.frame_length, self.buffer_size);
                    self.state = RxState::SearchingForSof;
                } else if self.frame_length == 0 {
                    return self.begin_trailer();
                } else {
                    self.state = RxState::ReceivingPayload;
                }
            }
            RxState::ReceivingPayload => {
                self.buf[self.payload_bytes as usize] = byte;
                self.payload_bytes += 1;
                self.cksum.step(byte);
                if self.payload_bytes == self.frame_length {
                    return self.begin_trailer();
                }
            }
            RxState::ReceivingChecksum => {
                self.frame_cksum |= (byte as u32) << (8 * self.cksum_bytes_seen as u32);
                self.cksum_bytes_seen += 1;
                if u16::from(self.cksum_bytes_seen) == self.cksum_type.trailer_len() {
                    return self.check_frame();
                }
            }
        }
        None
    }

    fn begin_trailer(&mut self) -> Option<u16> {
        if self.cksum_type.trailer_len() == 0 {
            self.state = RxState::SearchingForSof;
            return Some(self.frame_length);
        }
        self.frame_cksum = 0;
        self.cksum_bytes_seen = 0;
        self.state = RxState::ReceivingChecksum;
        None
    }

    fn check_frame(&mut self) -> Option<u16> {
        self.state = RxState::SearchingForSof;

        if self.cksum_type == CksumType::Crc32 && !HAS_CRC32 {
            // accepted passively, trailer cannot be verified
            return Some(self.frame_length);
        }

        let computed = self.cksum.finalize();
        if computed != self.frame_cksum {
            // Frame fails the checksum and so is dropped
            warn!(target: self.name.as_str(), "cksum error (wire 0x{:08x}, computed 0x{:08x}), drop this frame.",
                self.frame_cksum, computed);
            None
        } else {
            Some(self.frame_length)
        }
    }
}

/// Transmit half of the framing layer.
///
/// Emits the frame preamble, streams payload bytes through the byte sink
/// while keeping a running checksum, and appends the trailer on the final
/// payload byte.
pub struct FrmTx<'a, T> where T: Interface {
    name: String,
    hw_if: &'a T,
    enabled: bool,
    /// Checksum type of the frame being sent
    cksum_type: CksumType,
    /// Calculated checksum for the sending frame
    cksum: Checksum,
    /// Payload bytes still owed to the open frame
    remaining: u16,
    in_progress: bool,
}

impl<'a, T> FrmTx<'a, T> where T: Interface {
    pub fn new(name: String, hw_if: &'a T) -> Self {
        FrmTx {
            name: name,
            hw_if: hw_if,
            enabled: true,
            cksum_type: CksumType::None,
            cksum: Checksum::new(CksumType::None),
            remaining: 0,
            in_progress: false,
        }
    }

    /// Abandon a frame in progress, if any.
    pub fn reset(&mut self) {
        self.in_progress = false;
        self.remaining = 0;
    }

    pub fn enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Emit SOF, checksum type and payload length, and open the frame.
    ///
    /// The caller owes exactly `payload_len` bytes via `send_byte` /
    /// `send_buffer`; the trailer goes out with the last of them.
    pub fn begin_frame(&mut self, cksum_type: CksumType, payload_len: u16) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::TxDisabled);
        }
        if self.in_progress {
            warn!(target: self.name.as_str(), "frame already in progress, refusing to start another.");
            return Err(Error::TxBusy);
        }

        trace!(target: self.name.as_str(), "tx frame: cksum={:?}, payload_len={}", cksum_type, payload_len);

        self.cksum_type = cksum_type;
        self.cksum = Checksum::new(cksum_type);
        self.remaining = payload_len;
        self.in_progress = true;

        self.tx_raw(SOF_BYTE);
        self.tx_raw(cksum_type as u8);
        self.tx_raw((payload_len & 0xff) as u8);
        self.tx_raw((payload_len >> 8) as u8);

        if payload_len == 0 {
            self.finish_frame();
        }
        Ok(())
    }

    /// Send one payload byte of the open frame.
    pub fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::TxDisabled);
        }
        if !self.in_progress {
            return Err(Error::TxIdle);
        }

        self.tx_raw(byte);
        self.cksum.step(byte);
        self.remaining -= 1;
        if self.remaining == 0 {
            self.finish_frame();
        }
        Ok(())
    }

    /// Send payload bytes of the open frame; returns how many were taken.
    pub fn send_buffer(&mut self, buffer: &[u8]) -> u16 {
        let mut sent: u16 = 0;
        for &byte in buffer {
            if self.send_byte(byte).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    }

    fn finish_frame(&mut self) {
        let checksum = self.cksum.finalize();
        match self.cksum_type {
            CksumType::None => {}
            CksumType::Xor => {
                self.tx_raw(checksum as u8);
            }
            CksumType::Crc32 => {
                // little-endian trailer
                self.tx_raw(checksum as u8 & 0xff);
                self.tx_raw((checksum >> 8) as u8 & 0xff);
                self.tx_raw((checksum >> 16) as u8 & 0xff);
                self.tx_raw((checksum >> 24) as u8 & 0xff);
            }
        }
        self.in_progress = false;
    }

    fn tx_raw(&self, byte: u8) {
        if !self.hw_if.tx_byte(byte) {
            warn!(target: self.name.as_str(), "tx byte lost on the wire.");
        }
    }
}
