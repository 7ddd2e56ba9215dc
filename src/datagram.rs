use crate::checksum::CksumType;
use crate::framing::FrmTx;
use crate::interface::Interface;
use crate::Error;

/// Datagram header length - 2 B session, 1 B type
pub const DG_HEADER_LEN: u16 = 3;

/// A typed, session-correlated message carried in one frame's payload.
///
/// The payload borrows the framing layer's receive buffer and is valid
/// only for the duration of the receive callback; copy it out to keep it.
pub struct Datagram<'p> {
    /// Session number. Bit 15 is the origin bit.
    pub session: u16,
    /// Datagram type ID. Values 0-3 are reserved for handshake control.
    pub dg_type: u8,
    /// User payload.
    pub payload: &'p [u8],
}

impl<'p> Datagram<'p> {
    /// Parse a received frame payload into a datagram view.
    pub fn parse(buf: &'p [u8]) -> Result<Datagram<'p>, Error> {
        if buf.len() < DG_HEADER_LEN as usize {
            return Err(Error::ShortDatagram);
        }
        Ok(Datagram {
            session: buf[0] as u16 | (buf[1] as u16) << 8,
            dg_type: buf[2],
            payload: &buf[DG_HEADER_LEN as usize..],
        })
    }

    /// Payload length in bytes.
    pub fn length(&self) -> u16 {
        self.payload.len() as u16
    }
}

/// Begin a datagram on the framing layer.
///
/// Opens a frame sized for `payload_len` plus the datagram header and
/// writes session and type; the caller streams the payload afterwards.
pub fn dg_start<T>(
    tx: &mut FrmTx<T>,
    cksum_type: CksumType,
    session: u16,
    dg_type: u8,
    payload_len: u16,
) -> Result<(), Error>
where
    T: Interface,
{
    let frame_len = match payload_len.checked_add(DG_HEADER_LEN) {
        Some(len) => len,
        None => return Err(Error::TooLong(payload_len - (u16::MAX - DG_HEADER_LEN))),
    };
    tx.begin_frame(cksum_type, frame_len)?;
    tx.send_byte((session & 0xff) as u8)?;
    tx.send_byte((session >> 8) as u8)?;
    tx.send_byte(dg_type)?;
    Ok(())
}
