use crate::datagram::Datagram;
use crate::endpoint::Endpoint;
use crate::interface::Interface;
use crate::Error;

/// Length of the chunk-0 header: total transfer length, LE u32.
pub const BULK_HEADER_LEN: usize = 4;

/// Sending side of a bulk transfer.
///
/// Splits a payload too large for a single frame into chunks sized to the
/// peer's capacity, all sharing one session so the receiver can reassemble
/// through a listener. Chunk 0 announces the total length; the following
/// chunks carry consecutive raw segments. No acks, no reordering.
pub struct BulkTx<'d> {
    session: u16,
    dg_type: u8,
    data: &'d [u8],
    offset: usize,
}

impl<'d> BulkTx<'d> {
    /// Announce a transfer: sends chunk 0 in a new session.
    ///
    /// The receiver is expected to register a listener for the returned
    /// handle's session and feed it the data chunks.
    pub fn offer<T, U>(
        ep: &mut Endpoint<'_, '_, T, U>,
        dg_type: u8,
        data: &'d [u8],
    ) -> Result<BulkTx<'d>, Error>
    where
        T: Interface,
    {
        if data.len() > u32::MAX as usize {
            return Err(Error::TooLong(u16::MAX));
        }
        let total = data.len() as u32;
        let header = [
            total as u8,
            (total >> 8) as u8,
            (total >> 16) as u8,
            (total >> 24) as u8,
        ];

        let (session, _) = ep.send_message(dg_type, &header)?;
        Ok(BulkTx {
            session: session,
            dg_type: dg_type,
            data: data,
            offset: 0,
        })
    }

    /// Send the next data chunk; returns `Ok(true)` once the whole
    /// payload went out.
    pub fn send_chunk<T, U>(&mut self, ep: &mut Endpoint<'_, '_, T, U>) -> Result<bool, Error>
    where
        T: Interface,
    {
        if self.offset >= self.data.len() {
            return Ok(true);
        }

        // at least one byte per chunk, so a tiny peer buffer surfaces as
        // a TooLong refusal instead of an endless loop
        let max = (ep.max_payload() as usize).max(1);
        let end = (self.offset + max).min(self.data.len());

        ep.send_response(self.dg_type, &self.data[self.offset..end], self.session)?;
        self.offset = end;
        Ok(self.offset >= self.data.len())
    }

    pub fn session(&self) -> u16 {
        self.session
    }

    /// Bytes not yet sent.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

/// Receiving side of a bulk transfer.
///
/// Built from the announcement datagram (chunk 0), then fed every further
/// datagram of the same session until the declared total has arrived.
pub struct BulkRx {
    session: u16,
    total: u32,
    data: Vec<u8>,
}

impl BulkRx {
    /// Begin a transfer from its announcement datagram.
    pub fn begin(dg: &Datagram<'_>) -> Result<BulkRx, Error> {
        if dg.payload.len() < BULK_HEADER_LEN {
            return Err(Error::BadBulkHeader);
        }
        let total = dg.payload[0] as u32
            | (dg.payload[1] as u32) << 8
            | (dg.payload[2] as u32) << 16
            | (dg.payload[3] as u32) << 24;

        Ok(BulkRx {
            session: dg.session,
            total: total,
            data: Vec::new(),
        })
    }

    /// Feed a data chunk; returns `true` when the transfer completed.
    ///
    /// Datagrams of other sessions are ignored; bytes past the declared
    /// total are discarded.
    pub fn receive(&mut self, dg: &Datagram<'_>) -> bool {
        if dg.session == self.session {
            let remaining = (self.total as usize).saturating_sub(self.data.len());
            let take = dg.payload.len().min(remaining);
            self.data.extend_from_slice(&dg.payload[..take]);
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.total as usize
    }

    pub fn session(&self) -> u16 {
        self.session
    }

    /// Total length declared by the sender.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
