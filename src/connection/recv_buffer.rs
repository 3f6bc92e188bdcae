use std::io::Cursor;

use binrw::BinRead;

use crate::packets::netbios::{NbssPacketHeader, NbssPacketType};

/// A classified inbound session packet.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionPacket {
    /// NetBIOS keep-alive; ignored.
    KeepAlive,
    /// Positive session response; ignored (session setup already read
    /// its own response).
    PositiveResponse,
    /// Negative session response; fatal.
    NegativeResponse,
    /// One SMB message.
    Message(Vec<u8>),
}

/// Accumulates raw socket bytes and yields complete session packets.
/// Allocated once per connection and reused for its lifetime.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    buffer: Vec<u8>,
}

impl RecvBuffer {
    pub fn new() -> Self {
        RecvBuffer::default()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn packet_length(&self) -> Option<usize> {
        if self.buffer.len() < NbssPacketHeader::SIZE {
            return None;
        }
        let length = u32::from_be_bytes([0, self.buffer[1], self.buffer[2], self.buffer[3]]);
        Some(length as usize)
    }

    pub fn has_complete_packet(&self) -> bool {
        match self.packet_length() {
            Some(length) => self.buffer.len() >= NbssPacketHeader::SIZE + length,
            None => false,
        }
    }

    /// Removes and classifies the next packet. A header that does not
    /// parse is a protocol error and must tear the connection down.
    pub fn dequeue_packet(&mut self) -> crate::Result<Option<SessionPacket>> {
        if !self.has_complete_packet() {
            return Ok(None);
        }
        let header = NbssPacketHeader::read(&mut Cursor::new(&self.buffer))?;
        let total = NbssPacketHeader::SIZE + header.length as usize;
        let payload = self.buffer[NbssPacketHeader::SIZE..total].to_vec();
        self.buffer.drain(..total);

        let packet = match header.ptype {
            NbssPacketType::SessionKeepAlive => SessionPacket::KeepAlive,
            NbssPacketType::PositiveSessionResponse => SessionPacket::PositiveResponse,
            NbssPacketType::NegativeSessionResponse => SessionPacket::NegativeResponse,
            NbssPacketType::SessionMessage => SessionPacket::Message(payload),
            other => {
                return Err(crate::Error::InvalidMessage(format!(
                    "Unexpected session packet from server: {other:?}"
                )))
            }
        };
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_assembly() {
        let mut buf = RecvBuffer::new();
        buf.append(&[0x00, 0x00]);
        assert!(!buf.has_complete_packet());
        buf.append(&[0x00, 0x03, 0xAA, 0xBB]);
        assert!(!buf.has_complete_packet());
        buf.append(&[0xCC]);
        assert!(buf.has_complete_packet());
        assert_eq!(
            buf.dequeue_packet().unwrap(),
            Some(SessionPacket::Message(vec![0xAA, 0xBB, 0xCC]))
        );
        assert_eq!(buf.dequeue_packet().unwrap(), None);
    }

    #[test]
    fn test_multiple_packets_in_one_read() {
        let mut buf = RecvBuffer::new();
        buf.append(&[
            0x85, 0x00, 0x00, 0x00, // keep-alive
            0x00, 0x00, 0x00, 0x01, 0x42, // message
        ]);
        assert_eq!(buf.dequeue_packet().unwrap(), Some(SessionPacket::KeepAlive));
        assert_eq!(
            buf.dequeue_packet().unwrap(),
            Some(SessionPacket::Message(vec![0x42]))
        );
    }

    #[test]
    fn test_unknown_packet_type_is_fatal() {
        let mut buf = RecvBuffer::new();
        buf.append(&[0x77, 0x00, 0x00, 0x00]);
        assert!(buf.dequeue_packet().is_err());
    }

    #[test]
    fn test_negative_response() {
        let mut buf = RecvBuffer::new();
        buf.append(&[0x83, 0x00, 0x00, 0x01, 0x82]);
        assert_eq!(
            buf.dequeue_packet().unwrap(),
            Some(SessionPacket::NegativeResponse)
        );
    }
}
