//! Datagram header
//!
//! Every datagram starts with a fixed 20-byte header followed by one
//! fragment of a frame payload:
//!
//! ```text
//! offset  size  field
//!      0     8  timestamp_us   i64  sender clock when the frame was sent
//!      8     4  frame_id       u32
//!     12     4  frame_bytes    u32  size of the whole reassembled payload
//!     16     2  packet_index   u16
//!     18     2  packet_count   u16
//! ```
//!
//! Fields use host byte order like every other record in this crate.

use crate::error::NetworkError;
use crate::io::{self, BinaryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub timestamp_us: i64,
    pub frame_id: u32,
    pub frame_bytes: u32,
    pub packet_index: u16,
    pub packet_count: u16,
}

impl PacketHeader {
    /// Encoded header size in bytes
    pub const SIZE: usize = 20;

    /// Parse and validate the header at the start of `datagram`
    pub fn parse(datagram: &[u8]) -> Result<Self, NetworkError> {
        if datagram.len() < Self::SIZE {
            return Err(NetworkError::InvalidPacket("datagram shorter than header"));
        }

        let mut header = Self::default();
        let mut offset = 0;
        header.init_from_data(datagram, &mut offset);

        if header.packet_count == 0 {
            return Err(NetworkError::InvalidPacket("zero packet count"));
        }
        if header.packet_index >= header.packet_count {
            return Err(NetworkError::InvalidPacket("packet index out of range"));
        }
        Ok(header)
    }
}

impl BinaryRecord for PacketHeader {
    fn total_data_size(&self) -> usize {
        Self::SIZE
    }

    fn init_from_data(&mut self, data: &[u8], offset: &mut usize) {
        if offset.saturating_add(Self::SIZE) > data.len() {
            return;
        }
        io::read(&mut self.timestamp_us, data, offset);
        io::read(&mut self.frame_id, data, offset);
        io::read(&mut self.frame_bytes, data, offset);
        io::read(&mut self.packet_index, data, offset);
        io::read(&mut self.packet_count, data, offset);
    }

    fn write_to_data(&self, data: &mut [u8], offset: &mut usize) {
        if offset.saturating_add(Self::SIZE) > data.len() {
            return;
        }
        io::write(self.timestamp_us, data, offset);
        io::write(self.frame_id, data, offset);
        io::write(self.frame_bytes, data, offset);
        io::write(self.packet_index, data, offset);
        io::write(self.packet_count, data, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(index: u16, count: u16) -> PacketHeader {
        PacketHeader {
            timestamp_us: 1_700_000_000_000,
            frame_id: 42,
            frame_bytes: 12_000,
            packet_index: index,
            packet_count: count,
        }
    }

    #[test]
    fn test_parse_encoded_header() {
        let mut datagram = header(1, 2).to_bytes();
        datagram.extend_from_slice(b"payload");
        assert_eq!(datagram.len(), PacketHeader::SIZE + 7);
        assert_eq!(PacketHeader::parse(&datagram).unwrap(), header(1, 2));
    }

    #[test]
    fn test_short_datagram_rejected() {
        let datagram = header(0, 1).to_bytes();
        assert!(PacketHeader::parse(&datagram[..PacketHeader::SIZE - 1]).is_err());
    }

    #[test]
    fn test_bad_counts_rejected() {
        assert!(PacketHeader::parse(&header(0, 0).to_bytes()).is_err());
        assert!(PacketHeader::parse(&header(3, 3).to_bytes()).is_err());
    }
}
