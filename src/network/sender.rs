//! Fragmenting frame sender
//!
//! Splits each payload into datagrams of at most `max_datagram_size`
//! bytes, header included, all sharing one frame id. Frame ids increase by
//! one per payload and wrap around.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use super::header::PacketHeader;
use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::frame::CompressedFrame;
use crate::io::BinaryRecord;

pub struct FrameSender {
    socket: UdpSocket,
    target: SocketAddr,
    max_datagram_size: usize,
    next_frame_id: u32,
    /// Datagram buffer (reused to avoid allocations)
    buffer: Vec<u8>,
    frames_sent: u64,
    datagrams_sent: u64,
    bytes_sent: u64,
    send_errors: u64,
}

impl FrameSender {
    pub fn new(
        target: SocketAddr,
        max_datagram_size: usize,
        send_buffer_size: usize,
    ) -> Result<Self, NetworkError> {
        if max_datagram_size <= PacketHeader::SIZE {
            return Err(NetworkError::PayloadTooLarge(PacketHeader::SIZE));
        }

        let local = match target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP))
            .map_err(NetworkError::SocketOption)?;
        if let Err(e) = socket.set_send_buffer_size(send_buffer_size) {
            tracing::warn!("Failed to set send buffer size: {}", e);
        }
        socket
            .bind(&local.into())
            .map_err(|source| NetworkError::BindFailed {
                address: local,
                source,
            })?;

        tracing::info!("Frame sender targeting {}", target);
        Ok(Self {
            socket: socket.into(),
            target,
            max_datagram_size,
            next_frame_id: 0,
            buffer: Vec::with_capacity(max_datagram_size),
            frames_sent: 0,
            datagrams_sent: 0,
            bytes_sent: 0,
            send_errors: 0,
        })
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self, NetworkError> {
        Self::new(config.target, config.max_datagram_size, config.send_buffer_size)
    }

    /// Serialize and send a compressed frame, returns the frame id used
    pub fn send_frame(&mut self, cframe: &CompressedFrame) -> Result<u32, NetworkError> {
        let payload = cframe.write_to_data();
        self.send_payload(&payload, cframe.capture_ts_us())
    }

    /// Send one payload as a run of datagrams, returns the frame id used
    pub fn send_payload(&mut self, payload: &[u8], timestamp_us: i64) -> Result<u32, NetworkError> {
        let chunk_size = self.max_datagram_size - PacketHeader::SIZE;
        let packet_count = payload.len().div_ceil(chunk_size).max(1);
        let frame_bytes = u32::try_from(payload.len())
            .map_err(|_| NetworkError::PayloadTooLarge(payload.len()))?;
        let packet_count = u16::try_from(packet_count)
            .map_err(|_| NetworkError::PayloadTooLarge(payload.len()))?;

        let frame_id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1);

        let mut header = PacketHeader {
            timestamp_us,
            frame_id,
            frame_bytes,
            packet_index: 0,
            packet_count,
        };
        let mut chunks = payload.chunks(chunk_size);
        for index in 0..packet_count {
            let chunk = chunks.next().unwrap_or(&[]);
            header.packet_index = index;

            self.buffer.clear();
            self.buffer.resize(PacketHeader::SIZE, 0);
            let mut offset = 0;
            header.write_to_data(&mut self.buffer, &mut offset);
            self.buffer.extend_from_slice(chunk);

            match self.socket.send_to(&self.buffer, self.target) {
                Ok(sent) => {
                    self.datagrams_sent += 1;
                    self.bytes_sent += sent as u64;
                }
                Err(e) => {
                    self.send_errors += 1;
                    return Err(NetworkError::SendFailed(format!(
                        "frame {} packet {}/{}: {}",
                        frame_id, index, packet_count, e
                    )));
                }
            }
        }

        self.frames_sent += 1;
        Ok(frame_id)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.socket.local_addr().map_err(NetworkError::SocketOption)
    }

    /// Get statistics
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            frames_sent: self.frames_sent,
            datagrams_sent: self.datagrams_sent,
            bytes_sent: self.bytes_sent,
            send_errors: self.send_errors,
        }
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.frames_sent = 0;
        self.datagrams_sent = 0;
        self.bytes_sent = 0;
        self.send_errors = 0;
    }
}

/// Sender statistics
#[derive(Debug, Clone, Default)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::events::ReaderEventKind;
    use crate::network::reader::{ReaderOptions, UdpReader};
    use std::time::Duration;

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        socket
    }

    #[test]
    fn test_fragments_respect_datagram_size() {
        let rx = receiver();
        let mut sender = FrameSender::new(rx.local_addr().unwrap(), 64, 65_536).unwrap();
        let payload: Vec<u8> = (0..100u8).collect();
        assert_eq!(sender.send_payload(&payload, 7).unwrap(), 0);

        let mut buf = [0u8; 128];
        let mut reassembled = Vec::new();
        for expected_index in 0..3u16 {
            let (len, _) = rx.recv_from(&mut buf).unwrap();
            assert!(len <= 64);
            let header = PacketHeader::parse(&buf[..len]).unwrap();
            assert_eq!(header.packet_count, 3);
            assert_eq!(header.packet_index, expected_index);
            assert_eq!(header.frame_bytes, 100);
            reassembled.extend_from_slice(&buf[PacketHeader::SIZE..len]);
        }
        assert_eq!(reassembled, payload);

        let stats = sender.stats();
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(stats.datagrams_sent, 3);
    }

    #[test]
    fn test_frame_ids_increase() {
        let rx = receiver();
        let mut sender = FrameSender::new(rx.local_addr().unwrap(), 1_000, 65_536).unwrap();
        assert_eq!(sender.send_payload(b"a", 0).unwrap(), 0);
        assert_eq!(sender.send_payload(b"", 0).unwrap(), 1);
        assert_eq!(sender.send_payload(b"c", 0).unwrap(), 2);

        let mut buf = [0u8; 64];
        let (len, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(len, PacketHeader::SIZE + 1);
        let (len, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(len, PacketHeader::SIZE);
        assert_eq!(PacketHeader::parse(&buf[..len]).unwrap().packet_count, 1);
    }

    #[test]
    fn test_datagram_size_must_exceed_header() {
        let target: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert!(FrameSender::new(target, PacketHeader::SIZE, 0).is_err());
    }

    #[test]
    fn test_compressed_frame_reaches_reader() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut reader = UdpReader::new(
            0,
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            ReaderOptions::default(),
            tx,
        );
        let addr = reader.enable_reading(0).unwrap();

        let cframe = CompressedFrame {
            id: 12,
            capture_ts_us: 3_000,
            ..Default::default()
        };
        let mut sender = FrameSender::new(addr, 9_000, 65_536).unwrap();
        sender.send_frame(&cframe).unwrap();

        let data = loop {
            let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if let ReaderEventKind::Payload { data, timestamp_us, .. } = event.kind {
                assert_eq!(timestamp_us, 3_000);
                break data;
            }
        };
        let parsed = CompressedFrame::init_from_data(&data).unwrap();
        assert_eq!(parsed.id(), 12);
        reader.disable_reading();
    }
}
