//! Per-interface UDP reader
//!
//! A reader owns one socket bound to `interface:port` and one receive
//! thread. The socket read timeout doubles as the watchdog: every timeout
//! emits [`ReaderEventKind::Timeout`] and the loop simply waits again.
//! Disabling shuts the socket's read side down so a blocked receive
//! returns at once.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::events::{EventSink, ReaderEvent, ReaderEventKind, ReaderState};
use super::header::PacketHeader;
use super::reassembly::{Fragment, Reassembler};
use crate::config::NetworkConfig;
use crate::constants;
use crate::error::NetworkError;

/// Socket and watchdog settings shared by every reader of a manager
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub watchdog_timeout: Duration,
    pub receive_buffer_size: usize,
    pub max_datagram_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            watchdog_timeout: Duration::from_millis(constants::DEFAULT_WATCHDOG_TIMEOUT_MS),
            receive_buffer_size: constants::DEFAULT_RECEIVE_BUFFER_SIZE,
            max_datagram_size: constants::MAX_DATAGRAM_SIZE,
        }
    }
}

impl ReaderOptions {
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            // a zero read timeout would mean "block forever"
            watchdog_timeout: Duration::from_millis(config.watchdog_timeout_ms.max(1)),
            receive_buffer_size: config.receive_buffer_size,
            max_datagram_size: config.max_datagram_size,
        }
    }
}

#[derive(Default)]
struct Counters {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    frames_completed: AtomicU64,
    frames_dropped: AtomicU64,
    timeouts: AtomicU64,
    invalid_packets: AtomicU64,
    late_packets: AtomicU64,
    duplicate_packets: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reader statistics
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    pub datagrams: u64,
    pub bytes: u64,
    pub frames_completed: u64,
    pub frames_dropped: u64,
    pub timeouts: u64,
    pub invalid_packets: u64,
    pub late_packets: u64,
    pub duplicate_packets: u64,
}

/// UDP reader for one network interface
pub struct UdpReader {
    index: usize,
    address: IpAddr,
    options: ReaderOptions,
    state: Arc<Mutex<ReaderState>>,
    running: Arc<AtomicBool>,
    socket: Option<Arc<UdpSocket>>,
    local_addr: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
    events: EventSink,
    counters: Arc<Counters>,
}

impl UdpReader {
    pub fn new(
        index: usize,
        address: IpAddr,
        options: ReaderOptions,
        events: Sender<ReaderEvent>,
    ) -> Self {
        Self {
            index,
            address,
            options,
            state: Arc::new(Mutex::new(ReaderState::Disabled)),
            running: Arc::new(AtomicBool::new(false)),
            socket: None,
            local_addr: None,
            worker: None,
            events: EventSink::new(index, events),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Bind `address:port` and start the receive thread
    ///
    /// On failure an error event is emitted and the reader stays disabled.
    /// An already enabled reader is rebound.
    pub fn enable_reading(&mut self, port: u16) -> Result<SocketAddr, NetworkError> {
        self.disable_reading();
        *self.state.lock() = ReaderState::Enabling;

        let bind_addr = SocketAddr::new(self.address, port);
        let socket = match bind_socket(bind_addr, &self.options) {
            Ok(socket) => Arc::new(socket),
            Err(e) => return Err(self.fail_enable(e)),
        };
        self.start(socket)
    }

    /// Publish `socket` as reading and spawn its receive thread
    fn start(&mut self, socket: Arc<UdpSocket>) -> Result<SocketAddr, NetworkError> {
        let local_addr = match socket.local_addr() {
            Ok(addr) => addr,
            Err(e) => return Err(self.fail_enable(NetworkError::SocketOption(e))),
        };

        // the receive thread may move the state to Error as soon as it runs
        self.socket = Some(socket.clone());
        self.local_addr = Some(local_addr);
        *self.state.lock() = ReaderState::Reading;
        tracing::info!("Interface {} reading on {}", self.index, local_addr);
        self.events.emit(ReaderEventKind::ConnectionState(true));
        self.events
            .emit(ReaderEventKind::Message(format!("Reading on {}", local_addr)));

        self.running.store(true, Ordering::SeqCst);
        let ctx = LoopContext {
            socket,
            running: self.running.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
            counters: self.counters.clone(),
            max_datagram_size: self.options.max_datagram_size,
        };
        let worker = thread::Builder::new()
            .name(format!("udp-reader-{}", self.index))
            .spawn(move || receive_loop(ctx));
        match worker {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(local_addr)
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.socket = None;
                self.local_addr = None;
                self.events.emit(ReaderEventKind::ConnectionState(false));
                Err(self.fail_enable(NetworkError::Spawn(e)))
            }
        }
    }

    fn fail_enable(&self, error: NetworkError) -> NetworkError {
        *self.state.lock() = ReaderState::Disabled;
        tracing::error!("Interface {} failed to start reading: {}", self.index, error);
        self.events.emit(ReaderEventKind::Error(error.to_string()));
        error
    }

    /// Close the socket and wait for the receive thread, idempotent
    pub fn disable_reading(&mut self) {
        let was_enabled = self.worker.is_some();
        self.running.store(false, Ordering::SeqCst);

        if let Some(socket) = self.socket.take() {
            // unblocks recv on Linux; elsewhere the watchdog timeout does
            if let Err(e) = SockRef::from(&*socket).shutdown(Shutdown::Read) {
                tracing::debug!("Interface {} socket shutdown: {}", self.index, e);
            }
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Interface {} receive thread panicked", self.index);
            }
        }

        self.local_addr = None;
        *self.state.lock() = ReaderState::Disabled;
        if was_enabled {
            tracing::info!("Interface {} stopped reading", self.index);
            self.events.emit(ReaderEventKind::ConnectionState(false));
        }
    }

    pub fn state(&self) -> ReaderState {
        *self.state.lock()
    }

    pub fn is_reading(&self) -> bool {
        self.state() == ReaderState::Reading
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Bound address while enabled
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Get statistics
    pub fn stats(&self) -> ReaderStats {
        let c = &self.counters;
        ReaderStats {
            datagrams: c.datagrams.load(Ordering::Relaxed),
            bytes: c.bytes.load(Ordering::Relaxed),
            frames_completed: c.frames_completed.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            invalid_packets: c.invalid_packets.load(Ordering::Relaxed),
            late_packets: c.late_packets.load(Ordering::Relaxed),
            duplicate_packets: c.duplicate_packets.load(Ordering::Relaxed),
        }
    }
}

impl Drop for UdpReader {
    fn drop(&mut self) {
        self.disable_reading();
    }
}

fn bind_socket(addr: SocketAddr, options: &ReaderOptions) -> Result<UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(NetworkError::SocketOption)?;
    socket
        .set_reuse_address(true)
        .map_err(NetworkError::SocketOption)?;
    if let Err(e) = socket.set_recv_buffer_size(options.receive_buffer_size) {
        tracing::warn!("Failed to set receive buffer size: {}", e);
    }
    socket
        .set_read_timeout(Some(options.watchdog_timeout))
        .map_err(NetworkError::SocketOption)?;
    socket
        .bind(&addr.into())
        .map_err(|source| NetworkError::BindFailed {
            address: addr,
            source,
        })?;
    Ok(socket.into())
}

struct LoopContext {
    socket: Arc<UdpSocket>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<ReaderState>>,
    events: EventSink,
    counters: Arc<Counters>,
    max_datagram_size: usize,
}

fn receive_loop(ctx: LoopContext) {
    let mut buffer = vec![0u8; ctx.max_datagram_size];
    let mut reassembler = Reassembler::new();

    while ctx.running.load(Ordering::SeqCst) {
        match ctx.socket.recv_from(&mut buffer) {
            Ok((len, _from)) => {
                if !ctx.running.load(Ordering::SeqCst) {
                    break;
                }
                handle_datagram(&ctx, &mut reassembler, &buffer[..len]);
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                if ctx.running.load(Ordering::SeqCst) {
                    Counters::bump(&ctx.counters.timeouts);
                    ctx.events.emit(ReaderEventKind::Timeout);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if ctx.running.load(Ordering::SeqCst) {
                    *ctx.state.lock() = ReaderState::Error;
                    let error = NetworkError::ReceiveFailed(e.to_string());
                    tracing::error!("{}", error);
                    ctx.events.emit(ReaderEventKind::Error(error.to_string()));
                    ctx.events.emit(ReaderEventKind::ConnectionState(false));
                }
                break;
            }
        }
    }

    reassembler.clear();
}

fn handle_datagram(ctx: &LoopContext, reassembler: &mut Reassembler, datagram: &[u8]) {
    let c = &ctx.counters;
    Counters::bump(&c.datagrams);
    c.bytes.fetch_add(datagram.len() as u64, Ordering::Relaxed);

    let header = match PacketHeader::parse(datagram) {
        Ok(header) => header,
        Err(e) => {
            Counters::bump(&c.invalid_packets);
            tracing::debug!("Ignoring datagram of {} bytes: {}", datagram.len(), e);
            return;
        }
    };

    let result = reassembler.push(&header, &datagram[PacketHeader::SIZE..]);
    match result.fragment {
        Fragment::Accepted => {}
        Fragment::Duplicate => Counters::bump(&c.duplicate_packets),
        Fragment::Late => Counters::bump(&c.late_packets),
        Fragment::Inconsistent => {
            Counters::bump(&c.invalid_packets);
            tracing::debug!("Inconsistent header for frame {}", header.frame_id);
        }
    }

    if let Some(dropped) = result.dropped {
        Counters::bump(&c.frames_dropped);
        tracing::debug!(
            "Dropped frame {} with {}/{} packets",
            dropped.frame_id,
            dropped.received,
            dropped.expected
        );
        ctx.events.emit(ReaderEventKind::FrameDropped {
            frame_id: dropped.frame_id,
            received: dropped.received,
            expected: dropped.expected,
        });
    }

    if let Some(frame) = result.completed {
        Counters::bump(&c.frames_completed);
        ctx.events.emit(ReaderEventKind::PacketsReceived {
            frame_id: frame.frame_id,
            packet_count: frame.packet_count,
            bytes: frame.payload.len(),
        });
        ctx.events.emit(ReaderEventKind::Payload {
            frame_id: frame.frame_id,
            timestamp_us: frame.timestamp_us,
            data: frame.payload,
        });
    }
}
