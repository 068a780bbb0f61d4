//! Reader manager
//!
//! Owns one [`UdpReader`] per configured interface and the event channel
//! they share. Enabling is best effort: readers that bind stay enabled even
//! when another interface fails.

use crossbeam_channel::Receiver;
use std::net::IpAddr;

use super::events::{ReaderEvent, ReaderState};
use super::reader::{ReaderOptions, ReaderStats, UdpReader};
use crate::config::NetworkConfig;

pub struct UdpReaderManager {
    readers: Vec<UdpReader>,
    events: Receiver<ReaderEvent>,
}

impl UdpReaderManager {
    /// Create one disabled reader per address
    pub fn new(addresses: &[IpAddr], options: ReaderOptions, event_capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(event_capacity.max(1));
        let readers = addresses
            .iter()
            .enumerate()
            .map(|(index, &address)| UdpReader::new(index, address, options.clone(), tx.clone()))
            .collect();
        Self {
            readers,
            events: rx,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        let addresses: Vec<IpAddr> = config.interfaces.iter().map(|i| i.address).collect();
        Self::new(
            &addresses,
            ReaderOptions::from_config(config),
            config.event_capacity,
        )
    }

    /// Enable every reader on `port`
    ///
    /// Returns true only if all of them started. Readers that did start
    /// are left running; connection state events tell which ones.
    pub fn enable_reading(&mut self, port: u16) -> bool {
        let mut all_enabled = true;
        for reader in &mut self.readers {
            if let Err(e) = reader.enable_reading(port) {
                tracing::warn!("Interface {} ({}) not enabled: {}", reader.index(), reader.address(), e);
                all_enabled = false;
            }
        }
        all_enabled
    }

    /// Disable every reader, safe on a partially enabled manager
    pub fn disable_reading(&mut self) {
        for reader in &mut self.readers {
            reader.disable_reading();
        }
    }

    /// Events of all readers, tagged with their interface index
    pub fn events(&self) -> &Receiver<ReaderEvent> {
        &self.events
    }

    /// Whether each interface is currently reading, by index
    pub fn connection_states(&self) -> Vec<bool> {
        self.readers
            .iter()
            .map(|r| r.state() == ReaderState::Reading)
            .collect()
    }

    pub fn reader(&self, index: usize) -> Option<&UdpReader> {
        self.readers.get(index)
    }

    pub fn readers(&self) -> &[UdpReader] {
        &self.readers
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Get statistics of every reader
    pub fn stats(&self) -> Vec<ReaderStats> {
        self.readers.iter().map(UdpReader::stats).collect()
    }
}

impl Drop for UdpReaderManager {
    fn drop(&mut self) {
        self.disable_reading();
    }
}
