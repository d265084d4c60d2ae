//! Top-level driver: scan, connect, poll, and back to scanning.
//!
//! The lifecycle is the single consumer of the stack event channel. Stack
//! callbacks never act on their own; they only post a [`StackEvent`] and the
//! lifecycle performs the transition on its next turn. Whatever is still
//! queued when a connect attempt or a new scan starts is discarded.

use std::fmt;

use tokio::time::Instant;

use crate::config::Config;
use crate::connection::{self, ConnectionHandle};
use crate::filter::AdvertisementFilter;
use crate::identity::PeerAddress;
use crate::payload::{self, Hex, Reading};
use crate::poll;
use crate::stack::{Advertisement, Central, EventReceiver, EventSender, Link, StackEvent};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Connecting,
    Polling,
}

/// A valid reading together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub address: PeerAddress,
    pub rssi: Option<i16>,
    pub reading: Reading,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.address)?;
        match self.rssi {
            Some(rssi) => write!(f, "{}", rssi)?,
            None => f.write_str("?")?,
        }
        write!(
            f,
            ") - SpO2: {}, PI: {}, pulse: {}",
            self.reading.spo2_percent,
            self.reading.perfusion_index(),
            self.reading.pulse_rate
        )
    }
}

enum Session<L: Link> {
    NoConnection,
    Connected(ConnectionHandle<L>),
}

pub struct Lifecycle<C: Central> {
    central: C,
    config: Config,
    filter: AdvertisementFilter,
    event_sender: EventSender,
    events: EventReceiver,
    phase: Phase,
    /// Written by a filter match, superseded by the next scan.
    peer: Option<PeerAddress>,
    session: Session<C::Link>,
    last_poll: Option<Instant>,
    scan_retry_at: Option<Instant>,
}

impl<C: Central> Lifecycle<C> {
    /// `event_sender` must feed `events`; the stack backend holds a clone of
    /// the same sender.
    pub fn new(central: C, config: Config, event_sender: EventSender, events: EventReceiver) -> Self {
        let filter = AdvertisementFilter::new(config.identity.device);

        Self {
            central,
            config,
            filter,
            event_sender,
            events,
            phase: Phase::Scanning,
            peer: None,
            session: Session::NoConnection,
            last_poll: None,
            scan_retry_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Address captured by the last filter match.
    pub fn peer(&self) -> Option<PeerAddress> {
        self.peer
    }

    /// Address of the live connection, if any.
    pub fn connected_to(&self) -> Option<PeerAddress> {
        match &self.session {
            Session::Connected(handle) => Some(handle.address()),
            Session::NoConnection => None,
        }
    }

    /// Start the first scan.
    pub async fn start(&mut self) -> Result<()> {
        self.config.validate()?;

        log::info!("Starting scan for {}", self.filter.target());
        self.phase = Phase::Scanning;
        self.peer = None;
        self.central.start_scan(self.config.initial_scan).await
    }

    /// Start and drive the lifecycle forever. Valid readings go to `sink`.
    pub async fn run<F: FnMut(&Measurement)>(&mut self, mut sink: F) -> Result<()> {
        self.start().await?;
        loop {
            self.turn(&mut sink).await;
        }
    }

    /// Wait for the next event or deadline and act on it.
    pub async fn turn<F: FnMut(&Measurement)>(&mut self, sink: &mut F) {
        if self.phase == Phase::Connecting {
            self.connect().await;
            return;
        }

        match self.deadline() {
            Some(deadline) => {
                tokio::select! {
                    event = self.events.recv() => {
                        if let Some(event) = event {
                            self.handle_event(event, sink).await;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        self.tick(Instant::now()).await;
                    }
                }
            }
            None => {
                if let Some(event) = self.events.recv().await {
                    self.handle_event(event, sink).await;
                }
            }
        }
    }

    /// Handle everything pending, connect if a peer was captured, then tick.
    pub async fn step<F: FnMut(&Measurement)>(&mut self, now: Instant, sink: &mut F) {
        while let Some(event) = self.events.try_recv() {
            self.handle_event(event, sink).await;
        }
        if self.phase == Phase::Connecting {
            self.connect().await;
        }
        self.tick(now).await;
    }

    pub async fn handle_event<F: FnMut(&Measurement)>(&mut self, event: StackEvent, sink: &mut F) {
        match event {
            StackEvent::Advertisement(advertisement) => self.on_advertisement(&advertisement).await,
            StackEvent::ScanEnded => self.on_scan_ended().await,
            StackEvent::Disconnected(address) => self.on_disconnected(address).await,
            StackEvent::Notification { address, value } => {
                self.on_notification(address, &value, sink).await
            }
        }
    }

    /// Poll when due, or retry a scan that failed to start.
    pub async fn tick(&mut self, now: Instant) {
        match self.phase {
            Phase::Polling => {
                if self.poll_due(now) {
                    self.poll(now).await;
                }
            }
            Phase::Scanning => {
                if self.scan_retry_at.is_some_and(|at| now >= at) {
                    self.rescan().await;
                }
            }
            Phase::Connecting => {}
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Polling => Some(
                self.last_poll
                    .map_or_else(Instant::now, |last| last + self.config.poll_interval),
            ),
            Phase::Scanning => self.scan_retry_at,
            Phase::Connecting => None,
        }
    }

    fn poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.poll_interval)
    }

    async fn on_advertisement(&mut self, advertisement: &Advertisement) {
        if self.phase != Phase::Scanning || self.peer.is_some() {
            log::trace!("Ignoring advertisement from {}", advertisement.address);
            return;
        }

        if let Some(address) = self.filter.capture(advertisement) {
            log::info!("Found our service - {}", advertisement);
            self.peer = Some(address);
            if let Err(e) = self.central.stop_scan().await {
                log::warn!("Stopping scan failed: {}", e);
            }
            self.scan_retry_at = None;
            self.phase = Phase::Connecting;
        }
    }

    async fn on_scan_ended(&mut self) {
        if self.phase != Phase::Scanning || self.peer.is_some() {
            return;
        }

        log::info!("Scan ended without finding {} - scanning again", self.filter.target());
        self.rescan().await;
    }

    async fn on_disconnected(&mut self, address: PeerAddress) {
        if self.connected_to() != Some(address) {
            log::debug!("Ignoring disconnect of {}", address);
            return;
        }

        log::info!("Disconnected {} - starting new scan", address);
        self.session = Session::NoConnection;
        self.rescan().await;
    }

    async fn on_notification<F: FnMut(&Measurement)>(
        &mut self,
        address: PeerAddress,
        value: &[u8],
        sink: &mut F,
    ) {
        let handle = match &self.session {
            Session::Connected(handle) if handle.address() == address => handle,
            _ => {
                log::debug!("Ignoring notification from stale link {}", address);
                return;
            }
        };

        log::debug!("Notification: {}", Hex(value));

        let reading = match payload::decode(value) {
            Ok(reading) => reading,
            Err(e) => {
                log::warn!("Discarding notification from {}: {}", address, e);
                return;
            }
        };

        if !reading.is_valid() {
            log::debug!("No finger detected");
            return;
        }

        let rssi = handle.link().rssi().await;
        sink(&Measurement {
            address,
            rssi,
            reading,
        });
    }

    async fn connect(&mut self) {
        debug_assert!(matches!(self.session, Session::NoConnection));
        self.discard_pending();

        let address = match self.peer {
            Some(address) => address,
            None => {
                self.rescan().await;
                return;
            }
        };

        match connection::establish(&mut self.central, address, &self.config, &self.event_sender)
            .await
        {
            Ok(handle) => {
                self.session = Session::Connected(handle);
                // first request goes out on the next tick
                self.last_poll = None;
                self.phase = Phase::Polling;
            }
            Err(e) => {
                log::info!("Failed to connect ({}) - start new scan", e);
                self.rescan().await;
            }
        }
    }

    async fn poll(&mut self, now: Instant) {
        self.last_poll = Some(now);

        let handle = match &self.session {
            Session::Connected(handle) => handle,
            Session::NoConnection => return,
        };
        let address = handle.address();
        let result = poll::request_measurement(handle.link(), &self.config.identity).await;

        if let Err(e) = result {
            log::info!("Poll of {} failed ({}) - start new scan", address, e);
            self.session = Session::NoConnection;
            self.rescan().await;
        }
    }

    /// Drop everything queued so far. Events posted before a connect attempt
    /// or a new scan belong to the previous scan session or link.
    fn discard_pending(&mut self) {
        let mut discarded = 0;
        while self.events.try_recv().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!("Discarded {} stale stack events", discarded);
        }
    }

    /// Back to a bounded scan. Any connection is already released.
    async fn rescan(&mut self) {
        debug_assert!(matches!(self.session, Session::NoConnection));
        self.discard_pending();

        self.phase = Phase::Scanning;
        self.peer = None;
        self.last_poll = None;

        match self.central.start_scan(Some(self.config.scan_duration)).await {
            Ok(()) => self.scan_retry_at = None,
            Err(e) => {
                log::error!(
                    "Starting scan failed: {} - retrying in {:?}",
                    e,
                    self.config.scan_retry
                );
                self.scan_retry_at = Some(Instant::now() + self.config.scan_retry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::BDAddr;

    #[test]
    fn measurement_display() {
        let measurement = Measurement {
            address: BDAddr::from([0x12, 0x34, 0x56, 0x78, 0x90, 0x12]),
            rssi: Some(-60),
            reading: Reading {
                pulse_rate: 75,
                spo2_percent: 98,
                perfusion_index_tenths: 100,
            },
        };
        assert_eq!(
            measurement.to_string(),
            "12:34:56:78:90:12(-60) - SpO2: 98, PI: 10.0, pulse: 75"
        );
    }

    #[test]
    fn measurement_display_without_rssi() {
        let measurement = Measurement {
            address: BDAddr::from([0x12, 0x34, 0x56, 0x78, 0x90, 0x12]),
            rssi: None,
            reading: Reading {
                pulse_rate: 61,
                spo2_percent: 96,
                perfusion_index_tenths: 7,
            },
        };
        assert_eq!(
            measurement.to_string(),
            "12:34:56:78:90:12(?) - SpO2: 96, PI: 0.7, pulse: 61"
        );
    }
}
