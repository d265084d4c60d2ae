//! Seam between the lifecycle and the platform BLE stack.
//!
//! The stack runs in its own concurrency domain. Everything it wants to tell
//! the lifecycle (advertisements, scan end, disconnects, notifications) goes
//! through one [`StackEvent`] channel that the lifecycle alone consumes.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use btleplug::api::BDAddr;
use futures::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ConnectionParams;
use crate::service::GattService;
use crate::Result;

pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// One advertising packet seen while scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub address: BDAddr,
    pub services: Vec<Uuid>,
    pub rssi: Option<i16>,
    pub local_name: Option<String>,
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {}, Address: {}", self.local_name.as_deref().unwrap_or(""), self.address)?;
        for uuid in &self.services {
            write!(f, ", serviceUUID: {}", uuid)?;
        }
        if let Some(rssi) = self.rssi {
            write!(f, ", rssi: {}", rssi)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    Advertisement(Advertisement),
    /// A bounded scan ran out of time. Not sent for explicitly stopped scans.
    ScanEnded,
    Disconnected(BDAddr),
    Notification { address: BDAddr, value: Vec<u8> },
}

#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<StackEvent>);

impl EventSender {
    pub fn send(&self, event: StackEvent) {
        if self.0.send(event).is_err() {
            log::trace!("Stack event dropped, receiver is gone");
        }
    }
}

#[derive(Debug)]
pub struct EventReceiver(mpsc::UnboundedReceiver<StackEvent>);

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<StackEvent> {
        self.0.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StackEvent> {
        self.0.try_recv().ok()
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), EventReceiver(rx))
}

/// Scanning and connection side of a BLE stack.
#[allow(async_fn_in_trait)]
pub trait Central {
    type Link: Link;

    /// Start scanning. `None` scans until [`Central::stop_scan`]; a bounded scan
    /// ends on its own and reports [`StackEvent::ScanEnded`].
    async fn start_scan(&mut self, duration: Option<Duration>) -> Result<()>;

    async fn stop_scan(&mut self) -> Result<()>;

    /// Open a link. Callers bound the wait themselves.
    async fn connect(&mut self, address: BDAddr, params: &ConnectionParams) -> Result<Self::Link>;

    /// Tear down whatever an abandoned [`Central::connect`] left behind for
    /// `address`, whether the link is pending or already up.
    async fn abort_connect(&mut self, address: BDAddr) -> Result<()>;
}

/// A live GATT session with one peripheral.
#[allow(async_fn_in_trait)]
pub trait Link {
    fn address(&self) -> BDAddr;

    /// Signal strength, if the stack knows it.
    async fn rssi(&self) -> Option<i16>;

    /// `None` when the peer does not expose the service.
    async fn service(&self, uuid: Uuid) -> Result<Option<GattService>>;

    /// Acknowledged write.
    async fn write_request(&self, service: Uuid, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Enable notifications and return the stream of values.
    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<NotificationStream>;

    async fn disconnect(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_display() {
        let adv = Advertisement {
            address: BDAddr::from([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            services: vec![crate::identity::DEVICE],
            rssi: Some(-71),
            local_name: Some("F7".into()),
        };
        assert_eq!(
            adv.to_string(),
            "Name: F7, Address: 11:22:33:44:55:66, \
             serviceUUID: 6e40f431-b5a3-f393-e0a9-e50e24dcca9e, rssi: -71"
        );
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (tx, mut rx) = channel();
        tx.send(StackEvent::ScanEnded);
        tx.send(StackEvent::Disconnected(BDAddr::from([0; 6])));
        assert_eq!(rx.recv().await, Some(StackEvent::ScanEnded));
        assert_eq!(rx.try_recv(), Some(StackEvent::Disconnected(BDAddr::from([0; 6]))));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn send_after_receiver_dropped_is_silent() {
        let (tx, rx) = channel();
        drop(rx);
        tx.send(StackEvent::ScanEnded);
    }
}
