//! Scripted stand-in for the platform BLE stack.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use f7_oximeter::identity::{DEVICE, NOTIFY, REQUEST, SERVICE};
use f7_oximeter::stack::{self, Advertisement, EventReceiver, EventSender, NotificationStream};
use f7_oximeter::{
    BDAddr, Central, Config, ConnectionParams, Error, GattService, Lifecycle, Link, Result,
    StackEvent,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const RSSI: i16 = -58;

pub fn peer() -> BDAddr {
    BDAddr::from([0xF7, 0x00, 0x11, 0x22, 0x33, 0x44])
}

pub fn stranger() -> BDAddr {
    BDAddr::from([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F])
}

pub fn target_advertisement() -> StackEvent {
    StackEvent::Advertisement(Advertisement {
        address: peer(),
        services: vec![DEVICE],
        rssi: Some(-70),
        local_name: Some("F7".to_string()),
    })
}

pub fn other_advertisement() -> StackEvent {
    StackEvent::Advertisement(Advertisement {
        address: stranger(),
        services: vec![SERVICE],
        rssi: Some(-40),
        local_name: Some("headphones".to_string()),
    })
}

pub fn oximeter_service() -> GattService {
    GattService {
        uuid: SERVICE,
        characteristics: vec![REQUEST, NOTIFY],
    }
}

/// Short timeouts so failing connects do not slow the tests down.
pub fn config() -> Config {
    Config::default()
        .connect_timeout(Duration::from_millis(50))
        .scan_retry(Duration::from_millis(10))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accept,
    Reject,
    /// Never answers.
    Hang,
}

#[derive(Debug, Default)]
pub struct State {
    pub scans: Vec<Option<Duration>>,
    pub scan_stops: usize,
    /// Number of upcoming `start_scan` calls that fail.
    pub failing_scans: usize,
    /// Consumed one per connect; `Accept` once empty.
    pub connect_outcomes: VecDeque<ConnectOutcome>,
    pub connects: Vec<BDAddr>,
    pub connect_params: Vec<ConnectionParams>,
    /// Addresses handed to `abort_connect`.
    pub aborts: Vec<BDAddr>,
    /// Service discovery on a live link fails.
    pub failing_discovery: bool,
    pub services: Vec<GattService>,
    pub reject_subscribe: bool,
    pub reject_writes: bool,
    pub writes: Vec<Vec<u8>>,
    pub disconnects: usize,
    pub live_links: usize,
    pub max_live_links: usize,
    notifier: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

#[derive(Clone, Default)]
pub struct Radio(Arc<Mutex<State>>);

impl Radio {
    pub fn new() -> Self {
        let radio = Radio::default();
        radio.state().services = vec![oximeter_service()];
        radio
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    /// Push a value through the armed subscription.
    pub fn notify(&self, value: &[u8]) {
        let state = self.state();
        let notifier = state.notifier.as_ref().expect("no subscription armed");
        notifier.send(value.to_vec()).unwrap();
    }

    pub fn central(&self) -> MockCentral {
        MockCentral {
            radio: self.clone(),
        }
    }
}

pub struct MockCentral {
    radio: Radio,
}

impl Central for MockCentral {
    type Link = MockLink;

    async fn start_scan(&mut self, duration: Option<Duration>) -> Result<()> {
        let mut state = self.radio.state();
        if state.failing_scans > 0 {
            state.failing_scans -= 1;
            return Err(btleplug::Error::NotSupported("adapter busy".to_string()).into());
        }
        state.scans.push(duration);
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.radio.state().scan_stops += 1;
        Ok(())
    }

    async fn connect(&mut self, address: BDAddr, params: &ConnectionParams) -> Result<MockLink> {
        let outcome = {
            let mut state = self.radio.state();
            state.connects.push(address);
            state.connect_params.push(*params);
            state
                .connect_outcomes
                .pop_front()
                .unwrap_or(ConnectOutcome::Accept)
        };

        match outcome {
            ConnectOutcome::Accept => {
                let mut state = self.radio.state();
                state.live_links += 1;
                let live = state.live_links;
                state.max_live_links = state.max_live_links.max(live);
                Ok(MockLink {
                    radio: self.radio.clone(),
                    address,
                })
            }
            ConnectOutcome::Reject => Err(btleplug::Error::NotConnected.into()),
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }

    async fn abort_connect(&mut self, address: BDAddr) -> Result<()> {
        self.radio.state().aborts.push(address);
        Ok(())
    }
}

pub struct MockLink {
    radio: Radio,
    address: BDAddr,
}

impl Link for MockLink {
    fn address(&self) -> BDAddr {
        self.address
    }

    async fn rssi(&self) -> Option<i16> {
        Some(RSSI)
    }

    async fn service(&self, uuid: uuid::Uuid) -> Result<Option<GattService>> {
        let state = self.radio.state();
        if state.failing_discovery {
            return Err(btleplug::Error::NotConnected.into());
        }
        Ok(state
            .services
            .iter()
            .find(|service| service.uuid == uuid)
            .cloned())
    }

    async fn write_request(
        &self,
        _service: uuid::Uuid,
        _characteristic: uuid::Uuid,
        data: &[u8],
    ) -> Result<()> {
        let mut state = self.radio.state();
        if state.reject_writes {
            return Err(btleplug::Error::NotConnected.into());
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        _service: uuid::Uuid,
        characteristic: uuid::Uuid,
    ) -> Result<NotificationStream> {
        let mut state = self.radio.state();
        if state.reject_subscribe {
            return Err(Error::CharacteristicNotFound(characteristic));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.notifier = Some(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.radio.state().disconnects += 1;
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.radio.0.lock() {
            state.live_links -= 1;
        }
    }
}

pub fn lifecycle(radio: &Radio) -> (Lifecycle<MockCentral>, EventSender) {
    let (event_sender, events): (EventSender, EventReceiver) = stack::channel();
    let lifecycle = Lifecycle::new(radio.central(), config(), event_sender.clone(), events);
    (lifecycle, event_sender)
}
