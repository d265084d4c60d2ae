use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use stream_cancel::{Trigger, Tripwire, Valved};

use crate::config::ConnectionParams;
use crate::device::Device;
use crate::stack::{Advertisement, Central, EventSender, StackEvent};
use crate::{Error, Result};

pub(crate) struct Session {
    pub(crate) _manager: Manager,
    pub(crate) adapter: Adapter,
}

/// [`Central`] backed by the platform adapter through btleplug.
///
/// One listener task watches the adapter for the lifetime of this value and
/// turns adapter events into [`StackEvent`]s.
pub struct BtleCentral {
    session: Arc<Session>,
    event_sender: EventSender,
    /// Set while a scan session is active. Advertisements outside a session are dropped.
    scanning: Arc<AtomicBool>,
    /// Stops the adapter event listener when dropped.
    _listener_stopper: Trigger,
    /// Disarms the timer of a bounded scan when dropped.
    scan_timer: Option<Trigger>,
}

impl BtleCentral {
    pub async fn new(adapter_index: usize, event_sender: EventSender) -> Result<Self> {
        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if adapter_index >= adapters.len() {
            return Err(Error::AdapterNotFound(adapter_index));
        }

        let adapter = adapters.swap_remove(adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        let session = Arc::new(Session {
            _manager: manager,
            adapter,
        });
        let scanning = Arc::new(AtomicBool::new(false));

        let (stopper, events) = Valved::new(session.adapter.events().await?);
        let listener = EventListener {
            session: session.clone(),
            scanning: scanning.clone(),
            event_sender: event_sender.clone(),
        };
        tokio::spawn(async move {
            listener.listen(events).await;
        });

        Ok(Self {
            session,
            event_sender,
            scanning,
            _listener_stopper: stopper,
            scan_timer: None,
        })
    }

    async fn find_peripheral(&self, address: BDAddr) -> Result<Peripheral> {
        self.session
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|peripheral| peripheral.address() == address)
            .ok_or(Error::PeripheralNotFound(address))
    }

    fn arm_scan_timer(&mut self, duration: Duration) {
        let (trigger, tripwire) = Tripwire::new();
        let session = self.session.clone();
        let scanning = self.scanning.clone();
        let event_sender = self.event_sender.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    scanning.store(false, Ordering::Release);
                    if let Err(e) = session.adapter.stop_scan().await {
                        log::warn!("Stopping the scan failed: {}", e);
                    }
                    log::debug!("Scan window of {:?} elapsed", duration);
                    event_sender.send(StackEvent::ScanEnded);
                }
                _ = tripwire => {}
            }
        });

        self.scan_timer = Some(trigger);
    }
}

impl Central for BtleCentral {
    type Link = Device;

    async fn start_scan(&mut self, duration: Option<Duration>) -> Result<()> {
        self.scan_timer.take();

        match duration {
            Some(duration) => log::debug!("Starting a {:?} scan", duration),
            None => log::debug!("Starting an unbounded scan"),
        }

        self.session.adapter.start_scan(ScanFilter::default()).await?;
        self.scanning.store(true, Ordering::Release);

        if let Some(duration) = duration {
            self.arm_scan_timer(duration);
        }

        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        self.scan_timer.take();
        self.scanning.store(false, Ordering::Release);
        self.session.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&mut self, address: BDAddr, params: &ConnectionParams) -> Result<Device> {
        let peripheral = self.find_peripheral(address).await?;

        // btleplug leaves connection parameters to the OS
        log::trace!("Requested connection parameters {:?} are advisory", params);

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }

        // services are discovered through the link, which is closed on failure
        Ok(Device::new(peripheral))
    }

    async fn abort_connect(&mut self, address: BDAddr) -> Result<()> {
        let peripheral = self.find_peripheral(address).await?;
        log::debug!("Aborting connection to {}", address);
        peripheral.disconnect().await?;
        Ok(())
    }
}

struct EventListener {
    /// Reference to the bluetooth session instance
    session: Arc<Session>,
    scanning: Arc<AtomicBool>,
    /// Channel for sending events to the lifecycle
    event_sender: EventSender,
}

impl EventListener {
    async fn listen(self, mut event_stream: Valved<Pin<Box<dyn Stream<Item = CentralEvent> + Send>>>) {
        while let Some(event) = event_stream.next().await {
            match event {
                CentralEvent::DeviceDiscovered(peripheral_id)
                | CentralEvent::DeviceUpdated(peripheral_id) => {
                    self.on_advertisement(peripheral_id).await;
                }
                CentralEvent::ServicesAdvertisement { id, .. } => {
                    self.on_advertisement(id).await;
                }
                CentralEvent::DeviceDisconnected(peripheral_id) => {
                    self.on_device_disconnected(peripheral_id).await;
                }
                _ => {}
            }
        }

        log::info!("Adapter event listener was stopped.");
    }

    async fn on_advertisement(&self, peripheral_id: PeripheralId) {
        if !self.scanning.load(Ordering::Acquire) {
            return;
        }

        let peripheral = match self.session.adapter.peripheral(&peripheral_id).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                log::trace!("Advertiser {:?} vanished: {}", peripheral_id, e);
                return;
            }
        };

        if let Ok(Some(props)) = peripheral.properties().await {
            log::trace!("Advertisement: {:?}", props);

            self.event_sender
                .send(StackEvent::Advertisement(Advertisement {
                    address: props.address,
                    services: props.services,
                    rssi: props.rssi,
                    local_name: props.local_name,
                }));
        }
    }

    async fn on_device_disconnected(&self, peripheral_id: PeripheralId) {
        match self.session.adapter.peripheral(&peripheral_id).await {
            Ok(peripheral) => {
                log::trace!("Device disconnected: {:?}", peripheral);
                self.event_sender
                    .send(StackEvent::Disconnected(peripheral.address()));
            }
            Err(e) => log::warn!("Disconnected peripheral {:?} is unknown: {}", peripheral_id, e),
        }
    }
}
