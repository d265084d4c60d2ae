use btleplug::api::{BDAddr, Peripheral as _};
use btleplug::platform::Peripheral;
use uuid::Uuid;

use crate::service::GattService;
use crate::stack::{Link, NotificationStream};
use crate::{Characteristic, Error, Result};

/// A connected btleplug peripheral.
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) peripheral: Peripheral,
}

impl Device {
    pub(crate) fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    async fn discover_if_needed(&self) -> Result<()> {
        if self.peripheral.services().is_empty() {
            log::debug!("Discovering services of {}", self.peripheral.address());
            self.peripheral.discover_services().await?;
        }
        Ok(())
    }

    /// Get characteristic by service and characteristic UUID
    pub async fn characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Option<Characteristic>> {
        self.discover_if_needed().await?;

        let characteristic = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| {
                characteristic.service_uuid == service && characteristic.uuid == uuid
            });

        Ok(characteristic.map(|characteristic| Characteristic {
            peripheral: self.peripheral.clone(),
            characteristic,
        }))
    }

    async fn require_characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Characteristic> {
        self.characteristic(service, uuid)
            .await?
            .ok_or(Error::CharacteristicNotFound(uuid))
    }
}

impl Link for Device {
    #[inline]
    fn address(&self) -> BDAddr {
        self.peripheral.address()
    }

    /// Signal strength
    async fn rssi(&self) -> Option<i16> {
        self.peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|props| props.rssi)
    }

    async fn service(&self, uuid: Uuid) -> Result<Option<GattService>> {
        if !self.peripheral.is_connected().await? {
            return Err(btleplug::Error::NotConnected.into());
        }
        self.discover_if_needed().await?;

        Ok(self
            .peripheral
            .services()
            .iter()
            .find(|service| service.uuid == uuid)
            .map(GattService::from))
    }

    async fn write_request(&self, service: Uuid, characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.require_characteristic(service, characteristic)
            .await?
            .write_request(data)
            .await
    }

    async fn subscribe(&self, service: Uuid, characteristic: Uuid) -> Result<NotificationStream> {
        let characteristic = self.require_characteristic(service, characteristic).await?;
        log::debug!("Subscribing to {}", characteristic.uuid());
        characteristic.subscribe().await
    }

    /// Disconnect from the device
    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
