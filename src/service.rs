use btleplug::api::Service as BtleService;
use uuid::Uuid;

/// A resolved GATT service and the characteristics it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

impl GattService {
    pub fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.characteristics.contains(&uuid)
    }
}

impl From<&BtleService> for GattService {
    fn from(service: &BtleService) -> Self {
        Self {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .iter()
                .map(|characteristic| characteristic.uuid)
                .collect::<Vec<_>>(),
        }
    }
}
