//! Fixed identifiers of the F7 oximeter.
//!
//! The accessory exposes a Nordic-UART-like vendor service: writing
//! [`TRIGGER`] to the request characteristic makes the device push exactly one
//! measurement on the notify characteristic. It advertises [`DEVICE`] rather
//! than the GATT service it actually serves, so discovery and GATT lookups use
//! different identifiers.

use btleplug::api::BDAddr;
use uuid::Uuid;

/// Service UUID carried in the advertisement.
pub const DEVICE: Uuid = Uuid::from_u128(0x6e40f431_b5a3_f393_e0a9_e50e24dcca9e);

/// GATT service holding both characteristics.
pub const SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Characteristic delivering measurements.
pub const NOTIFY: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Characteristic accepting the measurement request.
pub const REQUEST: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Bytes that request a single measurement notification.
pub const TRIGGER: [u8; 6] = [0xab, 0x00, 0x03, 0xff, 0x30, 0x80];

/// Link-layer address captured from a matching advertisement.
pub type PeerAddress = BDAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Identifier the accessory advertises.
    pub device: Uuid,
    pub service: Uuid,
    pub notify: Uuid,
    pub request: Uuid,
    pub trigger: [u8; 6],
}

impl DeviceIdentity {
    pub const F7: DeviceIdentity = DeviceIdentity {
        device: DEVICE,
        service: SERVICE,
        notify: NOTIFY,
        request: REQUEST,
        trigger: TRIGGER,
    };
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::F7
    }
}
