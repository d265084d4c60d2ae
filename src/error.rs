use std::time::Duration;

use btleplug::api::BDAddr;
use uuid::Uuid;

/// Errors produced while talking to the oximeter.
///
/// The lifecycle never branches on the variant: every failure is logged and
/// answered with a rescan. The variants exist so the log line says what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ble(#[from] btleplug::Error),

    #[error("no bluetooth adapter with index {0}")]
    AdapterNotFound(usize),

    #[error("peripheral {0} is not known to the adapter")]
    PeripheralNotFound(BDAddr),

    #[error("connecting to {0} timed out after {1:?}")]
    ConnectTimeout(BDAddr, Duration),

    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
