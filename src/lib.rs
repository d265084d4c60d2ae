//! BLE central client for the F7 pulse oximeter.
//!
//! The client scans for the oximeter's advertisement, connects, subscribes to
//! the measurement characteristic and then asks for one sample per poll
//! interval. Every valid sample is handed to a caller-supplied sink. Whenever
//! the link is lost or cannot be opened the client goes back to scanning.
//!
//! The oximeter advertises only right after power-on and may refuse a second
//! connection after it went out of range. Such a refusal looks like any other
//! timeout: the client keeps scanning until the device is power-cycled.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use f7_oximeter::{stack, BtleCentral, Config, Error, Lifecycle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let config = Config::default();
//!     let (event_sender, events) = stack::channel();
//!     let central = BtleCentral::new(config.get_adapter_index(), event_sender.clone()).await?;
//!
//!     let mut lifecycle = Lifecycle::new(central, config, event_sender, events);
//!     lifecycle.run(|measurement| println!("{}", measurement)).await
//! }
//!```

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::BDAddr;

pub use characteristic::Characteristic;
pub use config::{Config, ConnectionParams};
pub use device::Device;
pub use error::{Error, Result};
pub use filter::AdvertisementFilter;
pub use identity::{DeviceIdentity, PeerAddress};
pub use lifecycle::{Lifecycle, Measurement, Phase};
pub use payload::{DecodeError, Reading};
pub use scanner::BtleCentral;
pub use service::GattService;
pub use stack::{Central, Link, StackEvent};

mod characteristic;
mod device;
mod error;
mod scanner;
mod service;

pub mod config;
pub mod connection;
pub mod filter;
pub mod identity;
pub mod lifecycle;
pub mod payload;
pub mod poll;
pub mod stack;
