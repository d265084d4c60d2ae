use std::time::Duration;

use crate::identity::DeviceIdentity;
use crate::{Error, Result};

/// GAP connection parameters, in Bluetooth units.
///
/// Intervals count 1.25 ms steps, the supervision timeout counts 10 ms steps.
/// The defaults (15 ms interval, no latency, 600 ms timeout) leave room for
/// a few more peripherals of this kind on the same central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    pub min_interval: u16,
    pub max_interval: u16,
    pub latency: u16,
    pub supervision_timeout: u16,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            min_interval: 12,
            max_interval: 12,
            latency: 0,
            supervision_timeout: 60,
        }
    }
}

impl ConnectionParams {
    pub fn min_interval_duration(&self) -> Duration {
        Duration::from_micros(u64::from(self.min_interval) * 1250)
    }

    pub fn max_interval_duration(&self) -> Duration {
        Duration::from_micros(u64::from(self.max_interval) * 1250)
    }

    pub fn supervision_timeout_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.supervision_timeout) * 10)
    }

    pub fn validate(&self) -> Result<()> {
        if !(6..=3200).contains(&self.min_interval) || !(6..=3200).contains(&self.max_interval) {
            return Err(invalid("connection interval must be within 7.5 ms and 4 s"));
        }
        if self.min_interval > self.max_interval {
            return Err(invalid("minimum connection interval exceeds the maximum"));
        }
        if self.latency > 499 {
            return Err(invalid("peripheral latency must not exceed 499"));
        }
        if !(10..=3200).contains(&self.supervision_timeout) {
            return Err(invalid("supervision timeout must be within 100 ms and 32 s"));
        }
        // timeout > (1 + latency) * max_interval * 2
        let needed = (1 + u64::from(self.latency)) * u64::from(self.max_interval) * 1250 * 2;
        if u64::from(self.supervision_timeout) * 10_000 <= needed {
            return Err(invalid(
                "supervision timeout is too short for the interval and latency",
            ));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConfig(reason.to_string())
}

/// Timing and identity of the client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifiers of the peripheral to look for.
    pub(crate) identity: DeviceIdentity,
    /// Index of the Bluetooth adapter to use. The first found adapter is used by default.
    pub(crate) adapter_index: usize,
    /// Time between measurement requests.
    pub(crate) poll_interval: Duration,
    /// How long a connection attempt may take.
    pub(crate) connect_timeout: Duration,
    /// Duration of every scan after the first.
    pub(crate) scan_duration: Duration,
    /// Duration of the first scan. `None` scans until the device is found.
    pub(crate) initial_scan: Option<Duration>,
    /// Delay before retrying a scan that could not be started.
    pub(crate) scan_retry: Duration,
    pub(crate) connection: ConnectionParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::F7,
            adapter_index: 0,
            poll_interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(5),
            scan_duration: Duration::from_secs(5),
            initial_scan: None,
            scan_retry: Duration::from_secs(1),
            connection: ConnectionParams::default(),
        }
    }
}

impl Config {
    /// Peripheral identifiers
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Request a measurement this often while connected
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up on a connection attempt after this long
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Length of the scans started after a failure or disconnect
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Bound the first scan too
    pub fn initial_scan(mut self, duration: Duration) -> Self {
        self.initial_scan = Some(duration);
        self
    }

    pub fn scan_retry(mut self, delay: Duration) -> Self {
        self.scan_retry = delay;
        self
    }

    pub fn connection_params(mut self, params: ConnectionParams) -> Self {
        self.connection = params;
        self
    }

    pub fn get_adapter_index(&self) -> usize {
        self.adapter_index
    }

    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("poll interval", Some(self.poll_interval)),
            ("connect timeout", Some(self.connect_timeout)),
            ("scan duration", Some(self.scan_duration)),
            ("initial scan duration", self.initial_scan),
            ("scan retry delay", Some(self.scan_retry)),
        ];
        for (name, duration) in durations {
            if duration == Some(Duration::ZERO) {
                return Err(Error::InvalidConfig(format!("{} must not be zero", name)));
            }
        }
        self.connection.validate()
    }
}
