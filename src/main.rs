use std::time::Duration;

use clap::Parser;
use f7_oximeter::{stack, BtleCentral, Config, Error, Lifecycle};

/// Read SpO2, pulse rate and perfusion index from an F7 pulse oximeter.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Index of the Bluetooth adapter to use
    #[arg(long, default_value_t = 0)]
    adapter: usize,

    /// Time between measurement requests
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Give up on a connection attempt after this many seconds
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,

    /// Length of the scans that follow a failure or disconnect
    #[arg(long, default_value_t = 5)]
    scan_duration_secs: u64,

    /// Bound the first scan as well; by default it runs until the device is found
    #[arg(long)]
    initial_scan_secs: Option<u64>,
}

impl Args {
    fn config(&self) -> Config {
        let config = Config::default()
            .adapter_index(self.adapter)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .scan_duration(Duration::from_secs(self.scan_duration_secs));

        match self.initial_scan_secs {
            Some(secs) => config.initial_scan(Duration::from_secs(secs)),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if std::env::var_os("RUST_LOG").is_none() {
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Info)
            .init();
    } else {
        pretty_env_logger::init();
    }

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    log::info!("Oximeter F7 BLE client {}", env!("CARGO_PKG_VERSION"));

    let (event_sender, events) = stack::channel();
    let central = BtleCentral::new(config.get_adapter_index(), event_sender.clone()).await?;

    let mut lifecycle = Lifecycle::new(central, config, event_sender, events);
    lifecycle
        .run(|measurement| println!("{}", measurement))
        .await
}
