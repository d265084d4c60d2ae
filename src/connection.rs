//! Opening the GATT link and arming the measurement subscription.

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::identity::PeerAddress;
use crate::stack::{Central, EventSender, Link, StackEvent};
use crate::{Error, Result};

/// A live, subscribed session with the oximeter.
///
/// Dropping the handle stops notification forwarding. The lifecycle keeps at
/// most one of these.
pub struct ConnectionHandle<L: Link> {
    link: L,
    forwarder: JoinHandle<()>,
}

impl<L: Link> ConnectionHandle<L> {
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn address(&self) -> PeerAddress {
        self.link.address()
    }
}

impl<L: Link> Drop for ConnectionHandle<L> {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Connect to `address`, resolve the oximeter service and subscribe to
/// measurements. Every failure after the link is up closes the link before
/// returning.
pub async fn establish<C: Central>(
    central: &mut C,
    address: PeerAddress,
    config: &Config,
    events: &EventSender,
) -> Result<ConnectionHandle<C::Link>> {
    log::info!("Connect to {}", address);
    log::debug!(
        "Connection parameters: interval {:?}..{:?}, latency {}, supervision timeout {:?}",
        config.connection.min_interval_duration(),
        config.connection.max_interval_duration(),
        config.connection.latency,
        config.connection.supervision_timeout_duration(),
    );

    let attempt = tokio::time::timeout(
        config.connect_timeout,
        central.connect(address, &config.connection),
    )
    .await;

    let link = match attempt {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => {
            log::info!("Connection failed: {}", e);
            return Err(e);
        }
        Err(_) => {
            log::info!("Connection failed: no response within {:?}", config.connect_timeout);
            if let Err(e) = central.abort_connect(address).await {
                log::debug!("Aborting connection to {} failed: {}", address, e);
            }
            return Err(Error::ConnectTimeout(address, config.connect_timeout));
        }
    };

    match link.rssi().await {
        Some(rssi) => log::info!("Connected with RSSI {}", rssi),
        None => log::info!("Connected, RSSI unknown"),
    }

    match subscribe(&link, config, events).await {
        Ok(forwarder) => Ok(ConnectionHandle { link, forwarder }),
        Err(e) => {
            if let Err(close_err) = link.disconnect().await {
                log::warn!("Disconnecting {} failed: {}", address, close_err);
            }
            Err(e)
        }
    }
}

async fn subscribe<L: Link>(
    link: &L,
    config: &Config,
    events: &EventSender,
) -> Result<JoinHandle<()>> {
    let identity = &config.identity;

    let service = match link.service(identity.service).await? {
        Some(service) => service,
        None => {
            log::info!("Service not found");
            return Err(Error::ServiceNotFound(identity.service));
        }
    };

    if !service.has_characteristic(identity.notify) {
        log::info!("Characteristic not found");
        return Err(Error::CharacteristicNotFound(identity.notify));
    }

    let mut stream = match link.subscribe(identity.service, identity.notify).await {
        Ok(stream) => stream,
        Err(e) => {
            log::info!("Characteristic notification failed: {}", e);
            return Err(e);
        }
    };
    log::info!("Characteristic notification subscribed");

    let address = link.address();
    let events = events.clone();

    Ok(tokio::spawn(async move {
        while let Some(value) = stream.next().await {
            events.send(StackEvent::Notification { address, value });
        }
        log::debug!("Notification stream of {} ended", address);
    }))
}
