//! Measurement requests.
//!
//! The write only asks for a sample; the value itself comes back later as a
//! notification on the subscription armed at connect time.

use crate::identity::DeviceIdentity;
use crate::stack::Link;
use crate::{Error, Result};

/// Write the trigger to the request characteristic. On failure the link is
/// closed before returning; the caller drops its handle and rescans.
pub async fn request_measurement<L: Link>(link: &L, identity: &DeviceIdentity) -> Result<()> {
    match write_trigger(link, identity).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Err(close_err) = link.disconnect().await {
                log::warn!("Disconnecting {} failed: {}", link.address(), close_err);
            }
            Err(e)
        }
    }
}

async fn write_trigger<L: Link>(link: &L, identity: &DeviceIdentity) -> Result<()> {
    let service = match link.service(identity.service).await {
        Ok(Some(service)) => service,
        Ok(None) => {
            log::info!("Service gone");
            return Err(Error::ServiceNotFound(identity.service));
        }
        Err(e) => {
            log::info!("Service lookup failed: {}", e);
            return Err(e);
        }
    };

    if !service.has_characteristic(identity.request) {
        log::info!("Characteristic gone");
        return Err(Error::CharacteristicNotFound(identity.request));
    }

    match link
        .write_request(identity.service, identity.request, &identity.trigger)
        .await
    {
        Ok(()) => {
            log::debug!("Measurement requested");
            Ok(())
        }
        Err(e) => {
            log::info!("Measurement request failed: {}", e);
            Err(e)
        }
    }
}
