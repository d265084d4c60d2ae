//! Advertisement matching.
//!
//! The oximeter advertises only briefly after power-on, so every packet that
//! carries the target identifier is taken at once. There is no second look
//! within a scan session.

use uuid::Uuid;

use crate::identity::PeerAddress;
use crate::stack::Advertisement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisementFilter {
    target: Uuid,
}

impl AdvertisementFilter {
    pub fn new(target: Uuid) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Uuid {
        self.target
    }

    /// Pure predicate over the advertised service identifiers.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        advertisement.services.contains(&self.target)
    }

    /// Address to connect to, if the packet came from the target. The caller
    /// stops the scan when this returns `Some`.
    pub fn capture(&self, advertisement: &Advertisement) -> Option<PeerAddress> {
        self.matches(advertisement).then_some(advertisement.address)
    }
}
