//! Address allocation behind a narrow, injectable seam.
//!
//! The protocol engine never decides which address a client gets; it asks an
//! [`AddressAllocator`]. The only policy shipped here is
//! [`StaticAllocator`], which hands every client the same configured
//! address. A real pool with conflict detection and expiry can be
//! substituted without touching the protocol logic.

use std::net::Ipv4Addr;

use crate::config::Config;

/// A candidate address grant for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// The address to offer or acknowledge.
    pub address: Ipv4Addr,

    /// Lease duration in seconds.
    pub lease_seconds: u32,
}

/// Source of client addresses.
///
/// `reserve` returns `None` when no address is available for the client;
/// the caller drops the request without a reply. Implementations must be
/// callable from the receive loop, so they are synchronous and thread-safe.
pub trait AddressAllocator: Send + Sync {
    /// Picks an address and lease duration for the client.
    fn reserve(&self, client_id: &[u8]) -> Option<Reservation>;

    /// Notes that the client has given up its address.
    fn release(&self, client_id: &[u8]);
}

/// Allocator that always grants the single configured client address.
///
/// No per-client state is kept: every client is offered the same address
/// with the same lease, and `release` is a no-op.
#[derive(Debug, Clone)]
pub struct StaticAllocator {
    address: Ipv4Addr,
    lease_seconds: u32,
}

impl StaticAllocator {
    pub fn new(address: Ipv4Addr, lease_seconds: u32) -> Self {
        Self {
            address,
            lease_seconds,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.client_address, config.lease_duration_seconds)
    }
}

impl AddressAllocator for StaticAllocator {
    fn reserve(&self, _client_id: &[u8]) -> Option<Reservation> {
        Some(Reservation {
            address: self.address,
            lease_seconds: self.lease_seconds,
        })
    }

    fn release(&self, _client_id: &[u8]) {}
}
