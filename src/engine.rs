//! The DHCP message-processing engine.
//!
//! Decodes one inbound datagram, dispatches on its message type, and
//! synthesizes the reply packet, if any. The engine is synchronous and
//! CPU-only; it owns no socket and no state beyond its configuration and
//! the injected [`AddressAllocator`], so every request/response cycle is
//! independent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::allocator::{AddressAllocator, StaticAllocator};
use crate::config::Config;
use crate::options::{DhcpOption, MessageType, select_order_or_all};
use crate::packet::DhcpPacket;

/// An ephemeral grant backing one OFFER or ACK.
///
/// Constructed fresh per reply and discarded with it; nothing here is
/// persisted.
#[derive(Debug, Clone)]
pub struct LeaseOffer {
    /// The address granted to the client.
    pub address: Ipv4Addr,

    /// Lease duration in seconds.
    pub lease_seconds: u32,

    /// Configuration options to attach, already selected and ordered per
    /// the client's Parameter Request List.
    pub options: Vec<DhcpOption>,
}

pub struct Engine {
    config: Arc<Config>,
    allocator: Arc<dyn AddressAllocator>,
}

impl Engine {
    /// Creates an engine using the single-address [`StaticAllocator`]
    /// derived from the configuration.
    pub fn new(config: Arc<Config>) -> Self {
        let allocator = Arc::new(StaticAllocator::from_config(&config));
        Self::with_allocator(config, allocator)
    }

    /// Creates an engine with an injected address allocator.
    pub fn with_allocator(config: Arc<Config>, allocator: Arc<dyn AddressAllocator>) -> Self {
        Self { config, allocator }
    }

    /// Processes one inbound datagram and returns the reply packet, if any.
    ///
    /// Datagrams that are not valid DHCP messages (shorter than 240 bytes,
    /// hardware address length over 16, or missing a legal message type)
    /// are dropped with debug-level tracing only. Message types this server
    /// does not serve are dropped the same way.
    pub fn handle(&self, data: &[u8]) -> Option<DhcpPacket> {
        let packet = match DhcpPacket::parse(data) {
            Ok(packet) => packet,
            Err(error) => {
                debug!("Discarding datagram: {}", error);
                return None;
            }
        };

        let Some(message_type) = packet.options.message_type() else {
            debug!(
                "Discarding packet without valid message type from {}",
                packet.format_mac()
            );
            return None;
        };

        match message_type {
            MessageType::Discover => self.handle_discover(&packet),
            MessageType::Request => self.handle_request(&packet),
            MessageType::Release | MessageType::Decline => {
                self.handle_release(&packet, message_type)
            }
            other => {
                debug!("Ignoring {} from {}", other, packet.format_mac());
                None
            }
        }
    }

    /// DISCOVER: offer the allocator's address with the selected options.
    fn handle_discover(&self, request: &DhcpPacket) -> Option<DhcpPacket> {
        debug!("DISCOVER {}", request);

        let reservation = match self.allocator.reserve(&request.client_id()) {
            Some(reservation) => reservation,
            None => {
                warn!("No address available for {}", request.format_mac());
                return None;
            }
        };

        let offer = LeaseOffer {
            address: reservation.address,
            lease_seconds: reservation.lease_seconds,
            options: self.selected_options(request),
        };
        let reply = self.lease_reply(request, MessageType::Offer, &offer);

        info!("OFFER {} to {}", offer.address, request.format_mac());
        Some(reply)
    }

    /// REQUEST: ACK the requested address, or NAK when none was requested.
    ///
    /// A request carrying another server's identifier is not for us and
    /// produces no reply at all.
    fn handle_request(&self, request: &DhcpPacket) -> Option<DhcpPacket> {
        debug!("REQUEST {}", request);

        if let Some(server_id) = request.options.server_identifier()
            && server_id != self.config.server_ip
        {
            debug!(
                "REQUEST from {} is for different server {}",
                request.format_mac(),
                server_id
            );
            return None;
        }

        let Some(requested_ip) = request.options.requested_ip() else {
            let nak = DhcpPacket::create_reply(
                request,
                MessageType::Nak,
                Ipv4Addr::UNSPECIFIED,
                self.config.server_ip,
                vec![],
            );
            info!("NAK to {}", request.format_mac());
            return Some(nak);
        };

        let offer = LeaseOffer {
            address: requested_ip,
            lease_seconds: self.config.lease_duration_seconds,
            options: self.selected_options(request),
        };
        let mut ack = self.lease_reply(request, MessageType::Ack, &offer);

        if let Some(pxe) = &self.config.pxe {
            ack.siaddr = pxe.next_server;
            ack.set_file(pxe.boot_file.as_bytes());
        }

        info!(
            "ACK {} to {} (lease: {} seconds)",
            requested_ip,
            request.format_mac(),
            offer.lease_seconds
        );
        Some(ack)
    }

    /// RELEASE and DECLINE are notifications, not exchanges: note them,
    /// tell the allocator, send nothing back.
    fn handle_release(
        &self,
        request: &DhcpPacket,
        message_type: MessageType,
    ) -> Option<DhcpPacket> {
        self.allocator.release(&request.client_id());
        info!(
            "{} from {} for {}",
            message_type,
            request.format_mac(),
            request.ciaddr
        );
        None
    }

    /// Decides where the reply datagram goes.
    ///
    /// A client without an address yet (source 0.0.0.0), or one that set
    /// the broadcast flag, cannot receive unicast; the reply goes to the
    /// subnet broadcast address at the client's source port. Everyone else
    /// gets unicast back to the source transport address. The reply carries
    /// the request's flags verbatim, so its broadcast bit is the client's.
    pub fn resolve_destination(&self, reply: &DhcpPacket, source: SocketAddr) -> SocketAddr {
        let needs_broadcast = match source.ip() {
            IpAddr::V4(ip) => ip.is_unspecified() || reply.is_broadcast(),
            // The socket is IPv4-only; anything else is unaddressable.
            IpAddr::V6(_) => true,
        };

        if needs_broadcast {
            SocketAddr::new(IpAddr::V4(self.config.broadcast()), source.port())
        } else {
            source
        }
    }

    /// The server's static option set, in its stable configured order.
    fn static_options(&self) -> Vec<DhcpOption> {
        vec![
            DhcpOption::SubnetMask(self.config.subnet_mask),
            DhcpOption::Router(self.config.routers.clone()),
            DhcpOption::DnsServer(self.config.dns_servers.clone()),
        ]
    }

    fn selected_options(&self, request: &DhcpPacket) -> Vec<DhcpOption> {
        select_order_or_all(
            &self.static_options(),
            request.options.parameter_request_list(),
        )
    }

    /// Builds an OFFER or ACK from a lease offer: server identifier and
    /// lease time first, then the selected configuration options in order.
    fn lease_reply(
        &self,
        request: &DhcpPacket,
        message_type: MessageType,
        offer: &LeaseOffer,
    ) -> DhcpPacket {
        let mut options = vec![
            DhcpOption::ServerIdentifier(self.config.server_ip),
            DhcpOption::LeaseTime(offer.lease_seconds),
        ];
        options.extend(offer.options.iter().cloned());

        DhcpPacket::create_reply(
            request,
            message_type,
            offer.address,
            self.config.server_ip,
            options,
        )
    }
}
