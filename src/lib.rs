//! # leaselet
//!
//! A minimal DHCP server implementing the RFC 2131 (DHCP) and RFC 2132
//! (DHCP Options) wire format. It listens on UDP port 67, decodes
//! BOOTP/DHCP requests, and synthesizes OFFER, ACK, and NAK replies that
//! lease a single statically configured IPv4 address.
//!
//! ## Features
//!
//! - DISCOVER/OFFER and REQUEST/ACK/NAK exchanges, RELEASE and DECLINE
//!   notifications
//! - Reply options selected and ordered per the client's Parameter
//!   Request List
//! - Unicast/broadcast reply routing per RFC 2131 delivery rules
//! - Pluggable address allocation behind [`AddressAllocator`]
//! - Supervised receive loop with open/close lifecycle
//! - Async/await with Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use leaselet::{Config, DhcpServer};
//!
//! #[tokio::main]
//! async fn main() -> leaselet::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let server = DhcpServer::new(config)?;
//!     server.open().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.close().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Config`] - Server addressing and lease policy
//! - [`DhcpServer`] - Lifecycle and the UDP receive loop
//! - [`Engine`] - Message dispatch, reply synthesis, destination resolution
//! - [`AddressAllocator`] - Address selection seam ([`StaticAllocator`] by
//!   default)
//! - [`DhcpPacket`] - DHCP packet parsing and encoding
//! - [`Options`] / [`DhcpOption`] - DHCP option table and typed values

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod options;
pub mod packet;
pub mod server;

pub use allocator::{AddressAllocator, Reservation, StaticAllocator};
pub use config::{Config, PxeBoot};
pub use engine::{Engine, LeaseOffer};
pub use error::{Error, Result};
pub use options::{DhcpOption, MessageType, OptionCode, Options};
pub use packet::DhcpPacket;
pub use server::DhcpServer;
