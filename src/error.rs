//! Error types for the DHCP server.
//!
//! Fallible operations return the crate-wide [`Result<T>`] built on
//! [`Error`]. Malformed datagrams surface as [`Error::InvalidPacket`]
//! inside the engine and are then dropped without a reply; only lifecycle
//! and I/O failures reach callers.

/// Everything that can go wrong while serving DHCP.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The datagram is not a DHCP packet: under 240 bytes, or its hlen
    /// does not fit the chaddr field.
    #[error("Invalid DHCP packet: {0}")]
    InvalidPacket(String),

    /// A configuration value fails [`Config::validate`](crate::Config::validate).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket setup failed, usually binding port 67 without privileges.
    #[error("Socket error: {0}")]
    Socket(String),

    /// `open()` while already open.
    #[error("Server is already open")]
    AlreadyOpen,

    /// `close()` while already closed.
    #[error("Server is already closed")]
    AlreadyClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
