use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub routers: Vec<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub lease_duration_seconds: u32,
    /// The single address handed to every client. See
    /// [`StaticAllocator`](crate::allocator::StaticAllocator).
    pub client_address: Ipv4Addr,
    pub broadcast_address: Option<Ipv4Addr>,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional legacy PXE override for ACK replies. Disabled by default.
    pub pxe: Option<PxeBoot>,
}

/// Boot-server override applied to ACK replies when configured.
///
/// Overwrites the reply's boot file name and next-server (siaddr) fields.
/// This is a PXE-era side channel, not base DHCP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PxeBoot {
    pub boot_file: String,
    pub next_server: Ipv4Addr,
}

fn default_port() -> u16 {
    67
}

impl Default for Config {
    fn default() -> Self {
        let server_ip = Ipv4Addr::new(192, 168, 182, 1);
        Self {
            server_ip,
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            routers: vec![server_ip],
            dns_servers: vec![server_ip],
            lease_duration_seconds: 7200,
            client_address: Ipv4Addr::new(192, 168, 182, 50),
            broadcast_address: None,
            port: default_port(),
            pxe: None,
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_ip.is_unspecified() {
            return Err(Error::InvalidConfig(
                "server_ip must be specified".to_string(),
            ));
        }

        if self.client_address.is_unspecified() {
            return Err(Error::InvalidConfig(
                "client_address must be specified".to_string(),
            ));
        }

        if self.client_address == self.server_ip {
            return Err(Error::InvalidConfig(
                "client_address must differ from server_ip".to_string(),
            ));
        }

        if self.lease_duration_seconds == 0 {
            return Err(Error::InvalidConfig(
                "lease_duration_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The subnet broadcast address replies are sent to.
    ///
    /// An explicit `broadcast_address` wins; otherwise derived from the
    /// server address and subnet mask.
    pub fn broadcast(&self) -> Ipv4Addr {
        if let Some(broadcast) = self.broadcast_address {
            return broadcast;
        }

        let ip = u32::from(self.server_ip);
        let mask = u32::from(self.subnet_mask);
        Ipv4Addr::from(ip | !mask)
    }
}
