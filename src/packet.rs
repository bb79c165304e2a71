//! BOOTP/DHCP wire format per RFC 2131.
//!
//! A DHCP message is a 236-byte fixed header, a 4-byte magic cookie, and a
//! variable-length options section. Fixed-header fields live at the offsets
//! below; everything multi-byte is big-endian.
//!
//! ```text
//! offset  size  field
//!      0     1  op (1 = BOOTREQUEST, 2 = BOOTREPLY)
//!      1     1  htype
//!      2     1  hlen
//!      3     1  hops
//!      4     4  xid
//!      8     2  secs
//!     10     2  flags (leftmost bit = broadcast)
//!     12     4  ciaddr
//!     16     4  yiaddr
//!     20     4  siaddr
//!     24     4  giaddr
//!     28    16  chaddr
//!     44    64  sname
//!    108   128  file
//!    236     4  magic cookie 99.130.83.99
//!    240     *  options
//! ```

use std::net::Ipv4Addr;

use crate::error::{Error, Result};
use crate::options::{DhcpOption, MessageType, OptionCode, Options};

/// Distinguishes DHCP from plain BOOTP. Written on encode, never checked on
/// parse; an inbound datagram is judged only by length and hlen.
const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const XID_OFFSET: usize = 4;
const SECS_OFFSET: usize = 8;
const FLAGS_OFFSET: usize = 10;
const CIADDR_OFFSET: usize = 12;
const YIADDR_OFFSET: usize = 16;
const SIADDR_OFFSET: usize = 20;
const GIADDR_OFFSET: usize = 24;
const CHADDR_OFFSET: usize = 28;
const SNAME_OFFSET: usize = 44;
const FILE_OFFSET: usize = 108;
const COOKIE_OFFSET: usize = 236;
const OPTIONS_OFFSET: usize = 240;

const _: () = assert!(FILE_OFFSET + FILE_LEN == COOKIE_OFFSET);
const _: () = assert!(COOKIE_OFFSET + MAGIC_COOKIE.len() == OPTIONS_OFFSET);

const CHADDR_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;

/// Anything shorter than header + cookie is not a DHCP packet.
pub const DHCP_FIXED_HEADER_SIZE: usize = OPTIONS_OFFSET;

/// Replies are padded up to the RFC 2131 300-byte floor so BOOTP relay
/// agents accept them.
const MIN_PACKET_SIZE: usize = 300;

/// Broadcast bit of the flags field. RFC 2131 numbers it "bit 0", counting
/// from the left.
const BROADCAST_FLAG: u16 = 0x8000;

/// The chaddr field holds 16 bytes; a larger hlen cannot be honored.
const MAX_HLEN: u8 = 16;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// Hardware type for Ethernet (most common).
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet (6 bytes).
pub const HLEN_ETHERNET: u8 = 6;

/// One decoded BOOTP/DHCP message, request or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpPacket {
    /// [`BOOTREQUEST`] or [`BOOTREPLY`].
    pub op: u8,

    /// Hardware address type.
    pub htype: u8,

    /// Significant length of `chaddr`, at most 16.
    pub hlen: u8,

    /// Relay hop count.
    pub hops: u8,

    /// Client-chosen transaction id, echoed in every reply.
    pub xid: u32,

    /// Seconds since the client started acquiring an address.
    pub secs: u16,

    /// Flags field; see [`is_broadcast`](Self::is_broadcast).
    pub flags: u16,

    /// Client's current address, when it has one.
    pub ciaddr: Ipv4Addr,

    /// "Your" address: what the server is assigning.
    pub yiaddr: Ipv4Addr,

    /// Next-server address (boot server in BOOTP terms).
    pub siaddr: Ipv4Addr,

    /// Relay agent address, passed through untouched.
    pub giaddr: Ipv4Addr,

    /// Client hardware address; first `hlen` bytes are significant.
    pub chaddr: [u8; 16],

    /// Server host name field.
    pub sname: [u8; 64],

    /// Boot file name field.
    pub file: [u8; 128],

    /// Parsed options section.
    pub options: Options,
}

impl DhcpPacket {
    /// Decodes a datagram.
    ///
    /// Rejects with [`Error::InvalidPacket`] only when the datagram is
    /// shorter than 240 bytes or carries an hlen over 16. The options
    /// section is scanned best-effort and never causes a rejection.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_FIXED_HEADER_SIZE {
            return Err(Error::InvalidPacket(format!(
                "{} byte datagram is below the {} byte minimum",
                data.len(),
                DHCP_FIXED_HEADER_SIZE
            )));
        }

        let hlen = data[2];
        if hlen > MAX_HLEN {
            return Err(Error::InvalidPacket(format!(
                "hlen {} does not fit the {} byte chaddr field",
                hlen, MAX_HLEN
            )));
        }

        let mut chaddr = [0u8; CHADDR_LEN];
        chaddr.copy_from_slice(&data[CHADDR_OFFSET..CHADDR_OFFSET + CHADDR_LEN]);

        let mut sname = [0u8; SNAME_LEN];
        sname.copy_from_slice(&data[SNAME_OFFSET..SNAME_OFFSET + SNAME_LEN]);

        let mut file = [0u8; FILE_LEN];
        file.copy_from_slice(&data[FILE_OFFSET..FILE_OFFSET + FILE_LEN]);

        Ok(Self {
            op: data[0],
            htype: data[1],
            hlen,
            hops: data[3],
            xid: read_u32(data, XID_OFFSET),
            secs: read_u16(data, SECS_OFFSET),
            flags: read_u16(data, FLAGS_OFFSET),
            ciaddr: read_addr(data, CIADDR_OFFSET),
            yiaddr: read_addr(data, YIADDR_OFFSET),
            siaddr: read_addr(data, SIADDR_OFFSET),
            giaddr: read_addr(data, GIADDR_OFFSET),
            chaddr,
            sname,
            file,
            options: Options::parse(&data[OPTIONS_OFFSET..]),
        })
    }

    /// Produces the canonical byte layout, cookie included, options
    /// terminated with an End marker, padded to 300 bytes.
    ///
    /// Every field exposed on the struct survives a
    /// `parse(encode(packet))` round trip.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_PACKET_SIZE);

        out.extend_from_slice(&[self.op, self.htype, self.hlen, self.hops]);
        out.extend_from_slice(&self.xid.to_be_bytes());
        out.extend_from_slice(&self.secs.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.ciaddr.octets());
        out.extend_from_slice(&self.yiaddr.octets());
        out.extend_from_slice(&self.siaddr.octets());
        out.extend_from_slice(&self.giaddr.octets());
        out.extend_from_slice(&self.chaddr);
        out.extend_from_slice(&self.sname);
        out.extend_from_slice(&self.file);
        out.extend_from_slice(&MAGIC_COOKIE);

        self.options.encode_into(&mut out);
        out.push(OptionCode::End as u8);
        out.resize(out.len().max(MIN_PACKET_SIZE), 0);

        out
    }

    /// True when the client asked for broadcast delivery.
    pub fn is_broadcast(&self) -> bool {
        (self.flags & BROADCAST_FLAG) != 0
    }

    /// The significant bytes of the hardware address.
    pub fn chaddr_bytes(&self) -> &[u8] {
        let len = (self.hlen as usize).min(self.chaddr.len());
        &self.chaddr[..len]
    }

    /// Hardware address as lowercase colon-separated hex, "aa:bb:cc:dd:ee:ff"
    /// for Ethernet.
    pub fn format_mac(&self) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(self.chaddr_bytes().len() * 3);
        for (index, byte) in self.chaddr_bytes().iter().enumerate() {
            if index > 0 {
                out.push(':');
            }
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }

    /// Identity used to key allocation: the Client Identifier option when
    /// the client sent one, otherwise htype plus the hardware address.
    pub fn client_id(&self) -> Vec<u8> {
        match self.options.client_identifier() {
            Some(id) => id.to_vec(),
            None => {
                let mut id = vec![self.htype];
                id.extend_from_slice(self.chaddr_bytes());
                id
            }
        }
    }

    /// Replaces the boot file name field, zero-padded, truncated at 128
    /// bytes.
    pub fn set_file(&mut self, name: &[u8]) {
        self.file = [0u8; FILE_LEN];
        let len = name.len().min(FILE_LEN);
        self.file[..len].copy_from_slice(&name[..len]);
    }

    /// Builds a BOOTREPLY answering `request`.
    ///
    /// The message type lands first in the options section, followed by
    /// `options` in the order given. The transaction id, flags, relay
    /// address, hardware type/length, and hardware address are copied from
    /// the request verbatim; the client needs them to match the reply to
    /// its exchange.
    pub fn create_reply(
        request: &DhcpPacket,
        message_type: MessageType,
        your_ip: Ipv4Addr,
        server_ip: Ipv4Addr,
        options: Vec<DhcpOption>,
    ) -> Self {
        let mut reply_options = Options::new();
        reply_options.push_option(&DhcpOption::MessageType(message_type));
        for option in &options {
            reply_options.push_option(option);
        }

        Self {
            op: BOOTREPLY,
            htype: request.htype,
            hlen: request.hlen,
            hops: 0,
            xid: request.xid,
            secs: 0,
            flags: request.flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: your_ip,
            siaddr: server_ip,
            giaddr: request.giaddr,
            chaddr: request.chaddr,
            sname: [0u8; SNAME_LEN],
            file: [0u8; FILE_LEN],
            options: reply_options,
        }
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_addr(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    )
}

impl std::fmt::Display for DhcpPacket {
    /// One-line field dump for debug tracing.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "op={} htype={} hlen={} hops={} xid={:08x} secs={} flags={:04x} \
             ciaddr={} yiaddr={} siaddr={} giaddr={} chaddr={}",
            self.op,
            self.htype,
            self.hlen,
            self.hops,
            self.xid,
            self.secs,
            self.flags,
            self.ciaddr,
            self.yiaddr,
            self.siaddr,
            self.giaddr,
            self.format_mac()
        )
    }
}
