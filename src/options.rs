//! DHCP options as defined in RFC 2132.
//!
//! DHCP uses options to convey configuration parameters between servers and
//! clients. Each option has a code (1 byte), length (1 byte), and
//! variable-length data.
//!
//! Inbound options are kept as raw bytes in an [`Options`] table so that a
//! mis-sized value (say, a 3-byte Requested IP Address) degrades to "option
//! absent" instead of invalidating the whole packet. Reply options are built
//! from the typed [`DhcpOption`] values.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions

use std::net::Ipv4Addr;

/// Maximum number of IP addresses in Router (3) or DNS Server (6) options.
///
/// Options have a 1-byte length field, so maximum data is 255 bytes.
/// With 4 bytes per IPv4 address, that's 63 addresses maximum.
const MAX_ADDRESSES_PER_OPTION: usize = 63;

/// DHCP option codes as defined in RFC 2132.
///
/// Only codes used by this implementation are defined; the [`Options`]
/// table stores any code as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Router = 3,
    /// DNS server addresses (RFC 2132 §3.8).
    DnsServer = 6,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Parameter request list (RFC 2132 §9.8).
    ParameterRequestList = 55,
    /// Client identifier (RFC 2132 §9.14).
    ClientIdentifier = 61,
    /// End of options marker.
    End = 255,
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
///
/// These values indicate the purpose of a DHCP message in the protocol
/// exchange. Values outside 1 through 8 are not valid DHCP messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

/// The parsed options section of a DHCP packet.
///
/// Maps option codes to raw value bytes. Keys are unique (the first
/// occurrence of a duplicated code wins) and encounter order is preserved,
/// so the order of options in an encoded reply is exactly the order they
/// were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    entries: Vec<(u8, Vec<u8>)>,
}

impl Options {
    /// Creates an empty option table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the options section of a DHCP packet.
    ///
    /// Scans (code, length, value) triples until the End marker or the end
    /// of the buffer. Pad bytes are skipped. Parsing is best-effort over a
    /// fixed-size buffer: a truncated trailing triple ends the scan rather
    /// than failing, since truncation cannot be distinguished from padding.
    pub fn parse(section: &[u8]) -> Self {
        let mut entries: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut index = 0;

        while index < section.len() {
            let code = section[index];

            if code == OptionCode::Pad as u8 {
                index += 1;
                continue;
            }

            if code == OptionCode::End as u8 {
                break;
            }

            if index + 1 >= section.len() {
                break;
            }

            let length = section[index + 1] as usize;
            if index + 2 + length > section.len() {
                break;
            }

            let value = section[index + 2..index + 2 + length].to_vec();
            if !entries.iter().any(|(existing, _)| *existing == code) {
                entries.push((code, value));
            }

            index += 2 + length;
        }

        Self { entries }
    }

    /// Returns the raw value bytes for an option code, if present.
    pub fn get(&self, code: u8) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == code)
            .map(|(_, value)| value.as_slice())
    }

    /// Appends an option. The value is truncated to 255 bytes (the TLV
    /// length field is one byte).
    pub fn push(&mut self, code: u8, mut value: Vec<u8>) {
        value.truncate(255);
        self.entries.push((code, value));
    }

    /// Appends a typed option.
    pub fn push_option(&mut self, option: &DhcpOption) {
        self.push(option.code(), option.value());
    }

    /// Iterates over (code, value) entries in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.entries
            .iter()
            .map(|(code, value)| (*code, value.as_slice()))
    }

    /// Option codes in encounter order.
    pub fn codes(&self) -> Vec<u8> {
        self.entries.iter().map(|(code, _)| *code).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the DHCP message type (Option 53).
    ///
    /// Returns `None` unless the value is exactly one byte in the legal
    /// 1 through 8 range. A packet without a valid message type is not a
    /// DHCP message.
    pub fn message_type(&self) -> Option<MessageType> {
        match self.get(OptionCode::MessageType as u8) {
            Some([value]) => MessageType::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the requested IP address (Option 50) if present and exactly
    /// 4 bytes.
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.addr(OptionCode::RequestedIpAddress as u8)
    }

    /// Returns the server identifier (Option 54) if present and exactly
    /// 4 bytes.
    ///
    /// Clients include this in REQUEST to indicate which server's offer
    /// they are accepting.
    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        self.addr(OptionCode::ServerIdentifier as u8)
    }

    /// Returns the parameter request list (Option 55) if present.
    ///
    /// This is an ordered list of option codes the client wants in the
    /// response.
    pub fn parameter_request_list(&self) -> Option<&[u8]> {
        self.get(OptionCode::ParameterRequestList as u8)
    }

    /// Returns the client identifier (Option 61) if present.
    pub fn client_identifier(&self) -> Option<&[u8]> {
        self.get(OptionCode::ClientIdentifier as u8)
    }

    fn addr(&self, code: u8) -> Option<Ipv4Addr> {
        match self.get(code) {
            Some(&[a, b, c, d]) => Some(Ipv4Addr::new(a, b, c, d)),
            _ => None,
        }
    }

    /// Appends the TLV encoding of every entry to `buffer`. The End marker
    /// is not written here; the packet encoder appends it.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        for (code, value) in &self.entries {
            buffer.push(*code);
            buffer.push(value.len() as u8);
            buffer.extend_from_slice(value);
        }
    }
}

impl FromIterator<DhcpOption> for Options {
    fn from_iter<I: IntoIterator<Item = DhcpOption>>(iter: I) -> Self {
        let mut options = Self::new();
        for option in iter {
            options.push_option(&option);
        }
        options
    }
}

/// A typed DHCP option value, used when constructing replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    /// Subnet mask (Option 1).
    SubnetMask(Ipv4Addr),
    /// Router/gateway addresses (Option 3). First address is the default
    /// gateway.
    Router(Vec<Ipv4Addr>),
    /// DNS server addresses (Option 6).
    DnsServer(Vec<Ipv4Addr>),
    /// Client's requested IP address (Option 50).
    RequestedIpAddress(Ipv4Addr),
    /// Lease time in seconds (Option 51).
    LeaseTime(u32),
    /// DHCP message type (Option 53).
    MessageType(MessageType),
    /// Server identifier, the IP of the DHCP server (Option 54).
    ServerIdentifier(Ipv4Addr),
    /// List of option codes the client wants (Option 55).
    ParameterRequestList(Vec<u8>),
}

impl DhcpOption {
    /// Returns the RFC 2132 option code for this option.
    pub fn code(&self) -> u8 {
        match self {
            Self::SubnetMask(_) => OptionCode::SubnetMask as u8,
            Self::Router(_) => OptionCode::Router as u8,
            Self::DnsServer(_) => OptionCode::DnsServer as u8,
            Self::RequestedIpAddress(_) => OptionCode::RequestedIpAddress as u8,
            Self::LeaseTime(_) => OptionCode::LeaseTime as u8,
            Self::MessageType(_) => OptionCode::MessageType as u8,
            Self::ServerIdentifier(_) => OptionCode::ServerIdentifier as u8,
            Self::ParameterRequestList(_) => OptionCode::ParameterRequestList as u8,
        }
    }

    /// Returns the option value bytes (without code and length).
    pub fn value(&self) -> Vec<u8> {
        match self {
            Self::SubnetMask(addr)
            | Self::RequestedIpAddress(addr)
            | Self::ServerIdentifier(addr) => addr.octets().to_vec(),
            Self::Router(addrs) | Self::DnsServer(addrs) => address_list_bytes(addrs),
            Self::LeaseTime(seconds) => seconds.to_be_bytes().to_vec(),
            Self::MessageType(message_type) => vec![*message_type as u8],
            Self::ParameterRequestList(codes) => {
                let len = codes.len().min(255);
                codes[..len].to_vec()
            }
        }
    }

    /// Encodes the option to its wire format (code + length + data).
    pub fn encode(&self) -> Vec<u8> {
        let value = self.value();
        let mut result = vec![self.code(), value.len() as u8];
        result.extend_from_slice(&value);
        result
    }
}

fn address_list_bytes(addrs: &[Ipv4Addr]) -> Vec<u8> {
    let count = addrs.len().min(MAX_ADDRESSES_PER_OPTION);
    let mut value = Vec::with_capacity(count * 4);
    for addr in addrs.iter().take(count) {
        value.extend_from_slice(&addr.octets());
    }
    value
}

/// Selects reply options per the client's Parameter Request List.
///
/// Returns the static options intersected with `requested` in the client's
/// requested order. An absent or empty request list returns all static
/// options in their given order. Clients that only honor the first few
/// options depend on this ordering, so tests pin it.
pub fn select_order_or_all(
    static_options: &[DhcpOption],
    requested: Option<&[u8]>,
) -> Vec<DhcpOption> {
    match requested {
        Some(codes) if !codes.is_empty() => codes
            .iter()
            .filter_map(|code| {
                static_options
                    .iter()
                    .find(|option| option.code() == *code)
                    .cloned()
            })
            .collect(),
        _ => static_options.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_set() -> Vec<DhcpOption> {
        vec![
            DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)),
            DhcpOption::Router(vec![Ipv4Addr::new(192, 168, 182, 1)]),
            DhcpOption::DnsServer(vec![Ipv4Addr::new(192, 168, 182, 1)]),
        ]
    }

    #[test]
    fn test_message_type_conversions() {
        for value in 1..=8u8 {
            let message_type = MessageType::try_from(value).unwrap();
            assert_eq!(message_type as u8, value);
        }
        assert!(MessageType::try_from(0).is_err());
        assert!(MessageType::try_from(9).is_err());
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(format!("{}", MessageType::Discover), "DISCOVER");
        assert_eq!(format!("{}", MessageType::Offer), "OFFER");
        assert_eq!(format!("{}", MessageType::Request), "REQUEST");
        assert_eq!(format!("{}", MessageType::Decline), "DECLINE");
        assert_eq!(format!("{}", MessageType::Ack), "ACK");
        assert_eq!(format!("{}", MessageType::Nak), "NAK");
        assert_eq!(format!("{}", MessageType::Release), "RELEASE");
        assert_eq!(format!("{}", MessageType::Inform), "INFORM");
    }

    #[test]
    fn test_parse_basic_table() {
        let section = [53, 1, 1, 50, 4, 192, 168, 182, 50, 255];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 2);
        assert_eq!(options.message_type(), Some(MessageType::Discover));
        assert_eq!(
            options.requested_ip(),
            Some(Ipv4Addr::new(192, 168, 182, 50))
        );
    }

    #[test]
    fn test_parse_skips_pad_bytes() {
        let section = [0, 0, 0, 53, 1, 3, 0, 255];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 1);
        assert_eq!(options.message_type(), Some(MessageType::Request));
    }

    #[test]
    fn test_parse_stops_at_end_marker() {
        let section = [53, 1, 1, 255, 50, 4, 1, 2, 3, 4];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 1);
        assert!(options.requested_ip().is_none());
    }

    #[test]
    fn test_parse_ignores_truncated_trailing_option() {
        let section = [53, 1, 1, 50, 4, 192, 168];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 1);
        assert_eq!(options.message_type(), Some(MessageType::Discover));
    }

    #[test]
    fn test_parse_ignores_option_missing_length_byte() {
        let section = [53, 1, 1, 51];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 1);
        assert!(options.get(51).is_none());
    }

    #[test]
    fn test_duplicate_code_first_occurrence_wins() {
        let section = [53, 1, 1, 53, 1, 3, 255];
        let options = Options::parse(&section);

        assert_eq!(options.len(), 1);
        assert_eq!(options.message_type(), Some(MessageType::Discover));
    }

    #[test]
    fn test_message_type_out_of_range_is_none() {
        let section = [53, 1, 9, 255];
        assert!(Options::parse(&section).message_type().is_none());

        let section = [53, 1, 0, 255];
        assert!(Options::parse(&section).message_type().is_none());
    }

    #[test]
    fn test_message_type_wrong_length_is_none() {
        let section = [53, 2, 1, 1, 255];
        assert!(Options::parse(&section).message_type().is_none());

        let section = [53, 0, 255];
        assert!(Options::parse(&section).message_type().is_none());
    }

    #[test]
    fn test_mis_sized_requested_ip_is_none() {
        let section = [50, 3, 192, 168, 182, 255];
        let options = Options::parse(&section);

        assert!(options.get(50).is_some());
        assert!(options.requested_ip().is_none());
    }

    #[test]
    fn test_empty_parameter_request_list_preserved() {
        let section = [55, 0, 255];
        let options = Options::parse(&section);
        assert_eq!(options.parameter_request_list(), Some(&[][..]));
    }

    #[test]
    fn test_option_value_roundtrip_through_table() {
        let typed = vec![
            DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)),
            DhcpOption::Router(vec![Ipv4Addr::new(192, 168, 182, 1)]),
            DhcpOption::DnsServer(vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(8, 8, 4, 4)]),
            DhcpOption::RequestedIpAddress(Ipv4Addr::new(192, 168, 182, 50)),
            DhcpOption::LeaseTime(7200),
            DhcpOption::MessageType(MessageType::Offer),
            DhcpOption::ServerIdentifier(Ipv4Addr::new(192, 168, 182, 1)),
            DhcpOption::ParameterRequestList(vec![1, 3, 6]),
        ];

        let table: Options = typed.iter().cloned().collect();
        let mut wire = Vec::new();
        table.encode_into(&mut wire);
        wire.push(OptionCode::End as u8);

        let reparsed = Options::parse(&wire);
        assert_eq!(table, reparsed);
        for option in &typed {
            assert_eq!(reparsed.get(option.code()), Some(option.value().as_slice()));
        }
    }

    #[test]
    fn test_encode_shape() {
        let encoded = DhcpOption::LeaseTime(7200).encode();
        assert_eq!(encoded, vec![51, 4, 0, 0, 0x1c, 0x20]);
    }

    #[test]
    fn test_router_list_capped_at_63_addresses() {
        let addrs = vec![Ipv4Addr::new(10, 0, 0, 1); 100];
        let value = DhcpOption::Router(addrs).value();
        assert_eq!(value.len(), MAX_ADDRESSES_PER_OPTION * 4);
    }

    #[test]
    fn test_select_order_follows_request_list() {
        let selected = select_order_or_all(&static_set(), Some(&[3, 1]));

        let codes: Vec<u8> = selected.iter().map(DhcpOption::code).collect();
        assert_eq!(codes, vec![3, 1]);
    }

    #[test]
    fn test_select_skips_codes_not_in_static_set() {
        let selected = select_order_or_all(&static_set(), Some(&[15, 3, 44]));

        let codes: Vec<u8> = selected.iter().map(DhcpOption::code).collect();
        assert_eq!(codes, vec![3]);
    }

    #[test]
    fn test_select_all_when_request_list_absent() {
        let selected = select_order_or_all(&static_set(), None);

        let codes: Vec<u8> = selected.iter().map(DhcpOption::code).collect();
        assert_eq!(codes, vec![1, 3, 6]);
    }

    #[test]
    fn test_select_all_when_request_list_empty() {
        let selected = select_order_or_all(&static_set(), Some(&[]));

        let codes: Vec<u8> = selected.iter().map(DhcpOption::code).collect();
        assert_eq!(codes, vec![1, 3, 6]);
    }
}
