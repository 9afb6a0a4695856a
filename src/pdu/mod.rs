//! PDU and Address Module
//!
//! Protocol data units pair protocol control information (addresses and
//! control flags) with a payload buffer, and [`PduData`] is the byte cursor
//! every codec in the stack reads from and writes to. [`Address`] models the
//! six BACnet address kinds and the many textual forms they are written in.
//!
//! # Overview
//!
//! - [`PduData`]: cursor over a byte buffer with single-octet, N-octet,
//!   16-bit and 32-bit big-endian accessors; reads fail with a decoding
//!   error when not enough octets remain.
//! - [`Address`]: null, local/remote station, local/remote broadcast and
//!   global broadcast, parsed from wildcard, dotted IPv4, ethernet,
//!   decimal and hex literal notations.
//! - [`Pci`]/[`Pdu`]: addressing and control flags carried alongside the
//!   payload.
//!
//! # Example
//!
//! ```rust
//! use bacstack::pdu::Address;
//!
//! let station: Address = "10.1.2.3:47809".parse().unwrap();
//! assert_eq!(station.to_string(), "10.1.2.3:47809");
//!
//! let default_port: Address = "10.1.2.3:47808".parse().unwrap();
//! assert_eq!(default_port.to_string(), "10.1.2.3");
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{string::String, string::ToString, vec, vec::Vec};

use core::net::{Ipv4Addr, SocketAddrV4};
use core::str::FromStr;

use bytes::{Buf, BufMut, BytesMut};
use log::debug;

use crate::encoding::{EncodingError, Result as EncodingResult};
use crate::util::{from_hex, to_hex, to_hex_string};

/// The well-known BACnet/IP UDP port (0xBAC0).
pub const DEFAULT_PORT: u16 = 47808;

/// The registered BACnet/IP port range, 0xBAC0 through 0xBACF.
pub const REGISTERED_PORTS: core::ops::RangeInclusive<u16> = 47808..=47823;

/// Result type for address parsing
#[cfg(feature = "std")]
pub type AddressResult<T> = std::result::Result<T, AddressError>;

#[cfg(not(feature = "std"))]
pub type AddressResult<T> = core::result::Result<T, AddressError>;

/// Errors raised while parsing or constructing addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Textual address syntax not recognized
    UnrecognizedFormat,
    /// Station octet, port or mask out of range
    AddressOutOfRange,
    /// Network number out of range (0..=65534)
    NetworkOutOfRange,
    /// The constructor form does not apply to this address kind
    InvalidForm,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::UnrecognizedFormat => write!(f, "Unrecognized address format"),
            AddressError::AddressOutOfRange => write!(f, "Address out of range"),
            AddressError::NetworkOutOfRange => write!(f, "Network out of range"),
            AddressError::InvalidForm => write!(f, "Address form not applicable"),
        }
    }
}

#[cfg(feature = "std")]
impl Error for AddressError {}

/// Cursor over a payload buffer.
///
/// Writes append at the back, reads consume from the front. Every read
/// checks the remaining length first and fails with
/// [`EncodingError::UnexpectedEndOfData`] instead of panicking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduData {
    buf: BytesMut,
}

impl PduData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
        }
    }

    /// Octets left to read.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The unread portion of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Read one octet.
    pub fn get(&mut self) -> EncodingResult<u8> {
        if self.buf.remaining() < 1 {
            return Err(EncodingError::UnexpectedEndOfData);
        }
        Ok(self.buf.get_u8())
    }

    /// Read `dlen` octets.
    pub fn get_data(&mut self, dlen: usize) -> EncodingResult<Vec<u8>> {
        if self.buf.remaining() < dlen {
            return Err(EncodingError::UnexpectedEndOfData);
        }
        let mut data = vec![0u8; dlen];
        self.buf.copy_to_slice(&mut data);
        Ok(data)
    }

    /// Read a 16-bit big-endian unsigned integer.
    pub fn get_short(&mut self) -> EncodingResult<u16> {
        if self.buf.remaining() < 2 {
            return Err(EncodingError::UnexpectedEndOfData);
        }
        Ok(self.buf.get_u16())
    }

    /// Read a 32-bit big-endian unsigned integer.
    pub fn get_long(&mut self) -> EncodingResult<u32> {
        if self.buf.remaining() < 4 {
            return Err(EncodingError::UnexpectedEndOfData);
        }
        Ok(self.buf.get_u32())
    }

    /// Append one octet.
    pub fn put(&mut self, octet: u8) {
        self.buf.put_u8(octet);
    }

    /// Append a run of octets.
    pub fn put_data(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Append a 16-bit big-endian unsigned integer.
    pub fn put_short(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Append a 32-bit big-endian unsigned integer.
    pub fn put_long(&mut self, value: u32) {
        self.buf.put_u32(value);
    }
}

impl From<Vec<u8>> for PduData {
    fn from(data: Vec<u8>) -> Self {
        Self {
            buf: BytesMut::from(&data[..]),
        }
    }
}

/// A BACnet address.
///
/// Station payloads are raw link-layer octets. A six-octet payload is by
/// convention an IPv4 address followed by a big-endian UDP port and both
/// parses from and renders to the dotted `a.b.c.d[:port]` form, with the
/// `:port` suffix suppressed for the default port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Address {
    #[default]
    Null,
    LocalBroadcast,
    LocalStation(Vec<u8>),
    RemoteBroadcast(u16),
    RemoteStation(u16, Vec<u8>),
    GlobalBroadcast,
}

impl Address {
    /// Construct a local station from raw link-layer octets.
    pub fn local_station(addr: Vec<u8>) -> AddressResult<Self> {
        if addr.is_empty() {
            return Err(AddressError::AddressOutOfRange);
        }
        Ok(Address::LocalStation(addr))
    }

    /// Construct a remote station from a network number and raw octets.
    pub fn remote_station(net: u16, addr: Vec<u8>) -> AddressResult<Self> {
        if net == 0xFFFF {
            return Err(AddressError::NetworkOutOfRange);
        }
        if addr.is_empty() {
            return Err(AddressError::AddressOutOfRange);
        }
        Ok(Address::RemoteStation(net, addr))
    }

    /// Promote a local station or local broadcast to the remote variant by
    /// attaching a network number. This is the only way to construct a
    /// remote address from a local one.
    pub fn with_network(net: u16, local: &Address) -> AddressResult<Self> {
        if net == 0xFFFF {
            return Err(AddressError::NetworkOutOfRange);
        }
        match local {
            Address::LocalStation(addr) => Ok(Address::RemoteStation(net, addr.clone())),
            Address::LocalBroadcast => Ok(Address::RemoteBroadcast(net)),
            _ => Err(AddressError::InvalidForm),
        }
    }

    /// The network number for remote addresses.
    pub fn network(&self) -> Option<u16> {
        match self {
            Address::RemoteBroadcast(net) | Address::RemoteStation(net, _) => Some(*net),
            _ => None,
        }
    }

    /// The raw station octets for station addresses.
    pub fn mac(&self) -> Option<&[u8]> {
        match self {
            Address::LocalStation(addr) | Address::RemoteStation(_, addr) => Some(addr),
            _ => None,
        }
    }

    /// True for the three broadcast kinds.
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            Address::LocalBroadcast | Address::RemoteBroadcast(_) | Address::GlobalBroadcast
        )
    }

    /// The IPv4 address and port of a six-octet station payload.
    pub fn socket_addr(&self) -> Option<SocketAddrV4> {
        let mac = self.mac()?;
        let (ip, port) = unpack_ip_addr(mac)?;
        Some(SocketAddrV4::new(ip, port))
    }

    fn parse(addr: &str) -> AddressResult<Self> {
        if addr == "*" {
            return Ok(Address::LocalBroadcast);
        }
        if addr == "*:*" {
            return Ok(Address::GlobalBroadcast);
        }

        if let Some(parsed) = Self::parse_ip_form(addr)? {
            return Ok(parsed);
        }

        if let Some(parsed) = Self::parse_ethernet_form(addr) {
            return Ok(parsed);
        }

        if addr.bytes().all(|b| b.is_ascii_digit()) && !addr.is_empty() {
            let octet: u32 = addr.parse().map_err(|_| AddressError::AddressOutOfRange)?;
            if octet > 255 {
                return Err(AddressError::AddressOutOfRange);
            }
            return Ok(Address::LocalStation(vec![octet as u8]));
        }

        if let Some(net) = addr.strip_suffix(":*") {
            if net.bytes().all(|b| b.is_ascii_digit()) && !net.is_empty() {
                return Ok(Address::RemoteBroadcast(parse_network(net)?));
            }
        }

        if let Some((net, station)) = addr.split_once(':') {
            if net.bytes().all(|b| b.is_ascii_digit()) && !net.is_empty() {
                let net = parse_network(net)?;

                if station.bytes().all(|b| b.is_ascii_digit()) && !station.is_empty() {
                    let octet: u32 =
                        station.parse().map_err(|_| AddressError::AddressOutOfRange)?;
                    if octet > 255 {
                        return Err(AddressError::AddressOutOfRange);
                    }
                    return Ok(Address::RemoteStation(net, vec![octet as u8]));
                }

                if let Some(mac) = parse_hex_literal(station) {
                    return Ok(Address::RemoteStation(net, mac));
                }

                return Err(AddressError::UnrecognizedFormat);
            }
        }

        if let Some(mac) = parse_hex_literal(addr) {
            return Ok(Address::LocalStation(mac));
        }

        debug!("unrecognized address form: {:?}", addr);
        Err(AddressError::UnrecognizedFormat)
    }

    /// `[net:]a.b.c.d[/mask][:port]`
    fn parse_ip_form(addr: &str) -> AddressResult<Option<Self>> {
        let (net, rest) = match addr.split_once(':') {
            Some((prefix, rest))
                if !prefix.is_empty()
                    && prefix.bytes().all(|b| b.is_ascii_digit())
                    && rest.contains('.') =>
            {
                (Some(prefix), rest)
            }
            _ => (None, addr),
        };

        let (ip_and_mask, port) = match rest.rsplit_once(':') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };

        let (ip_str, mask) = match ip_and_mask.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (ip_and_mask, None),
        };

        let Ok(ip) = Ipv4Addr::from_str(ip_str) else {
            return Ok(None);
        };

        if let Some(mask) = mask {
            let mask: u32 = mask.parse().map_err(|_| AddressError::UnrecognizedFormat)?;
            if mask > 32 {
                return Err(AddressError::AddressOutOfRange);
            }
        }

        let port = match port {
            Some(text) => {
                let port: u32 = text.parse().map_err(|_| AddressError::UnrecognizedFormat)?;
                if port > 65535 {
                    return Err(AddressError::AddressOutOfRange);
                }
                port as u16
            }
            None => DEFAULT_PORT,
        };

        let mac = pack_ip_addr(ip, port);
        Ok(Some(match net {
            Some(net) => Address::RemoteStation(parse_network(net)?, mac),
            None => Address::LocalStation(mac),
        }))
    }

    /// `aa:bb:cc:dd:ee:ff`
    fn parse_ethernet_form(addr: &str) -> Option<Self> {
        let groups: Vec<&str> = addr.split(':').collect();
        if groups.len() != 6 {
            return None;
        }
        let mut mac = Vec::with_capacity(6);
        for group in groups {
            if group.len() != 2 {
                return None;
            }
            mac.extend(from_hex(group)?);
        }
        Some(Address::LocalStation(mac))
    }
}

fn parse_network(text: &str) -> AddressResult<u16> {
    let net: u32 = text.parse().map_err(|_| AddressError::NetworkOutOfRange)?;
    if net >= 65535 {
        return Err(AddressError::NetworkOutOfRange);
    }
    Ok(net as u16)
}

/// `0x0102…` or `X'0102…'`
fn parse_hex_literal(text: &str) -> Option<Vec<u8>> {
    if let Some(digits) = text.strip_prefix("0x") {
        return from_hex(digits);
    }
    if let Some(rest) = text.strip_prefix("X'") {
        let digits = rest.strip_suffix('\'')?;
        return from_hex(digits);
    }
    None
}

/// Pack an IPv4 address and port into the six-octet station form.
pub fn pack_ip_addr(ip: Ipv4Addr, port: u16) -> Vec<u8> {
    let mut mac = Vec::with_capacity(6);
    mac.extend_from_slice(&ip.octets());
    mac.extend_from_slice(&port.to_be_bytes());
    mac
}

/// Unpack a six-octet station payload into an IPv4 address and port.
pub fn unpack_ip_addr(mac: &[u8]) -> Option<(Ipv4Addr, u16)> {
    if mac.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(mac[0], mac[1], mac[2], mac[3]);
    let port = u16::from_be_bytes([mac[4], mac[5]]);
    Some((ip, port))
}

/// The directed broadcast station for an IPv4 address under the given
/// prefix length, on the same port.
pub fn broadcast_address(ip: Ipv4Addr, mask: u32, port: u16) -> AddressResult<Address> {
    if mask > 32 {
        return Err(AddressError::AddressOutOfRange);
    }
    let host_bits = u32::MAX.checked_shr(mask).unwrap_or(0);
    let broadcast = Ipv4Addr::from(u32::from(ip) | host_bits);
    Ok(Address::LocalStation(pack_ip_addr(broadcast, port)))
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> AddressResult<Self> {
        Address::parse(s)
    }
}

impl From<SocketAddrV4> for Address {
    fn from(addr: SocketAddrV4) -> Self {
        Address::LocalStation(pack_ip_addr(*addr.ip(), addr.port()))
    }
}

impl From<(Ipv4Addr, u16)> for Address {
    fn from((ip, port): (Ipv4Addr, u16)) -> Self {
        Address::LocalStation(pack_ip_addr(ip, port))
    }
}

fn write_station(f: &mut fmt::Formatter<'_>, mac: &[u8]) -> fmt::Result {
    if mac.len() == 1 {
        return write!(f, "{}", mac[0]);
    }
    if let Some((ip, port)) = unpack_ip_addr(mac) {
        if REGISTERED_PORTS.contains(&port) {
            write!(f, "{}", ip)?;
            if port != DEFAULT_PORT {
                write!(f, ":{}", port)?;
            }
            return Ok(());
        }
    }
    write!(f, "0x{}", to_hex(mac))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Null => write!(f, "Null"),
            Address::LocalBroadcast => write!(f, "*"),
            Address::LocalStation(mac) => write_station(f, mac),
            Address::RemoteBroadcast(net) => write!(f, "{}:*", net),
            Address::RemoteStation(net, mac) => {
                write!(f, "{}:", net)?;
                write_station(f, mac)
            }
            Address::GlobalBroadcast => write!(f, "*:*"),
        }
    }
}

/// Protocol control information carried alongside a payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pci {
    pub source: Option<Address>,
    pub destination: Option<Address>,
    /// A reply is expected for this unit (see 6.2.2)
    pub expecting_reply: bool,
    /// Network priority, 0..=3 (see 6.2.2)
    pub network_priority: u8,
    /// Opaque correlation data owned by the caller
    pub user_data: Option<Vec<u8>>,
}

impl Pci {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the control fields from another unit.
    pub fn update(&mut self, other: &Pci) {
        self.source = other.source.clone();
        self.destination = other.destination.clone();
        self.expecting_reply = other.expecting_reply;
        self.network_priority = other.network_priority;
        self.user_data = other.user_data.clone();
    }
}

/// A protocol data unit: control information plus a payload cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pdu {
    pub pci: Pci,
    pub data: PduData,
}

impl Pdu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: &[u8]) -> Self {
        Self {
            pci: Pci::new(),
            data: PduData::from_slice(data),
        }
    }

    /// A unit carrying the same payload with control fields copied from
    /// `other` - the usual way a layer rewraps a unit on the way down.
    pub fn like(other: &Pdu, data: PduData) -> Self {
        let mut pci = Pci::new();
        pci.update(&other.pci);
        Self { pci, data }
    }
}

impl fmt::Display for Pdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .pci
            .source
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?".to_string());
        let destination = self
            .pci
            .destination
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "<Pdu {} -> {} : {}>",
            source,
            destination,
            to_hex_string(self.data.as_slice(), '.')
        )
    }
}
