//! Network addresses, network classes and routing groups.
//!
//! Addresses are stored in their BIP155 shape: raw bytes tagged by network.
//! Onion (Tor v3) and I2P addresses are only parsed and classified here;
//! nothing in this crate dials them.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use super::errors::AddressParseError;

/// BIP155 network ids, used as the first byte of hash inputs.
const NET_ID_IPV4: u8 = 1;
const NET_ID_IPV6: u8 = 2;
const NET_ID_ONION: u8 = 4;
const NET_ID_I2P: u8 = 5;
const NET_ID_CJDNS: u8 = 6;
const NET_ID_UNROUTABLE: u8 = 0;

const ONION_SUFFIX: &str = ".onion";
const ONION_CHECKSUM_CONST: &[u8] = b".onion checksum";
const ONION_VERSION: u8 = 3;
const I2P_SUFFIX: &str = ".b32.i2p";
const CJDNS_PREFIX: u8 = 0xfc;

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

// =============================================================================
// NETWORK CLASS
// =============================================================================

/// Network class of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Ipv4,
    Ipv6,
    Onion,
    I2p,
    Cjdns,
    /// Catch-all for addresses that are not globally reachable.
    Unroutable,
}

impl Network {
    /// Networks accepted as selection filters.
    pub const FILTERABLE: [Network; 5] = [
        Network::Ipv4,
        Network::Ipv6,
        Network::Onion,
        Network::I2p,
        Network::Cjdns,
    ];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Ipv4 => "ipv4",
            Network::Ipv6 => "ipv6",
            Network::Onion => "onion",
            Network::I2p => "i2p",
            Network::Cjdns => "cjdns",
            Network::Unroutable => "not_publicly_routable",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = AddressParseError;

    /// Parses a selection filter. `not_publicly_routable` is a class, not a
    /// filter, and is rejected like any other unknown token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Network::FILTERABLE
            .iter()
            .copied()
            .find(|net| net.name() == lower)
            .ok_or_else(|| AddressParseError::UnknownNetwork(s.to_string()))
    }
}

// =============================================================================
// NETWORK ADDRESS
// =============================================================================

/// A network address without port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetAddress {
    Ipv4([u8; 4]),
    Ipv6([u8; 16]),
    /// Tor v3 ed25519 public key.
    Onion([u8; 32]),
    /// I2P destination hash.
    I2p([u8; 32]),
    Cjdns([u8; 16]),
}

impl NetAddress {
    /// Convenience constructor for IPv4.
    pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        NetAddress::Ipv4([a, b, c, d])
    }

    /// Parse a host string: dotted IPv4, IPv6 (optionally bracketed),
    /// `<56 chars>.onion` or `<52 chars>.b32.i2p`.
    pub fn parse(host: &str) -> Result<Self, AddressParseError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(AddressParseError::Empty);
        }

        let lower = host.to_ascii_lowercase();
        if let Some(encoded) = lower.strip_suffix(ONION_SUFFIX) {
            return parse_onion(encoded).ok_or_else(|| AddressParseError::InvalidOnion(host.to_string()));
        }
        if let Some(encoded) = lower.strip_suffix(I2P_SUFFIX) {
            return parse_i2p(encoded).ok_or_else(|| AddressParseError::InvalidI2p(host.to_string()));
        }

        let unbracketed = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let ip: IpAddr = unbracketed
            .parse()
            .map_err(|_| AddressParseError::InvalidHost(host.to_string()))?;
        Ok(Self::from(ip))
    }

    /// The raw network of this address, ignoring routability.
    pub fn network(&self) -> Network {
        match self {
            NetAddress::Ipv4(_) => Network::Ipv4,
            NetAddress::Ipv6(_) => Network::Ipv6,
            NetAddress::Onion(_) => Network::Onion,
            NetAddress::I2p(_) => Network::I2p,
            NetAddress::Cjdns(_) => Network::Cjdns,
        }
    }

    /// Network class as reported to callers: `Unroutable` for anything not
    /// globally reachable.
    pub fn net_class(&self) -> Network {
        if self.is_routable() {
            self.network()
        } else {
            Network::Unroutable
        }
    }

    fn net_id(&self) -> u8 {
        match self {
            NetAddress::Ipv4(_) => NET_ID_IPV4,
            NetAddress::Ipv6(_) => NET_ID_IPV6,
            NetAddress::Onion(_) => NET_ID_ONION,
            NetAddress::I2p(_) => NET_ID_I2P,
            NetAddress::Cjdns(_) => NET_ID_CJDNS,
        }
    }

    fn raw_bytes(&self) -> &[u8] {
        match self {
            NetAddress::Ipv4(b) => b,
            NetAddress::Ipv6(b) => b,
            NetAddress::Onion(b) => b,
            NetAddress::I2p(b) => b,
            NetAddress::Cjdns(b) => b,
        }
    }

    /// Whether the address is syntactically usable (not a wildcard,
    /// broadcast or documentation address).
    pub fn is_valid(&self) -> bool {
        match self {
            NetAddress::Ipv4(b) => *b != [0, 0, 0, 0] && *b != [255, 255, 255, 255],
            NetAddress::Ipv6(b) => {
                // RFC3849 documentation prefix and the unspecified address
                *b != [0u8; 16] && !(b[0] == 0x20 && b[1] == 0x01 && b[2] == 0x0d && b[3] == 0xb8)
            }
            NetAddress::Onion(_) | NetAddress::I2p(_) | NetAddress::Cjdns(_) => true,
        }
    }

    /// Whether the address is globally reachable.
    pub fn is_routable(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self {
            NetAddress::Ipv4(b) => !is_reserved_ipv4(b),
            NetAddress::Ipv6(b) => !is_reserved_ipv6(b),
            NetAddress::Onion(_) | NetAddress::I2p(_) | NetAddress::Cjdns(_) => true,
        }
    }

    /// Routing group used for bucketing.
    ///
    /// IPv4 /16, IPv6 /32 (/36 inside he.net), onion and I2P by their top 4
    /// bits, CJDNS by the 4 bits following the constant prefix. IPv6
    /// tunnels that embed an IPv4 address are grouped by that address.
    pub fn group(&self) -> NetGroup {
        if !self.is_routable() {
            return NetGroup([NET_ID_UNROUTABLE, 0, 0, 0, 0, 0]);
        }
        match self {
            NetAddress::Ipv4(b) => NetGroup([NET_ID_IPV4, b[0], b[1], 0, 0, 0]),
            NetAddress::Ipv6(b) => {
                if let Some(v4) = embedded_ipv4(b) {
                    return NetGroup([NET_ID_IPV4, v4[0], v4[1], 0, 0, 0]);
                }
                let he_net = b[0] == 0x20 && b[1] == 0x01 && b[2] == 0x04 && b[3] == 0x70;
                let tail = if he_net { b[4] & 0xf0 } else { 0 };
                NetGroup([NET_ID_IPV6, b[0], b[1], b[2], b[3], tail])
            }
            NetAddress::Onion(b) => NetGroup([NET_ID_ONION, b[0] & 0xf0, 0, 0, 0, 0]),
            NetAddress::I2p(b) => NetGroup([NET_ID_I2P, b[0] & 0xf0, 0, 0, 0, 0]),
            NetAddress::Cjdns(b) => NetGroup([NET_ID_CJDNS, b[0], b[1] & 0xf0, 0, 0, 0]),
        }
    }

    /// Serialized form used as hash input: network id followed by raw bytes.
    pub fn key_bytes(&self) -> Vec<u8> {
        let raw = self.raw_bytes();
        let mut out = Vec::with_capacity(1 + raw.len());
        out.push(self.net_id());
        out.extend_from_slice(raw);
        out
    }
}

impl From<IpAddr> for NetAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => NetAddress::Ipv4(v4.octets()),
            IpAddr::V6(v6) => {
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return NetAddress::Ipv4(v4.octets());
                }
                let octets = v6.octets();
                if octets[0] == CJDNS_PREFIX {
                    NetAddress::Cjdns(octets)
                } else {
                    NetAddress::Ipv6(octets)
                }
            }
        }
    }
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetAddress::Ipv4(b) => write!(f, "{}", Ipv4Addr::from(*b)),
            NetAddress::Ipv6(b) | NetAddress::Cjdns(b) => write!(f, "{}", Ipv6Addr::from(*b)),
            NetAddress::Onion(pubkey) => {
                let mut payload = Vec::with_capacity(35);
                payload.extend_from_slice(pubkey);
                payload.extend_from_slice(&onion_checksum(pubkey));
                payload.push(ONION_VERSION);
                write!(f, "{}{}", base32_encode(&payload), ONION_SUFFIX)
            }
            NetAddress::I2p(hash) => write!(f, "{}{}", base32_encode(hash), I2P_SUFFIX),
        }
    }
}

impl FromStr for NetAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// PEER ADDRESS (identity key)
// =============================================================================

/// Address plus port; the identity of an address record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub addr: NetAddress,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(addr: NetAddress, port: u16) -> Self {
        Self { addr, port }
    }

    /// Parse an untrusted host string and port.
    ///
    /// The port is taken as a wide integer so that out-of-range values
    /// reach validation instead of being truncated by the caller.
    pub fn parse(host: &str, port: i64) -> Result<Self, AddressParseError> {
        let port = u16::try_from(port).map_err(|_| AddressParseError::PortOutOfRange(port))?;
        Ok(Self::new(NetAddress::parse(host)?, port))
    }

    /// Hash input for position and tried-bucket computation.
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut out = self.addr.key_bytes();
        out.extend_from_slice(&self.port.to_be_bytes());
        out
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            NetAddress::Ipv6(_) | NetAddress::Cjdns(_) => write!(f, "[{}]:{}", self.addr, self.port),
            _ => write!(f, "{}:{}", self.addr, self.port),
        }
    }
}

// =============================================================================
// NETWORK GROUP
// =============================================================================

/// Routing group of an address: network id plus up to five prefix bytes,
/// zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetGroup(pub [u8; 6]);

impl NetGroup {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn is_reserved_ipv4(b: &[u8; 4]) -> bool {
    b[0] == 10                                          // RFC1918
        || (b[0] == 192 && b[1] == 168)                 // RFC1918
        || (b[0] == 172 && (16..=31).contains(&b[1]))   // RFC1918
        || (b[0] == 198 && (b[1] == 18 || b[1] == 19))  // RFC2544
        || (b[0] == 169 && b[1] == 254)                 // RFC3927
        || (b[0] == 100 && (64..=127).contains(&b[1]))  // RFC6598
        || (b[0] == 192 && b[1] == 0 && b[2] == 2)      // RFC5737
        || (b[0] == 198 && b[1] == 51 && b[2] == 100)   // RFC5737
        || (b[0] == 203 && b[1] == 0 && b[2] == 113)    // RFC5737
        || b[0] == 0                                    // local
        || b[0] == 127                                  // loopback
}

fn is_reserved_ipv6(b: &[u8; 16]) -> bool {
    let loopback = b[..15].iter().all(|&x| x == 0) && b[15] == 1;
    loopback
        || (b[0] == 0xfe && b[1] == 0x80 && b[2..8].iter().all(|&x| x == 0)) // RFC4862
        || (b[0] & 0xfe) == 0xfc                                               // RFC4193
        || (b[0] == 0x20 && b[1] == 0x01 && b[2] == 0x00 && (b[3] & 0xf0) == 0x10) // RFC4843
        || (b[0] == 0x20 && b[1] == 0x01 && b[2] == 0x00 && (b[3] & 0xf0) == 0x20) // RFC7343
}

/// IPv4 address carried inside 6to4, Teredo or NAT64 IPv6 addresses.
fn embedded_ipv4(b: &[u8; 16]) -> Option<[u8; 4]> {
    if b[0] == 0x20 && b[1] == 0x02 {
        // RFC3964 6to4
        return Some([b[2], b[3], b[4], b[5]]);
    }
    if b[0] == 0x20 && b[1] == 0x01 && b[2] == 0x00 && b[3] == 0x00 {
        // RFC4380 Teredo, client address stored inverted
        return Some([!b[12], !b[13], !b[14], !b[15]]);
    }
    if b[..12] == [0x00, 0x64, 0xff, 0x9b, 0, 0, 0, 0, 0, 0, 0, 0] {
        // RFC6052 NAT64
        return Some([b[12], b[13], b[14], b[15]]);
    }
    None
}

fn onion_checksum(pubkey: &[u8; 32]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(ONION_CHECKSUM_CONST);
    hasher.update(pubkey);
    hasher.update([ONION_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn parse_onion(encoded: &str) -> Option<NetAddress> {
    let payload = base32_decode(encoded)?;
    if payload.len() != 35 || payload[34] != ONION_VERSION {
        return None;
    }
    let mut pubkey = [0u8; 32];
    pubkey.copy_from_slice(&payload[..32]);
    if payload[32..34] != onion_checksum(&pubkey) {
        return None;
    }
    Some(NetAddress::Onion(pubkey))
}

fn parse_i2p(encoded: &str) -> Option<NetAddress> {
    if encoded.len() != 52 {
        return None;
    }
    let payload = base32_decode(encoded)?;
    let hash: [u8; 32] = payload.try_into().ok()?;
    Some(NetAddress::I2p(hash))
}

/// RFC4648 base32, lowercase, no padding.
fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Inverse of [`base32_encode`]. Trailing bits must be zero.
fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for c in input.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    (buffer == 0).then_some(out)
}
