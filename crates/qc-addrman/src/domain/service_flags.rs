//! Advertised peer service bits.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::errors::AddressParseError;

/// Bit-flag set of protocol capabilities a peer advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceFlags(pub u64);

impl ServiceFlags {
    pub const NONE: ServiceFlags = ServiceFlags(0);
    /// Serves the full chain.
    pub const NETWORK: ServiceFlags = ServiceFlags(1 << 0);
    /// Supports bloom-filtered connections.
    pub const BLOOM: ServiceFlags = ServiceFlags(1 << 2);
    /// Serves witness data.
    pub const WITNESS: ServiceFlags = ServiceFlags(1 << 3);
    /// Serves compact block filters.
    pub const COMPACT_FILTERS: ServiceFlags = ServiceFlags(1 << 6);
    /// Serves only recent blocks.
    pub const NETWORK_LIMITED: ServiceFlags = ServiceFlags(1 << 10);
    /// Supports the encrypted v2 transport.
    pub const P2P_V2: ServiceFlags = ServiceFlags(1 << 11);

    /// Services a manually inserted address is assumed to offer.
    pub const DEFAULT_MANUAL: ServiceFlags = ServiceFlags(Self::NETWORK.0 | Self::WITNESS.0);

    const KNOWN: [(ServiceFlags, &'static str); 6] = [
        (Self::NETWORK, "NETWORK"),
        (Self::BLOOM, "BLOOM"),
        (Self::WITNESS, "WITNESS"),
        (Self::COMPACT_FILTERS, "COMPACT_FILTERS"),
        (Self::NETWORK_LIMITED, "NETWORK_LIMITED"),
        (Self::P2P_V2, "P2P_V2"),
    ];

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, other: ServiceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Decoded names in ascending bit order. Bits without a name render as
    /// `UNKNOWN[2^n]`.
    pub fn names(&self) -> Vec<String> {
        (0..64u32)
            .filter(|bit| self.0 & (1u64 << bit) != 0)
            .map(|bit| {
                let flag = ServiceFlags(1u64 << bit);
                Self::KNOWN
                    .iter()
                    .find(|(known, _)| *known == flag)
                    .map(|(_, name)| (*name).to_string())
                    .unwrap_or_else(|| format!("UNKNOWN[2^{}]", bit))
            })
            .collect()
    }

    /// Inverse of [`ServiceFlags::names`].
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, AddressParseError> {
        let mut flags = ServiceFlags::NONE;
        for name in names {
            let name = name.as_ref();
            flags |= Self::parse_name(name)
                .ok_or_else(|| AddressParseError::InvalidServiceName(name.to_string()))?;
        }
        Ok(flags)
    }

    fn parse_name(name: &str) -> Option<ServiceFlags> {
        if let Some((flag, _)) = Self::KNOWN.iter().find(|(_, known)| *known == name) {
            return Some(*flag);
        }
        let exponent = name.strip_prefix("UNKNOWN[2^")?.strip_suffix(']')?;
        let bit: u32 = exponent.parse().ok()?;
        (bit < 64).then(|| ServiceFlags(1u64 << bit))
    }

    /// Zero-padded 16 digit hex, as reported over RPC.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, AddressParseError> {
        u64::from_str_radix(hex, 16)
            .map(ServiceFlags)
            .map_err(|_| AddressParseError::InvalidServiceHex(hex.to_string()))
    }
}

impl BitOr for ServiceFlags {
    type Output = ServiceFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ServiceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ServiceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ServiceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
