// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants
//!
//! Only syntax is validated here. Range overlap and subnet containment are the
//! provider's business and are rejected there, not locally.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0} (expected a.b.c.d/len)")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("Invalid port range: {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },
}

/// IPv4 address block in CIDR notation
///
/// Invariants:
/// - Valid dotted-quad address
/// - Prefix length 0-32 and always present
///
/// The address part is kept as written, so `10.0.1.7/24` round-trips
/// unchanged; [`Cidr::network`] gives the masked base address.
///
/// # Examples
///
/// ```rust
/// use cim_cluster_bootstrap::domain::Cidr;
///
/// let block = Cidr::new("10.0.1.0/24").unwrap();
/// assert_eq!(block.prefix_length(), 24);
/// assert!(block.contains("10.0.1.5".parse().unwrap()));
/// assert!(Cidr::new("10.0.1.0").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: Ipv4Addr,
    prefix_length: u8,
}

impl Cidr {
    /// `0.0.0.0/0`, every IPv4 address
    pub const ANY: Cidr = Cidr {
        address: Ipv4Addr::UNSPECIFIED,
        prefix_length: 0,
    };

    /// Parse `a.b.c.d/len`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    /// Address part as written
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    fn mask(&self) -> u32 {
        match self.prefix_length {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        }
    }

    /// Base address of the block (host bits cleared)
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & self.mask())
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    /// Whether `ip` falls inside the block
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask() == u32::from(self.network())
    }

    /// Whether `other` lies entirely inside this block
    pub fn covers(&self, other: &Cidr) -> bool {
        other.prefix_length >= self.prefix_length && self.contains(other.network())
    }

    /// The `offset`-th address of the block, if it exists
    pub fn nth(&self, offset: u64) -> Option<Ipv4Addr> {
        if offset >= self.size() {
            return None;
        }
        // offset < 2^32 here, so the cast is lossless
        Some(Ipv4Addr::from(u32::from(self.network()) + offset as u32))
    }

    /// Whether this is the catch-all `0.0.0.0/0` block
    pub fn is_any(&self) -> bool {
        self.prefix_length == 0
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}

/// Inclusive TCP/UDP port range
///
/// `PortRange::ALL` (0-0) is the provider's convention for "every port",
/// used together with the all-protocols marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    from: u16,
    to: u16,
}

impl PortRange {
    /// Every port (provider convention `0-0`)
    pub const ALL: PortRange = PortRange { from: 0, to: 0 };

    /// A single port
    pub const fn single(port: u16) -> Self {
        Self { from: port, to: port }
    }

    /// An inclusive range, `from <= to`
    pub fn new(from: u16, to: u16) -> Result<Self, NetworkError> {
        if from > to {
            return Err(NetworkError::InvalidPortRange { start: from, end: to });
        }
        Ok(Self { from, to })
    }

    /// First port
    pub fn from_port(&self) -> u16 {
        self.from
    }

    /// Last port
    pub fn to_port(&self) -> u16 {
        self.to
    }

    /// As an inclusive std range
    pub fn as_range(&self) -> RangeInclusive<u16> {
        self.from..=self.to
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}
