// Copyright (c) 2025 - Cowboy AI, Inc.
//! Traffic Rule Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;

use super::network::{Cidr, PortRange};

/// IP protocol matched by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    /// Every protocol (provider wire value `-1`)
    All,
}

impl Protocol {
    /// Value the cloud API expects
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::All => f.write_str("all"),
            other => f.write_str(other.as_provider_str()),
        }
    }
}

/// Direction of traffic a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

/// One entry of a security policy: (protocol, ports, peer range, direction)
///
/// For ingress rules `peer` is the allowed source range, for egress rules the
/// allowed destination range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficRule {
    pub protocol: Protocol,
    pub ports: PortRange,
    pub peer: Cidr,
    pub direction: Direction,
    pub description: String,
}

impl TrafficRule {
    /// Ingress rule
    pub fn ingress(protocol: Protocol, ports: PortRange, source: Cidr, description: impl Into<String>) -> Self {
        Self {
            protocol,
            ports,
            peer: source,
            direction: Direction::Ingress,
            description: description.into(),
        }
    }

    /// Egress rule
    pub fn egress(protocol: Protocol, ports: PortRange, destination: Cidr, description: impl Into<String>) -> Self {
        Self {
            protocol,
            ports,
            peer: destination,
            direction: Direction::Egress,
            description: description.into(),
        }
    }

    /// Whether the rule admits traffic on `protocol`/`port`
    pub fn matches(&self, protocol: Protocol, port: u16) -> bool {
        let protocol_ok = self.protocol == Protocol::All || self.protocol == protocol;
        let port_ok = self.ports == PortRange::ALL || self.ports.as_range().contains(&port);
        protocol_ok && port_ok
    }

    /// Whether the peer range is the whole internet
    pub fn is_open_to_internet(&self) -> bool {
        self.peer.is_any()
    }
}

impl fmt::Display for TrafficRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Ingress => "from",
            Direction::Egress => "to",
        };
        write!(f, "{} {}/{} {} {}", self.direction_str(), self.protocol, self.ports, arrow, self.peer)
    }
}

impl TrafficRule {
    fn direction_str(&self) -> &'static str {
        match self.direction {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
        }
    }
}
