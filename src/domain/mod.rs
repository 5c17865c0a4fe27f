// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Domain Value Objects
//!
//! Validated building blocks shared by the topology declarations:
//!
//! - [`Cidr`] - IPv4 address block in CIDR notation
//! - [`PortRange`] - inclusive port range for traffic rules
//! - [`TrafficRule`] - one security-policy entry
//! - [`NodeHostname`] - single-label RFC 1123 node hostname
//! - [`NodeRole`] - control-plane or worker

pub mod hostname;
pub mod network;
pub mod traffic;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use hostname::{HostnameError, NodeHostname};
pub use network::{Cidr, NetworkError, PortRange};
pub use traffic::{Direction, Protocol, TrafficRule};

/// Role of a cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    /// Runs the k3s server (API, scheduler, datastore)
    ControlPlane,
    /// Runs the k3s agent and joins the control plane; ordinal is 1-based
    Worker { ordinal: usize },
}

impl NodeRole {
    /// Hostname the node gives itself on first boot
    pub fn hostname(&self) -> NodeHostname {
        match self {
            NodeRole::ControlPlane => NodeHostname::control_plane(),
            NodeRole::Worker { ordinal } => NodeHostname::worker(*ordinal),
        }
    }

    /// Alias used in the SSH access profile
    pub fn ssh_alias(&self) -> String {
        match self {
            NodeRole::ControlPlane => "master".to_string(),
            NodeRole::Worker { ordinal } => format!("worker-{ordinal}"),
        }
    }

    /// Whether this is the control-plane role
    pub fn is_control_plane(&self) -> bool {
        matches!(self, NodeRole::ControlPlane)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::ControlPlane => f.write_str("control-plane"),
            NodeRole::Worker { ordinal } => write!(f, "worker-{ordinal}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(NodeRole::ControlPlane.hostname().as_str(), "k3s-master");
        assert_eq!(NodeRole::ControlPlane.ssh_alias(), "master");
        assert_eq!(NodeRole::Worker { ordinal: 2 }.hostname().as_str(), "k3s-worker2");
        assert_eq!(NodeRole::Worker { ordinal: 2 }.ssh_alias(), "worker-2");
        assert_eq!(NodeRole::Worker { ordinal: 2 }.to_string(), "worker-2");
    }

    #[test]
    fn test_control_plane_sorts_first() {
        let mut roles = vec![
            NodeRole::Worker { ordinal: 2 },
            NodeRole::ControlPlane,
            NodeRole::Worker { ordinal: 1 },
        ];
        roles.sort();
        assert_eq!(
            roles,
            vec![
                NodeRole::ControlPlane,
                NodeRole::Worker { ordinal: 1 },
                NodeRole::Worker { ordinal: 2 },
            ]
        );
    }
}
