// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Hostname Value Object with DNS Label Invariants
//!
//! Cluster nodes rename themselves on first boot (`hostnamectl set-hostname`),
//! and the k3s node name is taken from that hostname. A k3s node name must be
//! a single RFC 1123 label, so the value object is stricter than a general
//! FQDN: no dots, lowercase only.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hostname validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostnameError {
    #[error("Hostname is empty")]
    Empty,

    #[error("Hostname exceeds maximum length of 63 characters: {0}")]
    TooLong(String),

    #[error("Invalid character in hostname: {0:?}")]
    InvalidCharacter(char),

    #[error("Hostname cannot start or end with hyphen: {0}")]
    InvalidLabelFormat(String),

    #[error("Hostname cannot be all numeric: {0}")]
    NumericLabel(String),
}

/// Single-label hostname assigned to a cluster node
///
/// Invariants:
/// - 1 to 63 characters
/// - lowercase ASCII letters, digits and hyphens only
/// - does not start or end with a hyphen
/// - not all digits
///
/// # Examples
///
/// ```rust
/// use cim_cluster_bootstrap::domain::NodeHostname;
///
/// assert_eq!(NodeHostname::control_plane().as_str(), "k3s-master");
/// assert_eq!(NodeHostname::worker(2).as_str(), "k3s-worker2");
/// assert!(NodeHostname::new("k3s_master").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeHostname(String);

impl NodeHostname {
    /// Maximum label length (RFC 1123)
    pub const MAX_LENGTH: usize = 63;

    /// Prefix shared by every node in the cluster
    pub const PREFIX: &'static str = "k3s";

    /// Create a new hostname with validation
    pub fn new(hostname: impl Into<String>) -> Result<Self, HostnameError> {
        let hostname = hostname.into();

        if hostname.is_empty() {
            return Err(HostnameError::Empty);
        }

        if hostname.len() > Self::MAX_LENGTH {
            return Err(HostnameError::TooLong(hostname));
        }

        if let Some(ch) = hostname
            .chars()
            .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-'))
        {
            return Err(HostnameError::InvalidCharacter(ch));
        }

        if hostname.starts_with('-') || hostname.ends_with('-') {
            return Err(HostnameError::InvalidLabelFormat(hostname));
        }

        if hostname.chars().all(|c| c.is_ascii_digit()) {
            return Err(HostnameError::NumericLabel(hostname));
        }

        Ok(Self(hostname))
    }

    /// Hostname of the control-plane node
    pub fn control_plane() -> Self {
        Self(format!("{}-master", Self::PREFIX))
    }

    /// Hostname of the worker with the given 1-based ordinal
    pub fn worker(ordinal: usize) -> Self {
        Self(format!("{}-worker{}", Self::PREFIX, ordinal))
    }

    /// Get the hostname as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeHostname {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeHostname {
    type Error = HostnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeHostname {
    type Error = HostnameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeHostname> for String {
    fn from(hostname: NodeHostname) -> Self {
        hostname.0
    }
}
