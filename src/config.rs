// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Configuration
//!
//! Every input the stack consumes, with defaults matching the reference
//! deployment (a `/16` VPC with one public `/24` subnet in `ap-southeast-1a`,
//! Ubuntu 24.04, two `t3.small` workers).
//!
//! Configuration can come from three places, merged in this order:
//!
//! 1. [`ClusterConfig::default`]
//! 2. a JSON file ([`ClusterConfig::from_json_file`]) - missing keys keep
//!    their defaults
//! 3. `CLUSTER_*` environment variables ([`ClusterConfig::with_env_overrides`])
//!
//! [`ClusterConfig::validate`] is the only local check performed before the
//! stack is declared. It checks syntax, never provider-side facts such as
//! whether the subnet actually fits inside the VPC.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Cidr;
use crate::errors::{ProvisionError, ProvisionResult};

/// Shared k3s join token
///
/// The token is embedded in a double-quoted shell word, so characters that
/// would end or expand that word are rejected. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterToken(String);

impl ClusterToken {
    /// Characters that cannot appear inside `"..."` in a shell script
    const FORBIDDEN: &'static [char] = &['"', '$', '`', '\\', '\n', '\r'];

    /// Validate and wrap a token
    pub fn new(token: impl Into<String>) -> ProvisionResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(ProvisionError::configuration("k3s token is empty"));
        }
        if let Some(ch) = token.chars().find(|ch| Self::FORBIDDEN.contains(ch)) {
            return Err(ProvisionError::configuration(format!(
                "k3s token contains forbidden character {ch:?}"
            )));
        }
        Ok(Self(token))
    }

    /// The raw token, for embedding in bootstrap payloads
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClusterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClusterToken(<redacted>)")
    }
}

/// Source range allowed by an ingress rule whose scope is a policy choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngressScope {
    /// Only the cluster subnet
    Subnet,
    /// The whole internet (`0.0.0.0/0`)
    Anywhere,
    /// An explicit range, e.g. an operator's office network
    Custom(Cidr),
}

impl IngressScope {
    /// Concrete source range given the cluster subnet
    pub fn source_range(&self, subnet: Cidr) -> Cidr {
        match self {
            IngressScope::Subnet => subnet,
            IngressScope::Anywhere => Cidr::ANY,
            IngressScope::Custom(range) => *range,
        }
    }
}

/// Scopes for the administrative and application ports
///
/// The k3s API and flannel VXLAN ports are always limited to the subnet and
/// are not configurable. The defaults keep the reference deployment's
/// asymmetry: SSH and HTTP open to the internet, HTTPS subnet-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressPolicy {
    pub ssh: IngressScope,
    pub http: IngressScope,
    pub https: IngressScope,
}

impl Default for IngressPolicy {
    fn default() -> Self {
        Self {
            ssh: IngressScope::Anywhere,
            http: IngressScope::Anywhere,
            https: IngressScope::Subnet,
        }
    }
}

/// Bounds for the control-plane readiness poll in the bootstrap payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessProbe {
    /// Polls before the node gives up and reports a timeout
    pub max_attempts: u32,
    /// Seconds between polls
    pub interval_secs: u32,
}

impl ReadinessProbe {
    /// Worst-case time spent polling
    pub fn budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_attempts) * u64::from(self.interval_secs))
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_secs: 5,
        }
    }
}

/// Full configuration for one cluster stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub vpc_cidr: Cidr,
    pub public_subnet_cidr: Cidr,
    pub availability_zone: String,
    pub ami_id: String,
    pub k3s_token: ClusterToken,
    /// EC2 key pair name attached to every instance
    pub key_name: String,
    pub worker_count: usize,
    pub instance_type: String,
    /// Login user written to the SSH access profile
    pub ssh_user: String,
    /// Identity file written to the SSH access profile, verbatim
    pub identity_file: String,
    /// Where the SSH access profile is written; `~/` is expanded
    pub ssh_config_path: String,
    pub readiness: ReadinessProbe,
    pub ingress: IngressPolicy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            vpc_cidr: Cidr::from_parts([10, 0, 0, 0].into(), 16).unwrap_or(Cidr::ANY),
            public_subnet_cidr: Cidr::from_parts([10, 0, 1, 0].into(), 24).unwrap_or(Cidr::ANY),
            availability_zone: "ap-southeast-1a".to_string(),
            ami_id: "ami-060e277c0d4cce553".to_string(),
            k3s_token: ClusterToken("super-secret-token".to_string()),
            key_name: "k3s-cluster".to_string(),
            worker_count: 2,
            instance_type: "t3.small".to_string(),
            ssh_user: "ubuntu".to_string(),
            identity_file: "~/.ssh/k3s-cluster.id_rsa".to_string(),
            ssh_config_path: "~/.ssh/config".to_string(),
            readiness: ReadinessProbe::default(),
            ingress: IngressPolicy::default(),
        }
    }
}

impl ClusterConfig {
    /// Upper bound on workers in a single-subnet cluster
    pub const MAX_WORKERS: usize = 200;

    /// Defaults overridden by `CLUSTER_*` environment variables
    pub fn from_env() -> ProvisionResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load a JSON file; keys that are absent keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> ProvisionResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply overrides from a variable lookup
    ///
    /// Recognised keys: `CLUSTER_VPC_CIDR`, `CLUSTER_SUBNET_CIDR`,
    /// `CLUSTER_AVAILABILITY_ZONE`, `CLUSTER_AMI_ID`, `CLUSTER_K3S_TOKEN`,
    /// `CLUSTER_KEY_NAME`, `CLUSTER_WORKER_COUNT`, `CLUSTER_INSTANCE_TYPE`,
    /// `CLUSTER_SSH_USER`, `CLUSTER_IDENTITY_FILE`, `CLUSTER_SSH_CONFIG`,
    /// `CLUSTER_SSH_INGRESS` (`subnet`, `anywhere` or a CIDR).
    pub fn with_env_overrides<F>(mut self, lookup: F) -> ProvisionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CLUSTER_VPC_CIDR") {
            self.vpc_cidr = Cidr::new(value)?;
        }
        if let Some(value) = lookup("CLUSTER_SUBNET_CIDR") {
            self.public_subnet_cidr = Cidr::new(value)?;
        }
        if let Some(value) = lookup("CLUSTER_AVAILABILITY_ZONE") {
            self.availability_zone = value;
        }
        if let Some(value) = lookup("CLUSTER_AMI_ID") {
            self.ami_id = value;
        }
        if let Some(value) = lookup("CLUSTER_K3S_TOKEN") {
            self.k3s_token = ClusterToken::new(value)?;
        }
        if let Some(value) = lookup("CLUSTER_KEY_NAME") {
            self.key_name = value;
        }
        if let Some(value) = lookup("CLUSTER_WORKER_COUNT") {
            self.worker_count = value.trim().parse().map_err(|_| {
                ProvisionError::configuration(format!("CLUSTER_WORKER_COUNT is not a count: {value}"))
            })?;
        }
        if let Some(value) = lookup("CLUSTER_INSTANCE_TYPE") {
            self.instance_type = value;
        }
        if let Some(value) = lookup("CLUSTER_SSH_USER") {
            self.ssh_user = value;
        }
        if let Some(value) = lookup("CLUSTER_IDENTITY_FILE") {
            self.identity_file = value;
        }
        if let Some(value) = lookup("CLUSTER_SSH_CONFIG") {
            self.ssh_config_path = value;
        }
        if let Some(value) = lookup("CLUSTER_SSH_INGRESS") {
            self.ingress.ssh = match value.trim() {
                "subnet" => IngressScope::Subnet,
                "anywhere" => IngressScope::Anywhere,
                range => IngressScope::Custom(Cidr::new(range)?),
            };
        }
        Ok(self)
    }

    /// Local configuration checks
    ///
    /// Rejects empty identifiers, an out-of-range worker count and a
    /// zero-length readiness bound. Tokens are checked on construction.
    pub fn validate(&self) -> ProvisionResult<()> {
        let required = [
            ("availability_zone", &self.availability_zone),
            ("ami_id", &self.ami_id),
            ("key_name", &self.key_name),
            ("instance_type", &self.instance_type),
            ("ssh_user", &self.ssh_user),
            ("identity_file", &self.identity_file),
            ("ssh_config_path", &self.ssh_config_path),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProvisionError::configuration(format!("{field} must not be empty")));
            }
        }

        // Embedded unquoted in the control-plane payload
        let user_ok = self.ssh_user.starts_with(|ch: char| ch.is_ascii_lowercase() || ch == '_')
            && self
                .ssh_user
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-');
        if !user_ok {
            return Err(ProvisionError::configuration(format!(
                "ssh_user {:?} is not a valid login name",
                self.ssh_user
            )));
        }

        // Deserialized tokens bypass ClusterToken::new
        ClusterToken::new(self.k3s_token.expose())?;

        if self.worker_count > Self::MAX_WORKERS {
            return Err(ProvisionError::configuration(format!(
                "worker_count {} exceeds maximum of {}",
                self.worker_count,
                Self::MAX_WORKERS
            )));
        }

        if self.readiness.max_attempts == 0 || self.readiness.interval_secs == 0 {
            return Err(ProvisionError::configuration(
                "readiness probe needs at least one attempt and a non-zero interval",
            ));
        }

        Ok(())
    }

    /// Access-profile path with a leading `~/` expanded
    pub fn resolved_ssh_config_path(&self) -> ProvisionResult<PathBuf> {
        expand_home(&self.ssh_config_path)
    }
}

/// Expand a leading `~/` (or a bare `~`) to the current user's home
pub fn expand_home(path: &str) -> ProvisionResult<PathBuf> {
    let rest = match path.strip_prefix('~') {
        None => return Ok(PathBuf::from(path)),
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        // `~user/...` is left to the shell
        Some(_) => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir()
        .ok_or_else(|| ProvisionError::configuration("cannot determine home directory"))?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.vpc_cidr.to_string(), "10.0.0.0/16");
        assert_eq!(config.public_subnet_cidr.to_string(), "10.0.1.0/24");
        assert_eq!(config.availability_zone, "ap-southeast-1a");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.k3s_token.expose(), "super-secret-token");
        assert_eq!(config.readiness.budget(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ClusterConfig::default()
            .with_env_overrides(lookup(&[
                ("CLUSTER_K3S_TOKEN", "T"),
                ("CLUSTER_WORKER_COUNT", "3"),
                ("CLUSTER_SUBNET_CIDR", "10.0.8.0/24"),
                ("CLUSTER_SSH_INGRESS", "198.51.100.0/24"),
            ]))
            .unwrap();

        assert_eq!(config.k3s_token.expose(), "T");
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.public_subnet_cidr.to_string(), "10.0.8.0/24");
        assert_eq!(
            config.ingress.ssh,
            IngressScope::Custom(Cidr::new("198.51.100.0/24").unwrap())
        );
        assert_eq!(config.ami_id, ClusterConfig::default().ami_id);
    }

    #[test]
    fn test_env_rejects_malformed_values() {
        let bad_cidr = ClusterConfig::default().with_env_overrides(lookup(&[("CLUSTER_VPC_CIDR", "10.0.0.0")]));
        assert!(matches!(bad_cidr, Err(ProvisionError::Network(_))));

        let bad_count = ClusterConfig::default().with_env_overrides(lookup(&[("CLUSTER_WORKER_COUNT", "two")]));
        assert!(matches!(bad_count, Err(ProvisionError::Configuration(_))));
    }

    #[test]
    fn test_token_validation() {
        assert!(ClusterToken::new("abc-123").is_ok());
        assert!(ClusterToken::new("").is_err());
        assert!(ClusterToken::new("a\"b").is_err());
        assert!(ClusterToken::new("$(reboot)").is_err());
        assert_eq!(format!("{:?}", ClusterToken::new("secret").unwrap()), "ClusterToken(<redacted>)");
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = ClusterConfig::default();
        config.ami_id = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::default();
        config.worker_count = ClusterConfig::MAX_WORKERS + 1;
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::default();
        config.readiness.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::default();
        config.k3s_token = serde_json::from_str("\"bad`token\"").unwrap();
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::default();
        config.ssh_user = "root; rm -rf /".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"worker_count": 4, "ingress": {{"ssh": "subnet"}}, "readiness": {{"max_attempts": 10}}}}"#
        )
        .unwrap();

        let config = ClusterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.ingress.ssh, IngressScope::Subnet);
        assert_eq!(config.ingress.http, IngressScope::Anywhere);
        assert_eq!(config.readiness.max_attempts, 10);
        assert_eq!(config.readiness.interval_secs, 5);
        assert_eq!(config.vpc_cidr, ClusterConfig::default().vpc_cidr);
    }

    #[test]
    fn test_json_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"worker_count": "two"}}"#).unwrap();

        let err = ClusterConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ProvisionError::Serialization(_)));
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn test_json_file_missing() {
        let err = ClusterConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ProvisionError::Io { .. }));
    }

    #[test]
    fn test_ingress_scope_resolution() {
        let subnet = Cidr::new("10.0.1.0/24").unwrap();
        assert_eq!(IngressScope::Subnet.source_range(subnet), subnet);
        assert_eq!(IngressScope::Anywhere.source_range(subnet), Cidr::ANY);
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/etc/ssh/config").unwrap(), PathBuf::from("/etc/ssh/config"));
        assert_eq!(expand_home("~other/x").unwrap(), PathBuf::from("~other/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.ssh/config").unwrap(), home.join(".ssh/config"));
            assert_eq!(expand_home("~").unwrap(), home);
        }
    }
}
