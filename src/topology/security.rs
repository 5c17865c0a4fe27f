// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Security Policy
//!
//! Ingress, in order:
//!
//! | rule            | proto | port | source                 |
//! |-----------------|-------|------|------------------------|
//! | k3s API         | tcp   | 6443 | subnet (always)        |
//! | flannel VXLAN   | udp   | 8472 | subnet (always)        |
//! | ssh             | tcp   | 22   | `IngressPolicy::ssh`   |
//! | http            | tcp   | 80   | `IngressPolicy::http`  |
//! | https           | tcp   | 443  | `IngressPolicy::https` |
//! | intra-subnet    | all   | all  | subnet (always)        |
//!
//! Egress: everything to `0.0.0.0/0`.

use tracing::debug;

use crate::config::IngressPolicy;
use crate::domain::{Cidr, PortRange, Protocol, TrafficRule};
use crate::engine::{name_tag, ProvisioningEngine, ResourceHandle, ResourceOptions, ResourceSpec};
use crate::errors::{ProvisionError, ProvisionResult};

use super::network::{NetworkBlock, Subnet};

pub const SECURITY_GROUP_NAME: &str = "k3s-secgrp";
pub const K3S_API_PORT: u16 = 6443;
pub const FLANNEL_VXLAN_PORT: u16 = 8472;
pub const SSH_PORT: u16 = 22;
pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Ordered rule set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRules {
    pub ingress: Vec<TrafficRule>,
    pub egress: Vec<TrafficRule>,
}

impl SecurityRules {
    /// Build the cluster rule set for `subnet`
    pub fn for_cluster(subnet: Cidr, policy: &IngressPolicy) -> Self {
        let ingress = vec![
            TrafficRule::ingress(Protocol::Tcp, PortRange::single(K3S_API_PORT), subnet, "k3s API server"),
            TrafficRule::ingress(Protocol::Udp, PortRange::single(FLANNEL_VXLAN_PORT), subnet, "flannel VXLAN"),
            TrafficRule::ingress(Protocol::Tcp, PortRange::single(SSH_PORT), policy.ssh.source_range(subnet), "ssh"),
            TrafficRule::ingress(Protocol::Tcp, PortRange::single(HTTP_PORT), policy.http.source_range(subnet), "http"),
            TrafficRule::ingress(Protocol::Tcp, PortRange::single(HTTPS_PORT), policy.https.source_range(subnet), "https"),
            TrafficRule::ingress(Protocol::All, PortRange::ALL, subnet, "intra-subnet"),
        ];
        let egress = vec![TrafficRule::egress(Protocol::All, PortRange::ALL, Cidr::ANY, "all outbound")];
        Self { ingress, egress }
    }

    /// Nothing outside `subnet` may reach the API server or the overlay
    pub fn verify_internal_scope(&self, subnet: Cidr) -> ProvisionResult<()> {
        let internal = [(Protocol::Tcp, K3S_API_PORT), (Protocol::Udp, FLANNEL_VXLAN_PORT)];
        let leak = internal
            .into_iter()
            .flat_map(|(protocol, port)| self.admitting(protocol, port))
            .find(|rule| rule.peer != subnet);
        match leak {
            Some(rule) => Err(ProvisionError::configuration(format!(
                "cluster-internal rule `{rule}` must be scoped to {subnet}"
            ))),
            None => Ok(()),
        }
    }

    /// Ingress rules that admit `protocol`/`port`
    pub fn admitting(&self, protocol: Protocol, port: u16) -> impl Iterator<Item = &TrafficRule> {
        self.ingress
            .iter()
            .filter(move |rule| rule.matches(protocol, port))
    }
}

/// Declared security group shared by every node
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub handle: ResourceHandle,
    pub rules: SecurityRules,
}

impl SecurityPolicy {
    pub fn declare<E>(
        engine: &E,
        network: &NetworkBlock,
        subnet: &Subnet,
        policy: &IngressPolicy,
    ) -> ProvisionResult<Self>
    where
        E: ProvisioningEngine + ?Sized,
    {
        let rules = SecurityRules::for_cluster(subnet.cidr, policy);
        rules.verify_internal_scope(subnet.cidr)?;

        let handle = engine.register(
            SECURITY_GROUP_NAME,
            ResourceSpec::SecurityGroup {
                vpc_id: network.handle.id().clone().into(),
                description: "Allow k3s cluster traffic".to_string(),
                ingress: rules.ingress.clone(),
                egress: rules.egress.clone(),
                tags: name_tag("k3s-cluster-sg"),
            },
            ResourceOptions::default(),
        )?;
        debug!(ingress = rules.ingress.len(), "security policy declared");

        Ok(Self { handle, rules })
    }
}
