// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute Topology
//!
//! Declares the control plane and the workers. A worker's payload is a
//! transform over the control plane's deferred private address, and each
//! worker also carries an explicit `depends_on` on the control plane: the
//! first orders *values*, the second orders *existence*.

use std::net::Ipv4Addr;
use tracing::{debug, info};

use crate::config::{ClusterToken, ReadinessProbe};
use crate::deferred::DeferredValue;
use crate::domain::{NodeHostname, NodeRole};
use crate::engine::{name_tag, Input, InstanceHandle, InstanceSpec, ProvisioningEngine, ResourceOptions};
use crate::errors::ProvisionResult;

use super::bootstrap::{control_plane_script, worker_script};
use super::network::Subnet;
use super::security::SecurityPolicy;

pub const CONTROL_PLANE_NAME: &str = "master-instance";

/// Engine name of worker `ordinal`
pub fn worker_name(ordinal: usize) -> String {
    format!("worker{ordinal}-instance")
}

/// Shared launch parameters
#[derive(Debug, Clone)]
pub struct Placement<'a> {
    pub subnet: &'a Subnet,
    pub security: &'a SecurityPolicy,
    pub ami_id: &'a str,
    pub instance_type: &'a str,
    pub key_name: &'a str,
    pub readiness: ReadinessProbe,
    /// Login user that owns the kubeconfig on the control plane
    pub admin_user: &'a str,
}

/// One declared node
#[derive(Debug, Clone)]
pub struct ClusterInstance {
    pub role: NodeRole,
    pub hostname: NodeHostname,
    pub handle: InstanceHandle,
    /// First-boot script; workers' resolve with the control plane's address
    pub payload: DeferredValue<String>,
}

impl ClusterInstance {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn private_ip(&self) -> &DeferredValue<Ipv4Addr> {
        self.handle.private_ip()
    }

    pub fn public_ip(&self) -> &DeferredValue<Ipv4Addr> {
        self.handle.public_ip()
    }
}

/// Every declared node, control plane first
#[derive(Debug, Clone)]
pub struct ComputeTopology {
    pub control_plane: ClusterInstance,
    pub workers: Vec<ClusterInstance>,
}

impl ComputeTopology {
    /// Declare the control plane and `worker_count` workers
    pub fn provision<E>(
        engine: &E,
        placement: &Placement<'_>,
        token: &ClusterToken,
        worker_count: usize,
    ) -> ProvisionResult<Self>
    where
        E: ProvisioningEngine + ?Sized,
    {
        let role = NodeRole::ControlPlane;
        let hostname = role.hostname();
        let script = control_plane_script(&hostname, token, &placement.readiness, placement.admin_user);
        let handle = engine.register_instance(
            CONTROL_PLANE_NAME,
            instance_spec(placement, &hostname, Input::Known(script.clone())),
            ResourceOptions::default(),
        )?;
        let control_plane = ClusterInstance {
            role,
            hostname,
            handle,
            payload: DeferredValue::known(script),
        };

        let mut workers = Vec::with_capacity(worker_count);
        for ordinal in 1..=worker_count {
            let role = NodeRole::Worker { ordinal };
            let hostname = role.hostname();

            let payload = {
                let hostname = hostname.clone();
                let token = token.clone();
                control_plane
                    .private_ip()
                    .transform(move |ip| worker_script(&hostname, &token, ip))
            };
            let handle = engine.register_instance(
                &worker_name(ordinal),
                instance_spec(placement, &hostname, payload.clone().into()),
                ResourceOptions::depends_on([CONTROL_PLANE_NAME]),
            )?;
            debug!(worker = %handle.name(), "worker declared");

            workers.push(ClusterInstance {
                role,
                hostname,
                handle,
                payload,
            });
        }

        info!(workers = worker_count, "compute topology declared");
        Ok(Self {
            control_plane,
            workers,
        })
    }

    /// Control plane, then workers by ordinal
    pub fn instances(&self) -> impl Iterator<Item = &ClusterInstance> {
        std::iter::once(&self.control_plane).chain(self.workers.iter())
    }

    /// Public addresses in [control plane, worker-1, ..] order
    pub fn public_ips(&self) -> Vec<(NodeRole, DeferredValue<Ipv4Addr>)> {
        self.instances()
            .map(|node| (node.role, node.public_ip().clone()))
            .collect()
    }

    /// Private addresses in [control plane, worker-1, ..] order
    pub fn private_ips(&self) -> Vec<(NodeRole, DeferredValue<Ipv4Addr>)> {
        self.instances()
            .map(|node| (node.role, node.private_ip().clone()))
            .collect()
    }
}

fn instance_spec(placement: &Placement<'_>, hostname: &NodeHostname, user_data: Input<String>) -> InstanceSpec {
    InstanceSpec {
        instance_type: placement.instance_type.to_string(),
        ami: placement.ami_id.to_string(),
        subnet_id: placement.subnet.handle.id().clone().into(),
        security_group_ids: vec![placement.security.handle.id().clone().into()],
        key_name: placement.key_name.to_string(),
        associate_public_ip_address: true,
        user_data,
        tags: name_tag(hostname.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngressPolicy;
    use crate::engine::{ReconcilingEngine, SimulatedCloud};
    use crate::topology::network::{NetworkRequest, NetworkTopology};
    use crate::topology::security::SECURITY_GROUP_NAME;
    use std::collections::BTreeSet;

    fn declare(engine: &ReconcilingEngine<SimulatedCloud>, workers: usize) -> ComputeTopology {
        let network = NetworkTopology::declare(
            engine,
            &NetworkRequest::parse("10.0.0.0/16", "10.0.1.0/24", "ap-southeast-1a").unwrap(),
        )
        .unwrap();
        let security =
            SecurityPolicy::declare(engine, &network.block, &network.subnet, &IngressPolicy::default()).unwrap();
        let placement = Placement {
            subnet: &network.subnet,
            security: &security,
            ami_id: "ami-060e277c0d4cce553",
            instance_type: "t3.small",
            key_name: "k3s-cluster",
            readiness: ReadinessProbe::default(),
            admin_user: "ubuntu",
        };
        ComputeTopology::provision(engine, &placement, &ClusterToken::new("T").unwrap(), workers).unwrap()
    }

    #[test]
    fn test_declaration_shape() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let compute = declare(&engine, 3);

        let names: Vec<_> = compute.instances().map(|node| node.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["master-instance", "worker1-instance", "worker2-instance", "worker3-instance"]
        );
        assert!(compute.control_plane.payload.is_resolved());
        assert!(compute.workers.iter().all(|worker| !worker.payload.is_resolved()));
        assert_eq!(compute.workers[2].hostname.as_str(), "k3s-worker3");
    }

    #[test]
    fn test_worker_dependencies() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        declare(&engine, 2);

        let expected: BTreeSet<String> = [CONTROL_PLANE_NAME, "public-subnet", SECURITY_GROUP_NAME]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(engine.dependencies_of("worker1-instance").unwrap(), expected);
        assert_eq!(engine.dependencies_of("worker2-instance").unwrap(), expected);
        assert!(!engine
            .dependencies_of("worker2-instance")
            .unwrap()
            .contains("worker1-instance"));
    }

    #[test]
    fn test_zero_workers() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let compute = declare(&engine, 0);
        assert!(compute.workers.is_empty());
        assert_eq!(compute.public_ips().len(), 1);
    }

    #[test]
    fn test_worker_payload_follows_control_plane_address() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let compute = declare(&engine, 2);

        // Stand in for the engine delivering the address
        compute.control_plane.private_ip().resolve(Ipv4Addr::new(10, 0, 1, 5));
        for worker in &compute.workers {
            let payload = worker.payload.get().unwrap();
            assert!(payload.contains("K3S_URL=https://10.0.1.5:6443"));
            assert!(payload.contains("K3S_TOKEN=\"T\""));
        }
    }
}
