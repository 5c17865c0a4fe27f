// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster stack composition
//!
//! [`deploy_cluster`] declares the whole cluster against an engine and wires
//! the exported outputs and the access profile. It returns as soon as every
//! resource is registered; values fill in while the engine applies.

use std::path::PathBuf;
use tracing::info;

use crate::artifact::{ArtifactError, ArtifactGenerator};
use crate::config::ClusterConfig;
use crate::deferred::DeferredValue;
use crate::domain::NodeRole;
use crate::engine::ProvisioningEngine;
use crate::errors::ProvisionResult;
use crate::outputs::StackOutputs;
use crate::topology::{
    ComputeTopology, NetworkRequest, NetworkTopology, Placement, SecurityPolicy,
};

/// Everything declared for one cluster
#[derive(Debug, Clone)]
pub struct ClusterStack {
    pub network: NetworkTopology,
    pub security: SecurityPolicy,
    pub compute: ComputeTopology,
    pub outputs: StackOutputs,
    /// Resolves with the written path once every node has a public address
    pub access_profile: DeferredValue<Result<PathBuf, ArtifactError>>,
}

/// Declare the cluster described by `config`
///
/// # Errors
///
/// Local configuration errors, and registration errors from `engine`.
pub fn deploy_cluster<E>(config: &ClusterConfig, engine: &E) -> ProvisionResult<ClusterStack>
where
    E: ProvisioningEngine + ?Sized,
{
    config.validate()?;

    let network = NetworkTopology::declare(
        engine,
        &NetworkRequest {
            vpc_cidr: config.vpc_cidr,
            subnet_cidr: config.public_subnet_cidr,
            availability_zone: config.availability_zone.clone(),
        },
    )?;
    let security = SecurityPolicy::declare(engine, &network.block, &network.subnet, &config.ingress)?;

    let placement = Placement {
        subnet: &network.subnet,
        security: &security,
        ami_id: &config.ami_id,
        instance_type: &config.instance_type,
        key_name: &config.key_name,
        readiness: config.readiness,
        admin_user: &config.ssh_user,
    };
    let compute = ComputeTopology::provision(engine, &placement, &config.k3s_token, config.worker_count)?;

    let outputs = export_outputs(&network, &compute);
    let access_profile = ArtifactGenerator::from_config(config)?.schedule(compute.public_ips());

    info!(
        workers = config.worker_count,
        outputs = outputs.len(),
        "cluster stack declared"
    );
    Ok(ClusterStack {
        network,
        security,
        compute,
        outputs,
        access_profile,
    })
}

fn output_prefix(role: NodeRole) -> String {
    match role {
        NodeRole::ControlPlane => "master".to_string(),
        NodeRole::Worker { ordinal } => format!("worker{ordinal}"),
    }
}

fn export_outputs(network: &NetworkTopology, compute: &ComputeTopology) -> StackOutputs {
    let mut outputs = StackOutputs::new();
    outputs.export("vpc_id", network.block.handle.id());
    outputs.export("public_subnet_id", network.subnet.handle.id());
    outputs.export("igw_id", network.gateway.id());
    outputs.export("public_route_table_id", network.routing.table.id());

    for node in compute.instances() {
        let prefix = output_prefix(node.role);
        outputs.export(format!("{prefix}_instance_id"), node.handle.id());
        outputs.export(format!("{prefix}_instance_public_ip"), node.public_ip());
        outputs.export(format!("{prefix}_private_ip"), node.private_ip());
    }
    outputs
}
