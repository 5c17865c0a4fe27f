// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology
//!
//! One isolated network block, one public subnet inside it, an internet
//! gateway, and a route table sending `0.0.0.0/0` through the gateway,
//! associated with the subnet.

use tracing::debug;

use crate::domain::Cidr;
use crate::engine::{name_tag, ProvisioningEngine, ResourceHandle, ResourceOptions, ResourceSpec};
use crate::errors::ProvisionResult;

pub const VPC_NAME: &str = "my-vpc";
pub const SUBNET_NAME: &str = "public-subnet";
pub const GATEWAY_NAME: &str = "internet-gateway";
pub const ROUTE_TABLE_NAME: &str = "public-route-table";
pub const ROUTE_NAME: &str = "igw-route";
pub const ASSOCIATION_NAME: &str = "public-route-table-association";

/// Inputs to [`NetworkTopology::declare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub vpc_cidr: Cidr,
    pub subnet_cidr: Cidr,
    pub availability_zone: String,
}

impl NetworkRequest {
    /// Parse both ranges; only CIDR syntax is checked here
    pub fn parse(vpc_cidr: &str, subnet_cidr: &str, availability_zone: impl Into<String>) -> ProvisionResult<Self> {
        Ok(Self {
            vpc_cidr: Cidr::new(vpc_cidr)?,
            subnet_cidr: Cidr::new(subnet_cidr)?,
            availability_zone: availability_zone.into(),
        })
    }
}

/// Declared network block
#[derive(Debug, Clone)]
pub struct NetworkBlock {
    pub handle: ResourceHandle,
    pub cidr: Cidr,
}

/// Declared subnet
#[derive(Debug, Clone)]
pub struct Subnet {
    pub handle: ResourceHandle,
    pub cidr: Cidr,
    pub availability_zone: String,
    pub map_public_ip_on_launch: bool,
}

/// Default route to the egress gateway and its subnet association
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub table: ResourceHandle,
    pub route: ResourceHandle,
    pub association: ResourceHandle,
    pub destination: Cidr,
}

/// Everything [`NetworkTopology::declare`] registers
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub block: NetworkBlock,
    pub subnet: Subnet,
    pub gateway: ResourceHandle,
    pub routing: RoutePolicy,
}

impl NetworkTopology {
    /// Declare the network
    ///
    /// Range containment and availability-zone validity are left to the
    /// provider.
    pub fn declare<E>(engine: &E, request: &NetworkRequest) -> ProvisionResult<Self>
    where
        E: ProvisioningEngine + ?Sized,
    {
        let vpc = engine.register(
            VPC_NAME,
            ResourceSpec::Vpc {
                cidr_block: request.vpc_cidr,
                enable_dns_support: true,
                enable_dns_hostnames: true,
                tags: name_tag(VPC_NAME),
            },
            ResourceOptions::default(),
        )?;

        let subnet = engine.register(
            SUBNET_NAME,
            ResourceSpec::Subnet {
                vpc_id: vpc.id().clone().into(),
                cidr_block: request.subnet_cidr,
                availability_zone: request.availability_zone.clone(),
                map_public_ip_on_launch: true,
                tags: name_tag(SUBNET_NAME),
            },
            ResourceOptions::default(),
        )?;

        let gateway = engine.register(
            GATEWAY_NAME,
            ResourceSpec::InternetGateway {
                vpc_id: vpc.id().clone().into(),
                tags: name_tag("igw"),
            },
            ResourceOptions::default(),
        )?;

        let table = engine.register(
            ROUTE_TABLE_NAME,
            ResourceSpec::RouteTable {
                vpc_id: vpc.id().clone().into(),
                tags: name_tag("rt-public"),
            },
            ResourceOptions::default(),
        )?;

        let route = engine.register(
            ROUTE_NAME,
            ResourceSpec::Route {
                route_table_id: table.id().clone().into(),
                destination: Cidr::ANY,
                gateway_id: gateway.id().clone().into(),
            },
            ResourceOptions::default(),
        )?;

        let association = engine.register(
            ASSOCIATION_NAME,
            ResourceSpec::RouteTableAssociation {
                subnet_id: subnet.id().clone().into(),
                route_table_id: table.id().clone().into(),
            },
            ResourceOptions::default(),
        )?;

        debug!(
            vpc = %request.vpc_cidr,
            subnet = %request.subnet_cidr,
            zone = %request.availability_zone,
            "network declared"
        );

        Ok(Self {
            block: NetworkBlock {
                handle: vpc,
                cidr: request.vpc_cidr,
            },
            subnet: Subnet {
                handle: subnet,
                cidr: request.subnet_cidr,
                availability_zone: request.availability_zone.clone(),
                map_public_ip_on_launch: true,
            },
            gateway,
            routing: RoutePolicy {
                table,
                route,
                association,
                destination: Cidr::ANY,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ReconcilingEngine, SimulatedCloud};
    use crate::errors::ProvisionError;
    use std::collections::BTreeSet;

    fn request() -> NetworkRequest {
        NetworkRequest::parse("10.0.0.0/16", "10.0.1.0/24", "ap-southeast-1a").unwrap()
    }

    #[test]
    fn test_declares_six_resources_in_order() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let network = NetworkTopology::declare(&engine, &request()).unwrap();

        assert_eq!(
            engine.declared(),
            vec![VPC_NAME, SUBNET_NAME, GATEWAY_NAME, ROUTE_TABLE_NAME, ROUTE_NAME, ASSOCIATION_NAME]
        );
        assert!(network.subnet.map_public_ip_on_launch);
        assert!(network.routing.destination.is_any());
        assert!(!network.block.handle.id().is_resolved());
    }

    #[test]
    fn test_route_depends_on_table_and_gateway() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        NetworkTopology::declare(&engine, &request()).unwrap();

        assert_eq!(
            engine.dependencies_of(ROUTE_NAME).unwrap(),
            BTreeSet::from([GATEWAY_NAME.to_string(), ROUTE_TABLE_NAME.to_string()])
        );
        assert_eq!(
            engine.dependencies_of(ASSOCIATION_NAME).unwrap(),
            BTreeSet::from([ROUTE_TABLE_NAME.to_string(), SUBNET_NAME.to_string()])
        );
    }

    #[test]
    fn test_only_cidr_syntax_is_checked_locally() {
        assert!(matches!(
            NetworkRequest::parse("10.0.0.0", "10.0.1.0/24", "ap-southeast-1a"),
            Err(ProvisionError::Network(_))
        ));
        // Subnet outside the block is the provider's call
        assert!(NetworkRequest::parse("10.0.0.0/16", "172.16.0.0/24", "nowhere-1z").is_ok());
    }

    #[tokio::test]
    async fn test_apply_resolves_every_id() {
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let network = NetworkTopology::declare(&engine, &request()).unwrap();
        let report = engine.apply().await.unwrap();

        assert!(report.is_complete());
        assert!(network.subnet.handle.id().get().unwrap().as_str().starts_with("subnet-"));
        assert!(network.gateway.id().get().unwrap().as_str().starts_with("igw-"));
        assert!(network.routing.table.id().get().unwrap().as_str().starts_with("rtb-"));
    }
}
