// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Topology Declarations
//!
//! Declaration order is network, security, then compute. Each step only
//! registers resources; nothing here waits on a provider.

pub mod bootstrap;
pub mod compute;
pub mod network;
pub mod security;

pub use compute::{worker_name, ClusterInstance, ComputeTopology, Placement, CONTROL_PLANE_NAME};
pub use network::{NetworkBlock, NetworkRequest, NetworkTopology, RoutePolicy, Subnet};
pub use security::{SecurityPolicy, SecurityRules, K3S_API_PORT};
