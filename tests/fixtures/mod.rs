// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-cluster-bootstrap
//!
//! Deterministic configuration and provider setups shared by the
//! integration tests.
//!
//! # Design Principles
//! - Every stack writes its access profile into its own temporary directory
//! - The control plane's private address is pinned so payloads are predictable
//! - Tests build stacks through these helpers, never by hand

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cim_cluster_bootstrap::engine::ProviderError;
use cim_cluster_bootstrap::{
    deploy_cluster, ClusterConfig, ClusterStack, ClusterToken, ReconcilingEngine, SimulatedCloud,
};
use tempfile::TempDir;

pub const TOKEN: &str = "T";
pub const MASTER_PRIVATE_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 5);
pub const MASTER: &str = "master-instance";

/// Default configuration with a fixed token, `workers` workers, and the
/// access profile inside `dir`
pub fn config(dir: &TempDir, workers: usize) -> ClusterConfig {
    ClusterConfig {
        k3s_token: ClusterToken::new(TOKEN).expect("valid token"),
        worker_count: workers,
        ssh_config_path: ssh_config_path(dir).display().to_string(),
        ..ClusterConfig::default()
    }
}

pub fn ssh_config_path(dir: &TempDir) -> PathBuf {
    dir.path().join("ssh").join("config")
}

/// Provider with the control plane pinned to `MASTER_PRIVATE_IP`
pub fn cloud() -> SimulatedCloud {
    SimulatedCloud::new().with_private_ip(MASTER, MASTER_PRIVATE_IP)
}

/// Provider that takes a little while per call, so concurrency is observable
pub fn slow_cloud() -> SimulatedCloud {
    cloud().with_default_latency(Duration::from_millis(15))
}

/// Provider rejecting `resource`
pub fn failing_cloud(resource: &str) -> SimulatedCloud {
    cloud().with_failure(
        resource,
        ProviderError::rejected("InsufficientInstanceCapacity", "no capacity in zone"),
    )
}

/// A declared (not yet applied) stack
pub struct Harness {
    pub dir: TempDir,
    pub cloud: Arc<SimulatedCloud>,
    pub engine: ReconcilingEngine<SimulatedCloud>,
    pub stack: ClusterStack,
}

impl Harness {
    pub fn declare(cloud: SimulatedCloud, workers: usize) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let cloud = Arc::new(cloud);
        let engine = ReconcilingEngine::with_shared(Arc::clone(&cloud));
        let stack = deploy_cluster(&config(&dir, workers), &engine).expect("stack declares");
        Self {
            dir,
            cloud,
            engine,
            stack,
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        ssh_config_path(&self.dir)
    }
}
