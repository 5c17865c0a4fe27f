// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Plan
//!
//! Declares the k3s cluster stack and applies it against the in-memory
//! provider, printing the run report and the exported outputs. Nothing is
//! created in a real cloud.
//!
//! Run with: cargo run --bin cluster-plan
//!
//! Configuration:
//! 1. `CLUSTER_CONFIG_FILE` - optional JSON file with `ClusterConfig` keys
//! 2. `CLUSTER_*` variables override individual keys (see `ClusterConfig`)
//! 3. The access profile goes to `./cluster-plan.ssh_config` unless
//!    `CLUSTER_SSH_CONFIG` is set, since simulated addresses are not real

use anyhow::{Context, Result};
use cim_cluster_bootstrap::{deploy_cluster, ClusterConfig, ReconcilingEngine, SimulatedCloud};
use std::time::Duration;
use tracing::{info, warn};

const PLAN_SSH_CONFIG: &str = "./cluster-plan.ssh_config";

fn load_config() -> Result<ClusterConfig> {
    let base = match std::env::var("CLUSTER_CONFIG_FILE") {
        Ok(path) => ClusterConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config file {path}"))?,
        Err(_) => ClusterConfig::default(),
    };

    let mut config = base
        .with_env_overrides(|key| std::env::var(key).ok())
        .context("Invalid CLUSTER_* environment override")?;
    if std::env::var("CLUSTER_SSH_CONFIG").is_err() {
        config.ssh_config_path = PLAN_SSH_CONFIG.to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Planning k3s cluster");

    let config = load_config()?;
    info!("📋 Configuration loaded:");
    info!("  - VPC: {}", config.vpc_cidr);
    info!("  - Subnet: {} ({})", config.public_subnet_cidr, config.availability_zone);
    info!("  - Workers: {} x {}", config.worker_count, config.instance_type);
    info!("  - Readiness budget: {:?}", config.readiness.budget());

    let cloud = SimulatedCloud::new().with_default_latency(Duration::from_millis(25));
    let engine = ReconcilingEngine::new(cloud);

    let stack = deploy_cluster(&config, &engine).context("Failed to declare cluster stack")?;
    info!("📝 Declared {} resources", engine.declared().len());

    let report = engine.apply().await.context("Provisioning run aborted")?;
    for resource in &report.resources {
        match &resource.reason {
            Some(reason) => warn!("  ✗ {} [{}]: {}", resource.name, resource.state, reason),
            None => info!("  ✓ {} [{}]", resource.name, resource.state),
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&stack.outputs.snapshot()).context("Failed to render outputs")?
    );

    match stack.access_profile.get() {
        Some(Ok(path)) => info!("🔑 Access profile written to {}", path.display()),
        Some(Err(err)) => return Err(err).context("Failed to write access profile"),
        None => warn!("⚠️  Access profile not written: not every node has a public address"),
    }

    if !report.is_complete() {
        anyhow::bail!(
            "run {} finished with {} unavailable resources",
            report.run_id,
            report.unavailable().count()
        );
    }
    info!("✅ Plan complete (run {})", report.run_id);
    Ok(())
}
