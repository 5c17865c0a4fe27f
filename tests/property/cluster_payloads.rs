// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for cluster declarations
//!
//! Worker payloads and the access profile, for any worker count, token and
//! address.

use cim_cluster_bootstrap::{
    deploy_cluster, ArtifactGenerator, ClusterConfig, ClusterToken, DeferredValue, NodeRole,
    ReconcilingEngine, SimulatedCloud,
};
use proptest::prelude::*;
use std::fs;
use std::net::Ipv4Addr;

// ============================================================================
// Strategies
// ============================================================================

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,32}"
}

fn subnet_host() -> impl Strategy<Value = Ipv4Addr> {
    (4u8..=254).prop_map(|host| Ipv4Addr::new(10, 0, 1, host))
}

fn roles_and_order() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (0usize..8).prop_flat_map(|workers| {
        let indices: Vec<usize> = (0..=workers).collect();
        (Just(workers), Just(indices).prop_shuffle())
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// N workers get N payloads carrying the token and join URL, differing
    /// only in hostname
    #[test]
    fn prop_worker_payloads(workers in 0usize..12, raw_token in token(), ip in subnet_host()) {
        let dir = tempfile::tempdir().unwrap();
        let config = ClusterConfig {
            k3s_token: ClusterToken::new(raw_token.clone()).unwrap(),
            worker_count: workers,
            ssh_config_path: dir.path().join("config").display().to_string(),
            ..ClusterConfig::default()
        };
        let engine = ReconcilingEngine::new(SimulatedCloud::new());
        let stack = deploy_cluster(&config, &engine).unwrap();

        prop_assert_eq!(stack.compute.workers.len(), workers);
        prop_assert!(stack.compute.workers.iter().all(|w| !w.payload.is_resolved()));

        // Deliver the address the way the engine would
        stack.compute.control_plane.private_ip().resolve(ip);

        let join = format!("K3S_URL=https://{ip}:6443");
        let quoted = format!("K3S_TOKEN=\"{raw_token}\"");
        let mut normalized = Vec::new();
        for worker in &stack.compute.workers {
            let payload = worker.payload.get().unwrap();
            prop_assert!(payload.contains(&join));
            prop_assert!(payload.contains(&quoted));
            let set_hostname = format!("set-hostname {}\n", worker.hostname.as_str());
            prop_assert!(payload.contains(&set_hostname));
            normalized.push(payload.replace(worker.hostname.as_str(), "HOST"));
        }
        prop_assert!(normalized.windows(2).all(|pair| pair[0] == pair[1]));
    }

    /// Profile host order is fixed whatever order addresses arrive in
    #[test]
    fn prop_profile_order_ignores_resolution_order((workers, order) in roles_and_order()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        let mut nodes = vec![(NodeRole::ControlPlane, DeferredValue::new())];
        for ordinal in 1..=workers {
            nodes.push((NodeRole::Worker { ordinal }, DeferredValue::new()));
        }
        let addresses: Vec<DeferredValue<Ipv4Addr>> = nodes.iter().map(|(_, ip)| ip.clone()).collect();
        let written = ArtifactGenerator::new(&path, "ubuntu", "~/.ssh/k3s-cluster.id_rsa").schedule(nodes);

        for index in order {
            prop_assert!(!path.exists());
            addresses[index].resolve(Ipv4Addr::new(203, 0, 113, 10 + index as u8));
        }
        prop_assert_eq!(written.get(), Some(Ok(path.clone())));

        let content = fs::read_to_string(&path).unwrap();
        let aliases: Vec<String> = content
            .lines()
            .filter_map(|line| line.strip_prefix("Host "))
            .map(String::from)
            .collect();
        let expected: Vec<String> = std::iter::once("master".to_string())
            .chain((1..=workers).map(|ordinal| format!("worker-{ordinal}")))
            .collect();
        prop_assert_eq!(aliases, expected);

        // Each block carries the address its node resolved with
        for (index, line) in content.lines().filter(|line| line.contains("HostName")).enumerate() {
            prop_assert_eq!(line.trim(), format!("HostName 203.0.113.{}", 10 + index));
        }
    }
}
