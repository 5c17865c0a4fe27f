// Copyright (c) 2025 - Cowboy AI, Inc.
//! First-boot payloads
//!
//! Shell scripts handed to each instance's first-boot mechanism. The
//! control plane installs the k3s server and waits, bounded, for its own API;
//! workers install the agent pointed at the control plane's private address.

use std::net::Ipv4Addr;

use crate::config::{ClusterToken, ReadinessProbe};
use crate::domain::NodeHostname;

use super::security::K3S_API_PORT;

const KUBECONFIG: &str = "/etc/rancher/k3s/k3s.yaml";
const INSTALL_URL: &str = "https://get.k3s.io";

/// Join endpoint for workers
pub fn join_url(control_plane_ip: Ipv4Addr) -> String {
    format!("https://{control_plane_ip}:{K3S_API_PORT}")
}

/// Control-plane script
///
/// Exits non-zero once `readiness` is exhausted, so a node whose API never
/// comes up is reported failed by the first-boot mechanism instead of
/// looping forever.
pub fn control_plane_script(
    hostname: &NodeHostname,
    token: &ClusterToken,
    readiness: &ReadinessProbe,
    kubeconfig_owner: &str,
) -> String {
    format!(
        r#"#!/bin/bash
sudo apt update
sudo hostnamectl set-hostname {hostname}
curl -sfL {INSTALL_URL} | K3S_TOKEN="{token}" sh -s - server --cluster-init
export KUBECONFIG={KUBECONFIG}
attempts=0
until /usr/local/bin/kubectl get nodes >/dev/null 2>&1; do
  attempts=$((attempts + 1))
  if [ "$attempts" -ge {max_attempts} ]; then
    echo "K3s API not ready after {max_attempts} attempts" >&2
    exit 1
  fi
  echo "Waiting for K3s to start..."
  sleep {interval}
done
sudo chown {owner}:{owner} {KUBECONFIG}
sudo chmod 600 {KUBECONFIG}
"#,
        hostname = hostname.as_str(),
        token = token.expose(),
        max_attempts = readiness.max_attempts,
        interval = readiness.interval_secs,
        owner = kubeconfig_owner,
    )
}

/// Worker script joining the control plane at `control_plane_ip`
pub fn worker_script(hostname: &NodeHostname, token: &ClusterToken, control_plane_ip: Ipv4Addr) -> String {
    format!(
        r#"#!/bin/bash
sudo apt update
sudo hostnamectl set-hostname {hostname}
curl -sfL {INSTALL_URL} | K3S_TOKEN="{token}" K3S_URL={url} sh -s -
"#,
        hostname = hostname.as_str(),
        token = token.expose(),
        url = join_url(control_plane_ip),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token() -> ClusterToken {
        ClusterToken::new("T").unwrap()
    }

    #[test]
    fn test_worker_script() {
        let script = worker_script(&NodeHostname::worker(1), &token(), Ipv4Addr::new(10, 0, 1, 5));
        assert_eq!(
            script,
            "#!/bin/bash\n\
             sudo apt update\n\
             sudo hostnamectl set-hostname k3s-worker1\n\
             curl -sfL https://get.k3s.io | K3S_TOKEN=\"T\" K3S_URL=https://10.0.1.5:6443 sh -s -\n"
        );
    }

    #[test]
    fn test_control_plane_readiness_is_bounded() {
        let readiness = ReadinessProbe {
            max_attempts: 12,
            interval_secs: 10,
        };
        let script = control_plane_script(&NodeHostname::control_plane(), &token(), &readiness, "ubuntu");

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("set-hostname k3s-master\n"));
        assert!(script.contains("K3S_TOKEN=\"T\" sh -s - server --cluster-init"));
        assert!(script.contains("if [ \"$attempts\" -ge 12 ]; then"));
        assert!(script.contains("  exit 1\n"));
        assert!(script.contains("sleep 10\n"));
        assert!(script.ends_with("sudo chmod 600 /etc/rancher/k3s/k3s.yaml\n"));

        // Permissions are fixed only after the wait loop
        let loop_end = script.find("done\n").unwrap();
        assert!(script.find("chown ubuntu:ubuntu").unwrap() > loop_end);
        assert!(!script.contains("K3S_URL"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url(Ipv4Addr::new(10, 0, 1, 77)), "https://10.0.1.77:6443");
    }
}
