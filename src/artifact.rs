// Copyright (c) 2025 - Cowboy AI, Inc.
//! SSH access profile
//!
//! Rebuilt in full from the nodes' public addresses on every run. The write
//! is scheduled behind a fan-in over the addresses in fixed node order, so
//! the file's host order never depends on which address arrived first and
//! nothing is written if any node never gets an address.

use serde::Serialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::config::ClusterConfig;
use crate::deferred::{fan_in, DeferredValue};
use crate::domain::NodeRole;
use crate::errors::ProvisionResult;

/// Access-profile failures
///
/// `Clone` so the outcome can travel inside a [`DeferredValue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("cannot create directory {path}: {message}")]
    CreateDir { path: String, message: String },

    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
}

/// One host block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostProfile {
    pub alias: String,
    pub address: Ipv4Addr,
    pub user: String,
    pub identity_file: String,
}

impl HostProfile {
    fn render_into(&self, out: &mut String) {
        out.push_str(&format!(
            "Host {}\n  HostName {}\n  User {}\n  IdentityFile {}\n",
            self.alias, self.address, self.user, self.identity_file
        ));
    }
}

/// Render host blocks separated by one blank line
pub fn render(hosts: &[HostProfile]) -> String {
    let mut out = String::new();
    for (index, host) in hosts.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        host.render_into(&mut out);
    }
    out
}

/// Writes the access profile
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    path: PathBuf,
    user: String,
    identity_file: String,
}

impl ArtifactGenerator {
    pub fn new(path: impl Into<PathBuf>, user: impl Into<String>, identity_file: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            user: user.into(),
            identity_file: identity_file.into(),
        }
    }

    /// Generator for the configured path, `~` expanded
    pub fn from_config(config: &ClusterConfig) -> ProvisionResult<Self> {
        Ok(Self::new(
            config.resolved_ssh_config_path()?,
            config.ssh_user.clone(),
            config.identity_file.clone(),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Host profiles for `nodes`, in the order given
    pub fn profiles(&self, nodes: &[(NodeRole, Ipv4Addr)]) -> Vec<HostProfile> {
        nodes
            .iter()
            .map(|(role, address)| HostProfile {
                alias: role.ssh_alias(),
                address: *address,
                user: self.user.clone(),
                identity_file: self.identity_file.clone(),
            })
            .collect()
    }

    /// Replace the file at the target path with `hosts`
    pub fn materialize(&self, hosts: &[HostProfile]) -> Result<PathBuf, ArtifactError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| ArtifactError::CreateDir {
                path: parent.display().to_string(),
                message: err.to_string(),
            })?;
        }
        fs::write(&self.path, render(hosts)).map_err(|err| ArtifactError::Write {
            path: self.path.display().to_string(),
            message: err.to_string(),
        })?;
        Ok(self.path.clone())
    }

    /// Write the profile once every address in `nodes` has resolved
    ///
    /// `nodes` must be in [control plane, worker-1, ..] order. If any address
    /// never resolves the returned value never resolves and no file is
    /// touched.
    ///
    /// The write is blocking and runs on whichever thread delivers the last
    /// address, inside the engine's run when one drives the addresses, so
    /// the file is on disk by the time `apply` returns.
    pub fn schedule(
        self,
        nodes: Vec<(NodeRole, DeferredValue<Ipv4Addr>)>,
    ) -> DeferredValue<Result<PathBuf, ArtifactError>> {
        let (roles, addresses): (Vec<NodeRole>, Vec<_>) = nodes.into_iter().unzip();

        fan_in(addresses).transform(move |addresses| {
            let nodes: Vec<_> = roles.into_iter().zip(addresses).collect();
            let result = self.materialize(&self.profiles(&nodes));
            match &result {
                Ok(path) => info!(path = %path.display(), hosts = nodes.len(), "access profile written"),
                Err(err) => error!(error = %err, "access profile not written"),
            }
            result
        })
    }
}
