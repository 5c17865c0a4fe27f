// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reconciling Engine
//!
//! Records declarations, then creates every declared resource against a
//! [`CloudProvider`] in one concurrent run.
//!
//! # Ordering
//!
//! A resource's effective dependencies are its explicit `depends_on` list
//! plus every resource its deferred inputs are derived from. Creation starts
//! only once each of them has been created (and, for instances, had its
//! addresses delivered). Independent resources are created concurrently.
//!
//! # Failure
//!
//! A rejected resource ends `Failed`; everything downstream of it ends
//! `Skipped` and its outputs stay unresolved forever. Neither aborts the
//! run. A double resolution or a deferred input that is still unresolved at
//! creation time is a topology bug and aborts the run.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::resource::{CreateRequest, ResourceId, ResourceKind, ResourceOptions, ResourceSpec};
use super::{CloudProvider, DeclaredOutputs, ProvisioningEngine};
use crate::deferred::DeferredValue;
use crate::errors::{ProvisionError, ProvisionResult};
use crate::state_machine::{
    LifecycleEvent, ResourceLifecycle, StateMachineWithHistory, Transition,
};

struct Declaration {
    name: String,
    spec: ResourceSpec,
    dependencies: BTreeSet<String>,
    outputs: DeclaredOutputs,
}

/// Declarations and the applied flag, behind one lock
#[derive(Default)]
struct Registry {
    declarations: Vec<Declaration>,
    applied: bool,
}

/// Outcome of one resource in a run
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: String,
    pub kind: ResourceKind,
    pub state: ResourceLifecycle,
    pub id: Option<ResourceId>,
    pub private_ip: Option<Ipv4Addr>,
    pub public_ip: Option<Ipv4Addr>,
    /// Provider error or unavailable dependency
    pub reason: Option<String>,
    pub history: Vec<Transition<ResourceLifecycle, LifecycleEvent>>,
}

/// Outcome of a run, resources in registration order
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resources: Vec<ResourceReport>,
}

impl ApplyReport {
    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|report| report.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<ResourceLifecycle> {
        self.resource(name).map(|report| report.state)
    }

    /// Whether every resource came up
    pub fn is_complete(&self) -> bool {
        self.resources
            .iter()
            .all(|report| report.state.satisfies_dependency())
    }

    /// Resources that failed or were skipped
    pub fn unavailable(&self) -> impl Iterator<Item = &ResourceReport> {
        self.resources
            .iter()
            .filter(|report| report.state.is_unavailable())
    }
}

/// [`ProvisioningEngine`] that creates resources through a [`CloudProvider`]
pub struct ReconcilingEngine<P> {
    provider: Arc<P>,
    registry: Mutex<Registry>,
}

impl<P: CloudProvider> ReconcilingEngine<P> {
    pub fn new(provider: P) -> Self {
        Self::with_shared(Arc::new(provider))
    }

    /// Engine over a provider the caller keeps a handle to
    pub fn with_shared(provider: Arc<P>) -> Self {
        Self {
            provider,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Declared resource names, in registration order
    pub fn declared(&self) -> Vec<String> {
        self.lock()
            .declarations
            .iter()
            .map(|decl| decl.name.clone())
            .collect()
    }

    /// Effective dependencies of `name`
    pub fn dependencies_of(&self, name: &str) -> Option<BTreeSet<String>> {
        self.lock()
            .declarations
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| decl.dependencies.clone())
    }

    /// Create every declared resource
    ///
    /// An engine applies once; later calls fail with a configuration error.
    ///
    /// # Errors
    ///
    /// Fatal errors only ([`ProvisionError::is_fatal`]). Provider rejections
    /// are reported per resource in the [`ApplyReport`].
    pub async fn apply(&self) -> ProvisionResult<ApplyReport> {
        let declarations = {
            let mut registry = self.lock();
            if registry.applied {
                return Err(ProvisionError::configuration("engine has already been applied"));
            }
            registry.applied = true;
            std::mem::take(&mut registry.declarations)
        };

        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let span = info_span!("apply", %run_id, resources = declarations.len());

        async move {
            info!("starting provisioning run");

            let mut senders = Vec::with_capacity(declarations.len());
            let mut receivers = HashMap::with_capacity(declarations.len());
            for decl in &declarations {
                let (tx, rx) = watch::channel(ResourceLifecycle::Declared);
                senders.push(tx);
                receivers.insert(decl.name.clone(), rx);
            }

            let tasks = declarations.iter().zip(senders).map(|(decl, tx)| {
                let span = info_span!("resource", name = %decl.name, kind = %decl.spec.kind());
                self.reconcile(decl, &receivers, tx).instrument(span)
            });

            let resources = match try_join_all(tasks).await {
                Ok(resources) => resources,
                Err(err) => {
                    error!(error = %err, "provisioning run aborted");
                    return Err(err);
                }
            };

            let report = ApplyReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                resources,
            };
            let unavailable = report.unavailable().count();
            if unavailable == 0 {
                info!("provisioning run complete");
            } else {
                warn!(unavailable, "provisioning run finished with unavailable resources");
            }
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn reconcile(
        &self,
        decl: &Declaration,
        receivers: &HashMap<String, watch::Receiver<ResourceLifecycle>>,
        tx: watch::Sender<ResourceLifecycle>,
    ) -> ProvisionResult<ResourceReport> {
        let mut lifecycle = StateMachineWithHistory::new(ResourceLifecycle::Declared);
        let mut report = ResourceReport {
            name: decl.name.clone(),
            kind: decl.spec.kind(),
            state: ResourceLifecycle::Declared,
            id: None,
            private_ip: None,
            public_ip: None,
            reason: None,
            history: Vec::new(),
        };

        let result = self.drive(decl, receivers, &mut lifecycle, &mut report).await;

        // Dependants must never wait on a resource that stopped early.
        let published = match &result {
            Ok(()) => *lifecycle.current(),
            Err(_) => ResourceLifecycle::Failed,
        };
        tx.send_replace(published);
        result?;

        report.state = *lifecycle.current();
        report.history = lifecycle.history().to_vec();
        Ok(report)
    }

    async fn drive(
        &self,
        decl: &Declaration,
        receivers: &HashMap<String, watch::Receiver<ResourceLifecycle>>,
        lifecycle: &mut StateMachineWithHistory<ResourceLifecycle>,
        report: &mut ResourceReport,
    ) -> ProvisionResult<()> {
        for dependency in &decl.dependencies {
            let mut rx = receivers
                .get(dependency)
                .cloned()
                .ok_or_else(|| ProvisionError::UnknownDependency {
                    resource: decl.name.clone(),
                    dependency: dependency.clone(),
                })?;
            let state = *rx
                .wait_for(|state| state.satisfies_dependency() || state.is_unavailable())
                .await
                .map_err(|_| ProvisionError::Lifecycle {
                    resource: decl.name.clone(),
                    message: format!("lost track of dependency {dependency}"),
                })?;

            if state.is_unavailable() {
                report.reason = Some(format!("dependency {dependency} is {state}"));
                step(
                    &decl.name,
                    lifecycle,
                    LifecycleEvent::DependencyUnavailable {
                        dependency: dependency.clone(),
                    },
                )?;
                return Ok(());
            }
        }

        step(&decl.name, lifecycle, LifecycleEvent::CreationRequested)?;
        let spec = decl
            .spec
            .pin()
            .map_err(|input| ProvisionError::UnresolvedInput {
                resource: decl.name.clone(),
                input: input.to_string(),
            })?;
        let request = CreateRequest {
            name: decl.name.clone(),
            spec,
        };

        let record = match self.provider.create(&request).await {
            Ok(record) => record,
            Err(err) => {
                let reason = err.to_string();
                warn!(error = %reason, "provider rejected resource");
                report.reason = Some(reason.clone());
                return step(&decl.name, lifecycle, LifecycleEvent::ProviderRejected { reason });
            }
        };

        step(&decl.name, lifecycle, LifecycleEvent::ProviderCreated)?;
        deliver(&decl.name, "id", &decl.outputs.id, record.id.clone())?;
        info!(id = %record.id, "resource created");
        report.id = Some(record.id);

        if let (Some(private_slot), Some(public_slot)) =
            (&decl.outputs.private_ip, &decl.outputs.public_ip)
        {
            let private_ip = record.private_ip.ok_or_else(|| ProvisionError::Lifecycle {
                resource: decl.name.clone(),
                message: "provider returned no private address".to_string(),
            })?;
            deliver(&decl.name, "private_ip", private_slot, private_ip)?;
            report.private_ip = Some(private_ip);

            match record.public_ip {
                Some(public_ip) => {
                    deliver(&decl.name, "public_ip", public_slot, public_ip)?;
                    report.public_ip = Some(public_ip);
                }
                None => warn!("instance has no public address"),
            }
            step(&decl.name, lifecycle, LifecycleEvent::AddressesAssigned)?;
            info!(%private_ip, public_ip = ?report.public_ip, "instance addresses assigned");
        }
        Ok(())
    }
}

fn step(
    resource: &str,
    lifecycle: &mut StateMachineWithHistory<ResourceLifecycle>,
    event: LifecycleEvent,
) -> ProvisionResult<()> {
    let output = lifecycle
        .apply(event, Utc::now())
        .map_err(|err| ProvisionError::Lifecycle {
            resource: resource.to_string(),
            message: err.to_string(),
        })?;
    for warning in output.warnings {
        warn!("{warning}");
    }
    debug!(state = %lifecycle.current(), "lifecycle transition");
    Ok(())
}

fn deliver<T: Clone + Send + Sync + 'static>(
    resource: &str,
    attribute: &str,
    slot: &DeferredValue<T>,
    value: T,
) -> ProvisionResult<()> {
    slot.try_resolve(value)
        .map_err(|_| ProvisionError::DoubleResolution {
            resource: resource.to_string(),
            attribute: attribute.to_string(),
        })
}

impl<P: CloudProvider> ProvisioningEngine for ReconcilingEngine<P> {
    fn declare(
        &self,
        name: &str,
        spec: ResourceSpec,
        options: ResourceOptions,
    ) -> ProvisionResult<DeclaredOutputs> {
        let mut registry = self.lock();
        if registry.applied {
            return Err(ProvisionError::configuration(format!(
                "cannot declare {name}: engine has already been applied"
            )));
        }

        let declarations = &mut registry.declarations;
        if declarations.iter().any(|decl| decl.name == name) {
            return Err(ProvisionError::DuplicateResource(name.to_string()));
        }

        let mut dependencies: BTreeSet<String> = options.depends_on.into_iter().collect();
        dependencies.extend(spec.data_sources());
        // Dependencies must already be declared, which keeps the graph acyclic
        if let Some(missing) = dependencies
            .iter()
            .find(|dependency| !declarations.iter().any(|decl| &decl.name == *dependency))
        {
            return Err(ProvisionError::UnknownDependency {
                resource: name.to_string(),
                dependency: missing.clone(),
            });
        }

        let is_instance = spec.kind() == ResourceKind::Instance;
        let outputs = DeclaredOutputs {
            id: DeferredValue::from_source(name),
            private_ip: is_instance.then(|| DeferredValue::from_source(name)),
            public_ip: is_instance.then(|| DeferredValue::from_source(name)),
        };

        debug!(
            resource = name,
            kind = %spec.kind(),
            dependencies = ?dependencies,
            "resource declared"
        );
        declarations.push(Declaration {
            name: name.to_string(),
            spec,
            dependencies,
            outputs: outputs.clone(),
        });
        Ok(outputs)
    }
}
