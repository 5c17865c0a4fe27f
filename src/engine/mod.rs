// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Engine
//!
//! Topologies *declare* resources through [`ProvisioningEngine`] and get
//! handles back immediately; every provider-assigned attribute on a handle
//! is a [`DeferredValue`] that resolves once the resource exists.
//!
//! ```text
//! topology ──register──> engine ──apply──> CloudProvider::create
//!    ^                                            │
//!    └──────── DeferredValue::resolve <───────────┘
//! ```
//!
//! [`ReconcilingEngine`] drives a [`CloudProvider`] concurrently, honouring
//! both explicit `depends_on` edges and the implicit edges carried by
//! deferred inputs. [`SimulatedCloud`] is an in-memory provider.

pub mod reconciler;
pub mod resource;
pub mod simulated;

pub use reconciler::{ApplyReport, ReconcilingEngine, ResourceReport};
pub use resource::{
    name_tag, CreateRequest, Input, InstanceSpec, ProviderRecord, ResourceId, ResourceKind,
    ResourceOptions, ResourceSpec, Tags,
};
pub use simulated::{CallPhase, CallRecord, LaunchedInstance, SimulatedCloud};

use async_trait::async_trait;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::deferred::DeferredValue;
use crate::errors::{ProvisionError, ProvisionResult};

/// Errors a cloud provider reports for a single creation request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider refused the request (bad AMI, quota, invalid range)
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    /// A referenced resource does not exist on the provider side
    #[error("referenced resource {0} not found")]
    NotFound(ResourceId),

    /// The request arrived with an input that was never pinned
    #[error("input {0} was not resolved")]
    MissingInput(&'static str),
}

impl ProviderError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Cloud API seam
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Create one resource
    ///
    /// Every input of `request.spec` is [`Input::Known`].
    async fn create(&self, request: &CreateRequest) -> Result<ProviderRecord, ProviderError>;
}

/// Outputs of a declared resource, as the engine hands them back
#[derive(Debug, Clone)]
pub struct DeclaredOutputs {
    pub id: DeferredValue<ResourceId>,
    /// Present for instances only
    pub private_ip: Option<DeferredValue<Ipv4Addr>>,
    /// Present for instances only
    pub public_ip: Option<DeferredValue<Ipv4Addr>>,
}

/// Handle to a declared resource
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    name: String,
    kind: ResourceKind,
    id: DeferredValue<ResourceId>,
}

impl ResourceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Provider id, once created
    pub fn id(&self) -> &DeferredValue<ResourceId> {
        &self.id
    }
}

/// Handle to a declared compute instance
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    resource: ResourceHandle,
    private_ip: DeferredValue<Ipv4Addr>,
    public_ip: DeferredValue<Ipv4Addr>,
}

impl InstanceHandle {
    pub fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    pub fn name(&self) -> &str {
        self.resource.name()
    }

    pub fn id(&self) -> &DeferredValue<ResourceId> {
        self.resource.id()
    }

    pub fn private_ip(&self) -> &DeferredValue<Ipv4Addr> {
        &self.private_ip
    }

    pub fn public_ip(&self) -> &DeferredValue<Ipv4Addr> {
        &self.public_ip
    }
}

/// Declarative resource registry
///
/// Registration never blocks and never talks to a provider.
pub trait ProvisioningEngine {
    /// Record a declaration and return its unresolved outputs
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::DuplicateResource`] if `name` is taken
    /// - [`ProvisionError::UnknownDependency`] if `depends_on` or a deferred
    ///   input names a resource that was not registered before this one
    fn declare(
        &self,
        name: &str,
        spec: ResourceSpec,
        options: ResourceOptions,
    ) -> ProvisionResult<DeclaredOutputs>;

    /// Declare a non-instance resource
    fn register(
        &self,
        name: &str,
        spec: ResourceSpec,
        options: ResourceOptions,
    ) -> ProvisionResult<ResourceHandle> {
        let kind = spec.kind();
        let outputs = self.declare(name, spec, options)?;
        Ok(ResourceHandle {
            name: name.to_string(),
            kind,
            id: outputs.id,
        })
    }

    /// Declare a compute instance
    fn register_instance(
        &self,
        name: &str,
        spec: InstanceSpec,
        options: ResourceOptions,
    ) -> ProvisionResult<InstanceHandle> {
        let outputs = self.declare(name, ResourceSpec::Instance(spec), options)?;
        let (Some(private_ip), Some(public_ip)) = (outputs.private_ip, outputs.public_ip) else {
            return Err(ProvisionError::Lifecycle {
                resource: name.to_string(),
                message: "engine returned no address outputs for an instance".to_string(),
            });
        };
        Ok(InstanceHandle {
            resource: ResourceHandle {
                name: name.to_string(),
                kind: ResourceKind::Instance,
                id: outputs.id,
            },
            private_ip,
            public_ip,
        })
    }
}
