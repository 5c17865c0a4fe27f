//! k3s cluster bootstrap for the Composable Information Machine
//!
//! Declares a single-control-plane, multi-worker k3s cluster on cloud
//! compute: an isolated network, the cluster security policy, the nodes and
//! their first-boot payloads, and a local SSH access profile.
//!
//! Values that only exist once the provider has created something (ids,
//! addresses) are [`DeferredValue`]s. Worker payloads are transforms over the
//! control plane's private address; the access profile is written behind a
//! fan-in over every node's public address.

pub mod artifact;
pub mod config;
pub mod deferred;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod outputs;
pub mod stack;
pub mod state_machine;
pub mod topology;

// Re-export commonly used types
pub use artifact::{ArtifactError, ArtifactGenerator, HostProfile};
pub use config::{ClusterConfig, ClusterToken, IngressPolicy, IngressScope, ReadinessProbe};
pub use deferred::{fan_in, DeferredError, DeferredValue};
pub use domain::{Cidr, NodeHostname, NodeRole, TrafficRule};
pub use engine::{
    ApplyReport, CloudProvider, ProvisioningEngine, ReconcilingEngine, ResourceOptions,
    ResourceSpec, SimulatedCloud,
};
pub use errors::{ProvisionError, ProvisionResult};
pub use outputs::StackOutputs;
pub use stack::{deploy_cluster, ClusterStack};
pub use state_machine::ResourceLifecycle;
pub use topology::{ClusterInstance, ComputeTopology, NetworkTopology, SecurityPolicy};
