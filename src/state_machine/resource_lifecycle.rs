// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Lifecycle State Machine
//!
//! Tracks one declared resource through a provisioning run.
//!
//! # States
//!
//! ```text
//! Declared ──CreationRequested──> Creating ──ProviderCreated──> Created
//!    │                               │                            │
//!    │                               └──ProviderRejected──> Failed│
//!    └──DependencyUnavailable──> Skipped                          │
//!                                       AddressesAssigned <───────┘
//!                                              │
//!                                              v
//!                                      AddressesResolved
//! ```
//!
//! Only compute instances take the `AddressesAssigned` step; every other
//! resource ends in `Created`. `Failed`, `Skipped` and `AddressesResolved`
//! are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

/// Provisioning state of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLifecycle {
    /// Registered with the engine, nothing sent to the provider yet
    Declared,
    /// Creation request issued to the provider
    Creating,
    /// Provider reports the resource exists; id known
    Created,
    /// Instance private and public addresses are known
    AddressesResolved,
    /// Provider rejected the request
    Failed,
    /// Never attempted because a dependency did not come up
    Skipped,
}

impl ResourceLifecycle {
    /// Whether dependants may start creating
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Created | Self::AddressesResolved)
    }

    /// Whether the resource will never come up in this run
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for ResourceLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Declared => "declared",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::AddressesResolved => "addresses-resolved",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Lifecycle input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Engine handed the request to the provider
    CreationRequested,
    /// Provider returned a record for the resource
    ProviderCreated,
    /// Instance addresses were delivered
    AddressesAssigned,
    /// Provider returned an error
    ProviderRejected { reason: String },
    /// A dependency failed or was skipped
    DependencyUnavailable { dependency: String },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreationRequested => f.write_str("creation-requested"),
            Self::ProviderCreated => f.write_str("provider-created"),
            Self::AddressesAssigned => f.write_str("addresses-assigned"),
            Self::ProviderRejected { .. } => f.write_str("provider-rejected"),
            Self::DependencyUnavailable { .. } => f.write_str("dependency-unavailable"),
        }
    }
}

/// Transition output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    /// Diagnostics worth surfacing to the operator
    pub warnings: Vec<String>,
}

impl TransitionOutput {
    fn ok() -> Self {
        Self::default()
    }

    fn warn(message: String) -> Self {
        Self {
            warnings: vec![message],
        }
    }
}

impl StateMachine for ResourceLifecycle {
    type Input = LifecycleEvent;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use LifecycleEvent::*;
        use ResourceLifecycle::*;

        match (self, input) {
            (Declared, CreationRequested) => Ok((Creating, TransitionOutput::ok())),
            (Declared, DependencyUnavailable { dependency }) => Ok((
                Skipped,
                TransitionOutput::warn(format!("dependency {dependency} is unavailable")),
            )),
            (Creating, ProviderCreated) => Ok((Created, TransitionOutput::ok())),
            (Creating, ProviderRejected { reason }) => Ok((
                Failed,
                TransitionOutput::warn(format!("provider rejected request: {reason}")),
            )),
            (Created, AddressesAssigned) => Ok((AddressesResolved, TransitionOutput::ok())),

            (Failed | Skipped | AddressesResolved, _) => {
                Err(TransitionError::Terminal(self.to_string()))
            }
            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                input: input.to_string(),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped | Self::AddressesResolved)
    }
}
