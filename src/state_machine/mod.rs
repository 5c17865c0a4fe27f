// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic Mealy-machine plumbing used to track each declared resource
//! through its provisioning lifecycle. Transitions are pure functions; the
//! engine owns the only mutable copy of each machine and records every step
//! it takes.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```

pub mod resource_lifecycle;

pub use resource_lifecycle::{LifecycleEvent, ResourceLifecycle, TransitionOutput};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state on this input is not allowed
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// The state is terminal and accepts no further input
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// Trait for finite state machines
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Whether no input is accepted from this state
    fn is_terminal(&self) -> bool;
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

/// State machine that keeps its transition history
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "FSM: Serialize, FSM::Input: Serialize"))]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    current: FSM,
    history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    /// Start tracking from `initial`
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input`, recording the step on success
    ///
    /// On error the current state and history are unchanged.
    pub fn apply(&mut self, input: FSM::Input, timestamp: DateTime<Utc>) -> TransitionResult<FSM::Output> {
        let (to, output) = self.current.transition(&input)?;
        let from = std::mem::replace(&mut self.current, to.clone());
        self.history.push(Transition {
            from,
            to,
            input,
            timestamp,
        });
        Ok(output)
    }

    /// Recorded transitions, oldest first
    pub fn history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    /// Current state
    pub fn current(&self) -> &FSM {
        &self.current
    }
}
