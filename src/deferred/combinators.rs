// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Value Combinators
//!
//! `fan_in` waits for every member of a list and keeps list order. It is
//! built from `on_resolve` observers; nothing polls.
//!
//! ```rust
//! use cim_cluster_bootstrap::deferred::{fan_in, DeferredValue};
//!
//! let a = DeferredValue::new();
//! let b = DeferredValue::new();
//! let both = fan_in(vec![a.clone(), b.clone()]);
//!
//! b.resolve(2);
//! assert!(!both.is_resolved());
//! a.resolve(1);
//! assert_eq!(both.get(), Some(vec![1, 2]));
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::value::DeferredValue;

struct FanInSlots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Combine a list of deferred values into one deferred list
///
/// The result resolves exactly once, after the last member resolves, and
/// holds the members' values in input order. An empty list resolves
/// immediately to an empty vector. Sources are the union of the members'
/// sources.
pub fn fan_in<T>(members: Vec<DeferredValue<T>>) -> DeferredValue<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let sources: BTreeSet<String> = members
        .iter()
        .flat_map(|member| member.sources().iter().cloned())
        .collect();
    let combined = DeferredValue::with_sources(sources);

    if members.is_empty() {
        let _ = combined.try_resolve(Vec::new());
        return combined;
    }

    let slots = Arc::new(Mutex::new(FanInSlots {
        values: vec![None; members.len()],
        remaining: members.len(),
    }));

    for (index, member) in members.iter().enumerate() {
        let slots = Arc::clone(&slots);
        let combined = combined.clone();

        member.on_resolve(move |value| {
            let complete = {
                let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
                if slots.values[index].is_none() {
                    slots.values[index] = Some(value.clone());
                    slots.remaining -= 1;
                }
                if slots.remaining == 0 {
                    Some(std::mem::take(&mut slots.values))
                } else {
                    None
                }
            };

            if let Some(values) = complete {
                let _ = combined.try_resolve(values.into_iter().flatten().collect());
            }
        });
    }

    combined
}
