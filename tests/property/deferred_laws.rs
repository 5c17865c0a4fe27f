// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for DeferredValue
//!
//! Single assignment, transform timing independence, and fan-in ordering
//! must hold for every input and every resolution order.

use cim_cluster_bootstrap::deferred::{fan_in, DeferredError, DeferredValue};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

/// Values plus an arbitrary order in which to resolve them
fn values_and_order() -> impl Strategy<Value = (Vec<u32>, Vec<usize>)> {
    prop::collection::vec(any::<u32>(), 1..16).prop_flat_map(|values| {
        let indices: Vec<usize> = (0..values.len()).collect();
        (Just(values), Just(indices).prop_shuffle())
    })
}

fn step(x: i64) -> i64 {
    x.wrapping_mul(3).wrapping_add(1)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// fan_in yields declaration order whatever the resolution order
    #[test]
    fn prop_fan_in_preserves_declaration_order((values, order) in values_and_order()) {
        let members: Vec<DeferredValue<u32>> = values.iter().map(|_| DeferredValue::new()).collect();
        let combined = fan_in(members.clone());

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        combined.on_resolve(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for (position, index) in order.iter().enumerate() {
            prop_assert!(!combined.is_resolved(), "resolved early at position {}", position);
            members[*index].resolve(values[*index]);
        }

        prop_assert_eq!(combined.get(), Some(values.clone()));
        prop_assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    /// A transform registered after resolution equals one registered before
    #[test]
    fn prop_transform_timing_is_invisible(x in any::<i64>()) {
        let early_source = DeferredValue::new();
        let early = early_source.transform(step);
        early_source.resolve(x);

        let late_source = DeferredValue::new();
        late_source.resolve(x);
        let late = late_source.transform(step);

        prop_assert_eq!(early.get(), Some(step(x)));
        prop_assert_eq!(early.get(), late.get());
    }

    /// Second resolution is rejected and never overwrites the first
    #[test]
    fn prop_single_assignment(first in any::<u16>(), second in any::<u16>()) {
        let value = DeferredValue::from_source("master-instance");
        prop_assert!(value.try_resolve(first).is_ok());

        let err = value.try_resolve(second).unwrap_err();
        prop_assert_eq!(
            err,
            DeferredError::AlreadyResolved { sources: vec!["master-instance".to_string()] }
        );
        prop_assert_eq!(value.get(), Some(first));
    }

    /// Observers run in registration order, exactly once each
    #[test]
    fn prop_observers_run_in_registration_order(count in 1usize..20) {
        let value = DeferredValue::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for index in 0..count {
            let log = Arc::clone(&log);
            value.on_resolve(move |_: &()| log.lock().unwrap().push(index));
        }
        value.resolve(());

        let seen = log.lock().unwrap().clone();
        prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
    }
}
