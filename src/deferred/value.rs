// Copyright (c) 2025 - Cowboy AI, Inc.
//! DeferredValue - single-assignment, observer-backed placeholder
//!
//! # States
//!
//! ```text
//! Unresolved(observers) ──resolve(v)──> Resolved(v)
//! Resolved(v)           ──resolve(w)──> error: AlreadyResolved
//! ```
//!
//! Observers are `FnOnce(&T)` callbacks. The lock is never held while an
//! observer runs, so an observer may freely register further observers or
//! resolve other deferred values.

use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;

/// Errors raised by misuse of a deferred value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError {
    /// `resolve` was called on a value that already holds a result
    #[error("deferred value from {sources:?} resolved more than once")]
    AlreadyResolved { sources: Vec<String> },
}

type Observer<T> = Box<dyn FnOnce(&T) + Send + 'static>;

enum State<T> {
    Unresolved(Vec<Observer<T>>),
    Resolved(T),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    sources: BTreeSet<String>,
}

/// Single-assignment placeholder for a value produced later
///
/// Cloning a `DeferredValue` clones the handle, not the slot: every clone
/// observes the same resolution.
pub struct DeferredValue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DeferredValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for DeferredValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let mut out = f.debug_struct("DeferredValue");
        match &*state {
            State::Unresolved(observers) => out
                .field("state", &"unresolved")
                .field("observers", &observers.len()),
            State::Resolved(value) => out.field("state", &"resolved").field("value", value),
        };
        out.field("sources", &self.inner.sources).finish()
    }
}

impl<T> DeferredValue<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Observers never run under the lock, so a poisoned mutex still holds
        // a consistent state.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sources (resource names) this value derives from
    pub fn sources(&self) -> &BTreeSet<String> {
        &self.inner.sources
    }

    /// Whether the value has been resolved
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.lock(), State::Resolved(_))
    }

    #[cfg(test)]
    fn pending_observers(&self) -> usize {
        match &*self.lock() {
            State::Unresolved(observers) => observers.len(),
            State::Resolved(_) => 0,
        }
    }

    /// Whether two handles point at the same slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Send + Sync + 'static> DeferredValue<T> {
    /// Create an unresolved value with explicit provenance
    pub fn with_sources(sources: BTreeSet<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Unresolved(Vec::new())),
                sources,
            }),
        }
    }

    /// Create an unresolved value with no provenance
    pub fn new() -> Self {
        Self::with_sources(BTreeSet::new())
    }

    /// Create an unresolved value produced by a single named source
    pub fn from_source(source: impl Into<String>) -> Self {
        Self::with_sources(BTreeSet::from([source.into()]))
    }

    /// Create a value that is already resolved
    ///
    /// Useful where an API takes a deferred value but the caller knows the
    /// answer at declaration time.
    pub fn known(value: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Resolved(value)),
                sources: BTreeSet::new(),
            }),
        }
    }

    /// Resolve the value, running every queued observer in registration order
    ///
    /// # Errors
    ///
    /// [`DeferredError::AlreadyResolved`] if the value was already resolved.
    /// The stored value is left untouched and no observer runs.
    pub fn try_resolve(&self, value: T) -> Result<(), DeferredError> {
        let observers = {
            let mut state = self.lock();
            match &mut *state {
                State::Resolved(_) => {
                    return Err(DeferredError::AlreadyResolved {
                        sources: self.inner.sources.iter().cloned().collect(),
                    })
                }
                State::Unresolved(observers) => {
                    let observers = mem::take(observers);
                    *state = State::Resolved(value.clone());
                    observers
                }
            }
        };

        for observer in observers {
            observer(&value);
        }
        Ok(())
    }

    /// Resolve the value
    ///
    /// # Panics
    ///
    /// Panics if the value was already resolved. A second resolution means
    /// two producers claim the same attribute, which is a topology bug and
    /// not something a caller can recover from.
    pub fn resolve(&self, value: T) {
        if let Err(err) = self.try_resolve(value) {
            panic!("{err}");
        }
    }

    /// Current value, if resolved
    pub fn get(&self) -> Option<T> {
        match &*self.lock() {
            State::Resolved(value) => Some(value.clone()),
            State::Unresolved(_) => None,
        }
    }

    /// Register an observer
    ///
    /// Runs at resolution time, or right now if the value is already
    /// resolved.
    pub fn on_resolve<F>(&self, observer: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let resolved = {
            let mut state = self.lock();
            match &mut *state {
                State::Unresolved(observers) => {
                    observers.push(Box::new(observer));
                    return;
                }
                State::Resolved(value) => value.clone(),
            }
        };
        observer(&resolved);
    }

    /// Derive a new deferred value by applying `f` once this one resolves
    ///
    /// `f` runs exactly once. The derived value inherits this value's
    /// sources.
    pub fn transform<U, F>(&self, f: F) -> DeferredValue<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let derived = DeferredValue::with_sources(self.inner.sources.clone());
        let target = derived.clone();
        self.on_resolve(move |value| {
            // Ignored if a caller already resolved the derived value by hand.
            let _ = target.try_resolve(f(value.clone()));
        });
        derived
    }

    /// Wait for resolution from async code
    ///
    /// Consumes this handle. Returns `None` once every other handle is
    /// dropped while the value is still unresolved; as long as a producer
    /// holds a handle the future stays pending.
    pub async fn wait(self) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        self.on_resolve(move |value| {
            let _ = tx.send(value.clone());
        });
        drop(self);
        rx.await.ok()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for DeferredValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_resolve_once() {
        let value = DeferredValue::new();
        assert!(!value.is_resolved());
        assert_eq!(value.get(), None);

        value.resolve(42);
        assert!(value.is_resolved());
        assert_eq!(value.get(), Some(42));
    }

    #[test]
    fn test_second_resolution_is_rejected() {
        let value = DeferredValue::from_source("master-instance");
        value.resolve(1);

        let err = value.try_resolve(2).unwrap_err();
        assert_eq!(
            err,
            DeferredError::AlreadyResolved {
                sources: vec!["master-instance".to_string()]
            }
        );
        assert_eq!(value.get(), Some(1));
    }

    #[test]
    #[should_panic(expected = "resolved more than once")]
    fn test_resolve_twice_panics() {
        let value = DeferredValue::new();
        value.resolve("a");
        value.resolve("b");
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let value = DeferredValue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            value.on_resolve(move |v: &i32| log.lock().unwrap().push(format!("{tag}:{v}")));
        }
        assert_eq!(value.pending_observers(), 3);
        assert!(log.lock().unwrap().is_empty());

        value.resolve(7);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:7", "second:7", "third:7"]
        );
        assert_eq!(value.pending_observers(), 0);
    }

    #[test]
    fn test_transform_before_and_after_resolution_agree() {
        let value = DeferredValue::new();
        let early = value.transform(|x: i32| x * 10);

        value.resolve(4);
        let late = value.transform(|x: i32| x * 10);

        // the late transform fired synchronously inside `transform`
        assert_eq!(late.get(), Some(40));
        assert_eq!(early.get(), late.get());
    }

    #[test]
    fn test_transform_fires_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let value = DeferredValue::new();

        let counted = Arc::clone(&calls);
        let derived = value.transform(move |x: u8| {
            counted.fetch_add(1, Ordering::SeqCst);
            x + 1
        });

        value.resolve(1);
        let _ = value.try_resolve(2);
        let _ = derived.get();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(derived.get(), Some(2));
    }

    #[test]
    fn test_transform_chain_inherits_sources() {
        let ip = DeferredValue::<String>::from_source("master-instance");
        let url = ip
            .transform(|ip| format!("{ip}:6443"))
            .transform(|addr| format!("https://{addr}"));

        assert_eq!(url.sources(), ip.sources());
        ip.resolve("10.0.1.5".to_string());
        assert_eq!(url.get().as_deref(), Some("https://10.0.1.5:6443"));
    }

    #[test]
    fn test_known_value() {
        let value = DeferredValue::known("ready");
        assert!(value.is_resolved());
        assert!(value.sources().is_empty());
        assert_eq!(value.transform(str::len).get(), Some(5));
    }

    #[test]
    fn test_unresolved_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let value: DeferredValue<i32> = DeferredValue::new();

        let counted = Arc::clone(&fired);
        let derived = value.transform(move |x| {
            counted.fetch_add(1, Ordering::SeqCst);
            x
        });

        assert!(!derived.is_resolved());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observer_may_register_reentrantly() {
        let value = DeferredValue::new();
        let inner_hits = Arc::new(AtomicUsize::new(0));

        let handle = value.clone();
        let hits = Arc::clone(&inner_hits);
        value.on_resolve(move |_: &i32| {
            let hits = Arc::clone(&hits);
            handle.on_resolve(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        });

        value.resolve(0);
        assert_eq!(inner_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let value = DeferredValue::new();
        let clone = value.clone();
        assert!(value.ptr_eq(&clone));

        clone.resolve(3);
        assert_eq!(value.get(), Some(3));
    }

    #[test]
    fn test_debug_shows_state() {
        let value: DeferredValue<i32> = DeferredValue::from_source("igw");
        assert!(format!("{value:?}").contains("unresolved"));
        value.resolve(9);
        assert!(format!("{value:?}").contains("value: 9"));
    }

    #[tokio::test]
    async fn test_wait_resolves_from_another_task() {
        let value = DeferredValue::new();
        let producer = value.clone();

        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            producer.resolve("10.0.1.5".to_string());
        });

        assert_eq!(value.wait().await.as_deref(), Some("10.0.1.5"));
        handle.await.unwrap();
    }

    #[test]
    fn test_wait_stays_pending_until_resolved() {
        use tokio_test::{assert_pending, assert_ready_eq, task};

        let value = DeferredValue::new();
        let mut waiting = task::spawn(value.clone().wait());

        assert_pending!(waiting.poll());
        assert!(!waiting.is_woken());

        value.resolve(6443u16);
        assert!(waiting.is_woken());
        assert_ready_eq!(waiting.poll(), Some(6443));
    }

    #[tokio::test]
    async fn test_wait_returns_none_when_abandoned() {
        let value: DeferredValue<i32> = DeferredValue::new();
        let waiter = value.clone();
        let pending = tokio::spawn(async move { waiter.wait().await });

        drop(value);
        assert_eq!(pending.await.unwrap(), None);
    }
}
