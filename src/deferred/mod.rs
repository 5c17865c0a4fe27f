// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Values - Single-Assignment Placeholders
//!
//! Cloud resources expose attributes (ids, addresses) that do not exist until
//! the provider has actually created the resource. Declarations that need
//! those attributes cannot read them up front; they register a computation
//! that runs once the attribute is known.
//!
//! # Core Concepts
//!
//! ## DeferredValue<T>
//!
//! A placeholder that starts unresolved and is resolved exactly once:
//!
//! ```text
//! Time:  ──────────────────────────────────→
//! State: unresolved ─────────● resolved(v) ──
//!                            │
//!                            ├─> transform #1
//!                            ├─> transform #2   (registration order)
//!                            └─> fan_in slot
//! ```
//!
//! Observers registered before resolution are queued and run synchronously,
//! in registration order, on the thread that resolves the value. Observers
//! registered afterwards run immediately on the registering thread.
//!
//! ## Fan-in
//!
//! [`fan_in`] turns `[DeferredValue<T>; k]` into `DeferredValue<Vec<T>>`. The
//! result keeps input order, whatever order the members resolve in, and fires
//! exactly once after the last member resolves.
//!
//! ## Provenance
//!
//! Every deferred value records the set of sources (resource names) it was
//! derived from. `transform` inherits the set and `fan_in` unions it, so a
//! consumer of a derived value still knows which resources must exist first.
//!
//! # No cancellation
//!
//! There is no way to fail or cancel a deferred value. A value whose source
//! is never created simply never resolves, and nothing downstream of it ever
//! fires.
//!
//! ```rust
//! use cim_cluster_bootstrap::deferred::{fan_in, DeferredValue};
//!
//! let ip = DeferredValue::<String>::from_source("master-instance");
//! let url = ip.transform(|ip| format!("https://{ip}:6443"));
//! let all = fan_in(vec![ip.clone(), url.clone()]);
//!
//! assert!(!all.is_resolved());
//! ip.resolve("10.0.1.5".to_string());
//! assert_eq!(url.get().as_deref(), Some("https://10.0.1.5:6443"));
//! assert_eq!(all.get().unwrap().len(), 2);
//! ```

pub mod combinators;
pub mod value;

pub use combinators::fan_in;
pub use value::{DeferredError, DeferredValue};
