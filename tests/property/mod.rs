// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! This module contains property-based tests using proptest to verify the
//! deferred-value laws and the cluster declarations built on them.

mod cluster_payloads;
mod deferred_laws;
