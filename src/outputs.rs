// Copyright (c) 2025 - Cowboy AI, Inc.
//! Exported stack outputs

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::deferred::{fan_in, DeferredValue};

/// Named deferred outputs, in export order
#[derive(Debug, Clone, Default)]
pub struct StackOutputs {
    entries: Vec<(String, DeferredValue<String>)>,
}

impl StackOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `value` under `key`, rendered with `Display` once resolved
    pub fn export<T>(&mut self, key: impl Into<String>, value: &DeferredValue<T>)
    where
        T: Display + Clone + Send + Sync + 'static,
    {
        self.entries
            .push((key.into(), value.transform(|value| value.to_string())));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved value of `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .and_then(|(_, value)| value.get())
    }

    /// JSON object of every output; unresolved values are `null`
    pub fn snapshot(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.get().map_or(Value::Null, Value::String)))
            .collect();
        Value::Object(map)
    }

    /// Resolves once every output has
    pub fn settled(&self) -> DeferredValue<BTreeMap<String, String>> {
        let keys: Vec<String> = self.entries.iter().map(|(key, _)| key.clone()).collect();
        let values = self.entries.iter().map(|(_, value)| value.clone()).collect();
        fan_in(values).transform(move |values| keys.into_iter().zip(values).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::Ipv4Addr;

    #[test]
    fn test_snapshot_marks_unresolved_as_null() {
        let id = DeferredValue::from_source("my-vpc");
        let ip = DeferredValue::<Ipv4Addr>::from_source("master-instance");
        let mut outputs = StackOutputs::new();
        outputs.export("vpc_id", &id);
        outputs.export("master_private_ip", &ip);

        id.resolve("vpc-0001".to_string());
        assert_eq!(
            outputs.snapshot(),
            json!({"vpc_id": "vpc-0001", "master_private_ip": null})
        );
        assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["vpc_id", "master_private_ip"]);
    }

    #[test]
    fn test_settled_waits_for_all() {
        let a = DeferredValue::new();
        let b = DeferredValue::new();
        let mut outputs = StackOutputs::new();
        outputs.export("a", &a);
        outputs.export("b", &b);
        let settled = outputs.settled();

        a.resolve(1u32);
        assert!(!settled.is_resolved());
        b.resolve(2u32);
        assert_eq!(
            settled.get().unwrap(),
            BTreeMap::from([("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())])
        );
        assert_eq!(outputs.get("b").as_deref(), Some("2"));
    }
}
