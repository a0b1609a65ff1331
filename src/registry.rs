//! Name-indexed set of flows, populated once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ErrorContext};
use crate::flow::{Flow, InvokeOptions, TypedFlow};
use crate::Result;

/// Read-only registry of flows.
///
/// Built through [`FlowRegistryBuilder`]; there is no way to add or replace a
/// flow afterwards, so a registry can be shared freely behind an `Arc`.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: BTreeMap<String, Arc<Flow>>,
}

/// Collects flows, rejecting duplicate names.
#[derive(Debug, Default)]
pub struct FlowRegistryBuilder {
    flows: BTreeMap<String, Arc<Flow>>,
}

impl FlowRegistryBuilder {
    pub fn register(mut self, flow: Flow) -> Result<Self> {
        let name = flow.name().to_string();
        if self.flows.contains_key(&name) {
            return Err(Error::configuration_with_context(
                format!("Flow '{}' is already registered", name),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_source("flow_registry"),
            ));
        }
        self.flows.insert(name, Arc::new(flow));
        Ok(self)
    }

    pub fn build(self) -> FlowRegistry {
        FlowRegistry { flows: self.flows }
    }
}

impl FlowRegistry {
    pub fn builder() -> FlowRegistryBuilder {
        FlowRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Flow>> {
        self.flows.get(name).ok_or_else(|| Error::UnknownFlow {
            name: name.to_string(),
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value> {
        self.invoke_with(name, input, InvokeOptions::default()).await
    }

    pub async fn invoke_with(
        &self,
        name: &str,
        input: Value,
        options: InvokeOptions,
    ) -> Result<Value> {
        self.get(name)?.invoke_with(input, options).await
    }

    /// Typed handle to a registered flow.
    pub fn typed<I, O>(&self, name: &str) -> Result<TypedFlow<I, O>>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        self.get(name).map(|flow| TypedFlow::new(Arc::clone(flow)))
    }

    /// Descriptors of every flow, in name order.
    pub fn describe(&self) -> Value {
        Value::Array(self.flows.values().map(|f| f.describe()).collect())
    }
}
