//! Durable draft storage keyed by (namespace, field).

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use shared::domain::Namespace;
use tokio::sync::RwLock;

/// Field names starting with this prefix hold controller bookkeeping and are
/// never part of a [`FlowState`].
pub const RESERVED_PREFIX: &str = "__";

pub fn is_reserved(field: &str) -> bool {
    field.starts_with(RESERVED_PREFIX)
}

/// Every user-entered draft value under one namespace at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlowState {
    values: BTreeMap<String, String>,
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Present and not blank.
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|value| !value.trim().is_empty())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.values.remove(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl FromIterator<(String, String)> for FlowState {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .filter(|(field, _)| !is_reserved(field))
                .collect(),
        }
    }
}

#[async_trait]
pub trait StepStore: Send + Sync {
    async fn get(&self, namespace: &Namespace, field: &str) -> Result<Option<String>>;
    async fn set(&self, namespace: &Namespace, field: &str, value: &str) -> Result<()>;
    async fn delete(&self, namespace: &Namespace, field: &str) -> Result<()>;
    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()>;
    /// Raw entries including reserved bookkeeping fields.
    async fn entries(&self, namespace: &Namespace) -> Result<BTreeMap<String, String>>;
    async fn namespaces(&self) -> Result<Vec<Namespace>>;

    /// Writes one step's fields. Implementations that can should make this
    /// all-or-nothing; this fallback writes in order and reports how far it got.
    async fn set_many(&self, namespace: &Namespace, entries: &[(String, String)]) -> Result<()> {
        let mut written: Vec<&str> = Vec::with_capacity(entries.len());
        for (field, value) in entries {
            if let Err(err) = self.set(namespace, field, value).await {
                return Err(err.context(format!(
                    "step write to {namespace} stopped at '{field}' after {} of {} fields ({written:?} landed)",
                    written.len(),
                    entries.len()
                )));
            }
            written.push(field);
        }
        Ok(())
    }

    async fn flow_state(&self, namespace: &Namespace) -> Result<FlowState> {
        Ok(self.entries(namespace).await?.into_iter().collect())
    }
}

/// In-process store, used by tests and by hosts that do not need drafts to
/// survive a restart.
#[derive(Default)]
pub struct MemoryStepStore {
    namespaces: RwLock<BTreeMap<Namespace, BTreeMap<String, String>>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn get(&self, namespace: &Namespace, field: &str) -> Result<Option<String>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(namespace)
            .and_then(|fields| fields.get(field).cloned()))
    }

    async fn set(&self, namespace: &Namespace, field: &str, value: &str) -> Result<()> {
        if field.is_empty() {
            return Err(anyhow!("draft field name must not be empty"));
        }
        self.namespaces
            .write()
            .await
            .entry(namespace.clone())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, field: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(fields) = namespaces.get_mut(namespace) {
            fields.remove(field);
            if fields.is_empty() {
                namespaces.remove(namespace);
            }
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn entries(&self, namespace: &Namespace) -> Result<BTreeMap<String, String>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn set_many(&self, namespace: &Namespace, entries: &[(String, String)]) -> Result<()> {
        if entries.iter().any(|(field, _)| field.is_empty()) {
            return Err(anyhow!("draft field name must not be empty"));
        }
        let mut namespaces = self.namespaces.write().await;
        let fields = namespaces.entry(namespace.clone()).or_default();
        for (field, value) in entries {
            fields.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
