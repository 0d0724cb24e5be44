use std::sync::atomic::{AtomicUsize, Ordering};

use shared::domain::{FlowInstance, FlowKind};

use super::*;

#[tokio::test]
async fn delete_namespace_clears_every_field() {
    let store = MemoryStepStore::new();
    let ns = FlowInstance::start(FlowKind::AddProperty).namespace();
    let other = FlowInstance::start(FlowKind::EditProperty).namespace();

    for field in ["property_name", "rent", "__path"] {
        store.set(&ns, field, "x").await.expect("set");
    }
    store.set(&other, "rent", "9000").await.expect("set other");

    store.delete_namespace(&ns).await.expect("delete namespace");

    for field in ["property_name", "rent", "__path"] {
        assert_eq!(store.get(&ns, field).await.expect("get"), None);
    }
    assert_eq!(
        store.get(&other, "rent").await.expect("get other"),
        Some("9000".to_string())
    );
    assert_eq!(store.namespaces().await.expect("namespaces"), vec![other]);
}

#[tokio::test]
async fn flow_state_hides_reserved_fields() {
    let store = MemoryStepStore::new();
    let ns = FlowInstance::start(FlowKind::SignUp).namespace();
    store
        .set_many(
            &ns,
            &[
                ("first_name".to_string(), "Maria".to_string()),
                ("__path".to_string(), "personal_info".to_string()),
            ],
        )
        .await
        .expect("set many");

    let state = store.flow_state(&ns).await.expect("state");
    assert_eq!(state.len(), 1);
    assert_eq!(state.get("first_name"), Some("Maria"));
    assert_eq!(store.entries(&ns).await.expect("entries").len(), 2);
}

#[tokio::test]
async fn deleting_last_field_drops_the_namespace() {
    let store = MemoryStepStore::new();
    let ns = FlowInstance::start(FlowKind::ReportProfile).namespace();
    store.set(&ns, "category", "Scam").await.expect("set");
    store.delete(&ns, "category").await.expect("delete");
    assert!(store.namespaces().await.expect("namespaces").is_empty());
}

/// Store whose `set` fails after a fixed number of successful writes.
struct FlakyStore {
    inner: MemoryStepStore,
    remaining: AtomicUsize,
}

#[async_trait]
impl StepStore for FlakyStore {
    async fn get(&self, namespace: &Namespace, field: &str) -> Result<Option<String>> {
        self.inner.get(namespace, field).await
    }

    async fn set(&self, namespace: &Namespace, field: &str, value: &str) -> Result<()> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(anyhow!("disk full"));
        }
        self.inner.set(namespace, field, value).await
    }

    async fn delete(&self, namespace: &Namespace, field: &str) -> Result<()> {
        self.inner.delete(namespace, field).await
    }

    async fn delete_namespace(&self, namespace: &Namespace) -> Result<()> {
        self.inner.delete_namespace(namespace).await
    }

    async fn entries(&self, namespace: &Namespace) -> Result<BTreeMap<String, String>> {
        self.inner.entries(namespace).await
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>> {
        self.inner.namespaces().await
    }
}

#[tokio::test]
async fn default_set_many_reports_partial_progress() {
    let store = FlakyStore {
        inner: MemoryStepStore::new(),
        remaining: AtomicUsize::new(1),
    };
    let ns = FlowInstance::start(FlowKind::OwnerUpgrade).namespace();
    let err = store
        .set_many(
            &ns,
            &[
                ("business_name".to_string(), "Casa".to_string()),
                ("tin".to_string(), "123456789".to_string()),
            ],
        )
        .await
        .expect_err("second write fails");

    let rendered = format!("{err:#}");
    assert!(rendered.contains("stopped at 'tin' after 1 of 2 fields"), "{rendered}");
    assert!(rendered.contains("disk full"), "{rendered}");
    assert_eq!(
        store.get(&ns, "business_name").await.expect("get"),
        Some("Casa".to_string())
    );
}
