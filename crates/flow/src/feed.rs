//! Notification records delivered to a viewer.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{EventId, UserId},
    event::{EventRecord, EventStatus, NotifStatus},
};
use tokio::sync::RwLock;

#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Newest first.
    async fn events_for_viewer(&self, viewer: &UserId) -> Result<Vec<EventRecord>>;
    async fn set_notif_status(&self, id: &EventId, status: NotifStatus) -> Result<()>;
    async fn set_status(&self, id: &EventId, status: EventStatus) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryEventFeed {
    events: RwLock<BTreeMap<EventId, EventRecord>>,
}

impl MemoryEventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: EventRecord) {
        self.events.write().await.insert(record.id.clone(), record);
    }

    pub async fn get(&self, id: &EventId) -> Option<EventRecord> {
        self.events.read().await.get(id).cloned()
    }
}

#[async_trait]
impl EventFeed for MemoryEventFeed {
    async fn events_for_viewer(&self, viewer: &UserId) -> Result<Vec<EventRecord>> {
        let mut events: Vec<EventRecord> = self
            .events
            .read()
            .await
            .values()
            .filter(|record| &record.viewer_id == viewer)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn set_notif_status(&self, id: &EventId, status: NotifStatus) -> Result<()> {
        let mut events = self.events.write().await;
        let record = events
            .get_mut(id)
            .ok_or_else(|| anyhow!("no event with id {id}"))?;
        record.notif_status = status;
        Ok(())
    }

    async fn set_status(&self, id: &EventId, status: EventStatus) -> Result<()> {
        let mut events = self.events.write().await;
        let record = events
            .get_mut(id)
            .ok_or_else(|| anyhow!("no event with id {id}"))?;
        record.status = status;
        Ok(())
    }
}
