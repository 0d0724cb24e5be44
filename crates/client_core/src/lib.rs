pub mod config;
pub mod error;
pub mod events;
pub mod remote;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use flow::{
    geo::{self, Coordinates},
    notifications::standard_table,
    Confirmation, DialogOutcome, EventDispatcher, EventFeed, Finalizer, FlowCatalog, FlowError,
    OpenDialog, RemoteCommitter, StepController, StepStore, WriterRegistry,
};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{EntityId, FlowInstance, FlowKind, Namespace, Role, UserId},
    event::EventRecord,
};
use storage::Storage;
use tokio::task::JoinHandle;
use tracing::info;

pub use config::{load_settings, Settings};
pub use error::ClientError;
pub use events::{spawn_event_poller, unread_count, EventWatcher};
pub use remote::HttpCommitter;

pub type FlowController = StepController<dyn StepStore>;

/// A property the viewer can file maintenance requests against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyLocation {
    pub property_id: EntityId,
    pub name: String,
    pub coordinates: Coordinates,
}

/// Wires the draft store, the backend committer and the event dispatcher for
/// one signed-in viewer.
pub struct RentalClient {
    viewer: UserId,
    store: Arc<dyn StepStore>,
    feed: Arc<dyn EventFeed>,
    catalog: FlowCatalog,
    writers: WriterRegistry,
    finalizer: Finalizer<dyn RemoteCommitter>,
    dispatcher: EventDispatcher<dyn EventFeed, dyn StepStore>,
    poll_interval: Duration,
}

impl RentalClient {
    pub fn new(
        viewer: UserId,
        store: Arc<dyn StepStore>,
        feed: Arc<dyn EventFeed>,
        committer: Arc<dyn RemoteCommitter>,
    ) -> Result<Self, ClientError> {
        let catalog = FlowCatalog::standard().map_err(FlowError::from)?;
        let dispatcher =
            EventDispatcher::new(Arc::new(standard_table()), feed.clone(), store.clone());
        Ok(Self {
            viewer,
            store,
            feed,
            catalog,
            writers: WriterRegistry::new(),
            finalizer: Finalizer::new(committer),
            dispatcher,
            poll_interval: Settings::default().poll_interval(),
        })
    }

    /// Opens the SQLite store and the HTTP committer described by `settings`.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let viewer = settings
            .viewer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::new)
            .ok_or_else(|| anyhow!("no viewer configured; set viewer_id or RENTAL_VIEWER_ID"))?;

        let database_url = config::prepare_database_url(&settings.database_url)?;
        let storage = Arc::new(Storage::new(&database_url).await?);
        let committer = HttpCommitter::new(&settings.backend_url, settings.request_timeout())
            .context("failed to build backend client")?;

        info!(%viewer, %database_url, backend_url = %settings.backend_url, "rental client connected");
        let client = Self::new(viewer, storage.clone(), storage, Arc::new(committer))?;
        Ok(client.with_poll_interval(settings.poll_interval()))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn catalog(&self) -> &FlowCatalog {
        &self.catalog
    }

    /// Starts a fresh instance of `kind`, writing `seed` before the first
    /// step is mounted.
    pub async fn start_flow(
        &self,
        kind: FlowKind,
        seed: &[(String, String)],
    ) -> Result<FlowController, ClientError> {
        let controller = self.resume_flow(FlowInstance::start(kind)).await?;
        if !seed.is_empty() {
            controller.seed(seed).await?;
        }
        info!(instance = %controller.instance(), seeded = seed.len(), "flow started");
        Ok(controller)
    }

    /// Reattaches to an instance, restoring the step it was left on.
    pub async fn resume_flow(&self, instance: FlowInstance) -> Result<FlowController, ClientError> {
        let definition = self
            .catalog
            .get(instance.kind)
            .ok_or(ClientError::UnknownFlow(instance.kind))?;
        Ok(StepController::open(self.store.clone(), definition, instance, &self.writers).await?)
    }

    /// Flow instances with saved drafts. Session namespaces are skipped.
    pub async fn drafts(&self) -> Result<Vec<FlowInstance>, ClientError> {
        let namespaces = self
            .store
            .namespaces()
            .await
            .map_err(|source| ClientError::store("failed to list drafts", source))?;
        Ok(namespaces
            .iter()
            .filter_map(Namespace::instance)
            .collect())
    }

    pub async fn discard_draft(&self, instance: FlowInstance) -> Result<(), ClientError> {
        let namespace = instance.namespace();
        let _lease = self.writers.acquire(&namespace)?;
        self.store
            .delete_namespace(&namespace)
            .await
            .map_err(|source| ClientError::store(format!("failed to discard {namespace}"), source))?;
        info!(%namespace, "draft discarded");
        Ok(())
    }

    pub async fn finalize(&self, controller: &FlowController) -> Result<Confirmation, ClientError> {
        Ok(controller.finalize(&self.finalizer).await?)
    }

    pub async fn events(&self) -> Result<Vec<EventRecord>, ClientError> {
        self.feed
            .events_for_viewer(&self.viewer)
            .await
            .map_err(|source| ClientError::store("failed to load events", source))
    }

    pub async fn open_event(&self, record: &EventRecord, role: Role) -> OpenDialog {
        self.dispatcher.open(record, role).await
    }

    pub async fn choose(
        &self,
        dialog: OpenDialog,
        index: usize,
    ) -> Result<DialogOutcome, ClientError> {
        Ok(self.dispatcher.choose(dialog, index).await?)
    }

    pub fn subscribe_events(&self) -> (EventWatcher, JoinHandle<()>) {
        spawn_event_poller(self.feed.clone(), self.viewer.clone(), self.poll_interval)
    }

    /// Starts a maintenance request against the viewer's property closest to
    /// `origin`.
    pub async fn start_maintenance_request(
        &self,
        origin: Coordinates,
        properties: &[PropertyLocation],
    ) -> Result<(FlowController, PropertyLocation), ClientError> {
        let (property, distance) = geo::nearest(origin, properties, |p| p.coordinates)
            .ok_or(ClientError::NoNearbyProperty)?;
        info!(
            property_id = %property.property_id,
            distance_m = distance.round(),
            "nearest property selected"
        );

        let seed = [(
            "property_id".to_string(),
            property.property_id.to_string(),
        )];
        let controller = self.start_flow(FlowKind::MaintenanceRequest, &seed).await?;
        Ok((controller, property.clone()))
    }

    /// Values handed to the current screen by a dialog or an earlier screen.
    pub async fn session_value(&self, field: &str) -> Result<Option<String>, ClientError> {
        self.store
            .get(&self.session(), field)
            .await
            .map_err(|source| ClientError::store(format!("failed to read session.{field}"), source))
    }

    pub async fn set_session_value(&self, field: &str, value: &str) -> Result<(), ClientError> {
        self.store
            .set(&self.session(), field, value)
            .await
            .map_err(|source| ClientError::store(format!("failed to write session.{field}"), source))
    }

    pub async fn clear_session(&self) -> Result<(), ClientError> {
        self.store
            .delete_namespace(&self.session())
            .await
            .map_err(|source| ClientError::store("failed to clear session", source))
    }

    fn session(&self) -> Namespace {
        Namespace::session(&self.viewer)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
