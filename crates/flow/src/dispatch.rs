//! Maps notification records to dialogs and turns the viewer's choice into
//! a navigation or a freshly seeded flow.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use serde::Serialize;
use shared::{
    domain::{EventId, FlowInstance, Namespace, Role, UserId},
    event::{
        ActionColor, ActionKind, DialogAction, DialogDescriptor, EventRecord, EventStatus,
        EventType, NavTarget, NotifStatus, Screen,
    },
};
use tracing::{debug, info, warn};

use crate::{error::DispatchError, feed::EventFeed, store::is_reserved, store::StepStore};

pub const ACKNOWLEDGE_LABEL: &str = "OK";

/// Field the dispatcher writes next to the record's context when it seeds a
/// namespace, so the target screen knows which event sent the viewer there.
pub const SOURCE_EVENT_FIELD: &str = "source_event_id";

/// Comma-separated names the last dialog wrote into the viewer's session.
const HANDOFF_FIELD: &str = "__handoff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub event_type: EventType,
    pub status: EventStatus,
    /// `None` matches any viewer role.
    pub role: Option<Role>,
}

/// Which table entry produced a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Exact,
    AnyRole,
    TypeDefault,
    Fallback,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<DispatchKey, DialogDescriptor>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        event_type: EventType,
        status: EventStatus,
        role: Option<Role>,
        dialog: DialogDescriptor,
    ) -> Option<DialogDescriptor> {
        self.entries.insert(
            DispatchKey {
                event_type,
                status,
                role,
            },
            dialog,
        )
    }

    pub fn with(
        mut self,
        event_type: EventType,
        status: EventStatus,
        role: Option<Role>,
        dialog: DialogDescriptor,
    ) -> Self {
        self.insert(event_type, status, role, dialog);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve(&self, record: &EventRecord, role: Role) -> DialogDescriptor {
        self.resolve_with_source(record, role).0
    }

    /// Exact (type, status, role), then (type, status, any role), then the
    /// type's Pending entry for the role and for any role, then a dialog
    /// built from the record itself. Never fails.
    pub fn resolve_with_source(
        &self,
        record: &EventRecord,
        role: Role,
    ) -> (DialogDescriptor, Resolution) {
        let candidates = [
            (record.status, Some(role), Resolution::Exact),
            (record.status, None, Resolution::AnyRole),
            (EventStatus::Pending, Some(role), Resolution::TypeDefault),
            (EventStatus::Pending, None, Resolution::TypeDefault),
        ];

        for (status, role, resolution) in candidates {
            let key = DispatchKey {
                event_type: record.event_type,
                status,
                role,
            };
            if let Some(template) = self.entries.get(&key) {
                return (render(template, record), resolution);
            }
        }

        debug!(
            event_id = %record.id,
            event_type = record.event_type.as_str(),
            status = record.status.as_str(),
            "no dialog entry; using record text"
        );
        (fallback(record), Resolution::Fallback)
    }
}

fn fallback(record: &EventRecord) -> DialogDescriptor {
    DialogDescriptor {
        title: record.title.clone(),
        message: record.message.clone(),
        actions: vec![DialogAction {
            label: ACKNOWLEDGE_LABEL.to_string(),
            color: ActionColor::Primary,
            kind: ActionKind::Close,
        }],
    }
}

fn render(template: &DialogDescriptor, record: &EventRecord) -> DialogDescriptor {
    DialogDescriptor {
        title: interpolate(&template.title, record),
        message: interpolate(&template.message, record),
        actions: template.actions.clone(),
    }
}

/// Replaces `{key}` with the record's title, message or a context value.
/// Unknown keys are left as written.
pub fn interpolate(template: &str, record: &EventRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        let value = match key {
            "title" => Some(record.title.as_str()),
            "message" => Some(record.message.as_str()),
            _ => record.context.get(key).map(String::as_str),
        };
        match value {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// A dialog as shown for one tap. Consumed by [`EventDispatcher::choose`];
/// a later tap on the same record must open a new one.
#[derive(Debug)]
pub struct OpenDialog {
    event_id: EventId,
    viewer_id: UserId,
    status: EventStatus,
    context: BTreeMap<String, String>,
    descriptor: DialogDescriptor,
    resolution: Resolution,
}

impl OpenDialog {
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn descriptor(&self) -> &DialogDescriptor {
        &self.descriptor
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DialogOutcome {
    Dismissed { acknowledged: bool },
    Navigate { screen: Screen },
    LaunchFlow { instance: FlowInstance },
}

pub struct EventDispatcher<F: EventFeed + ?Sized, S: StepStore + ?Sized> {
    table: Arc<DispatchTable>,
    feed: Arc<F>,
    store: Arc<S>,
}

impl<F: EventFeed + ?Sized, S: StepStore + ?Sized> EventDispatcher<F, S> {
    pub fn new(table: Arc<DispatchTable>, feed: Arc<F>, store: Arc<S>) -> Self {
        Self { table, feed, store }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Resolves the dialog for `record` and marks the record read if this
    /// snapshot still shows it unread. The dialog is returned even when the
    /// feed update fails.
    pub async fn open(&self, record: &EventRecord, role: Role) -> OpenDialog {
        let (descriptor, resolution) = self.table.resolve_with_source(record, role);

        if record.notif_status == NotifStatus::Unread {
            match self.feed.set_notif_status(&record.id, NotifStatus::Read).await {
                Ok(()) => debug!(event_id = %record.id, "event marked read"),
                Err(error) => warn!(
                    event_id = %record.id,
                    error = %error,
                    "could not mark event read"
                ),
            }
        }

        OpenDialog {
            event_id: record.id.clone(),
            viewer_id: record.viewer_id.clone(),
            status: record.status,
            context: record.context.clone(),
            descriptor,
            resolution,
        }
    }

    /// Applies the action at `index` of the dialog.
    pub async fn choose(
        &self,
        dialog: OpenDialog,
        index: usize,
    ) -> Result<DialogOutcome, DispatchError> {
        let available = dialog.descriptor.actions.len();
        let action = dialog
            .descriptor
            .actions
            .get(index)
            .ok_or(DispatchError::NoSuchAction { index, available })?;

        let outcome = match action.kind {
            ActionKind::Close => {
                let acknowledged = self.acknowledge(&dialog).await;
                DialogOutcome::Dismissed { acknowledged }
            }
            ActionKind::Navigate(target) | ActionKind::ConfirmAndNavigate(target) => {
                self.follow(&dialog, target).await?
            }
        };

        info!(
            event_id = %dialog.event_id,
            action = %action.label,
            outcome = ?outcome,
            "dialog action chosen"
        );
        Ok(outcome)
    }

    /// Pending records whose dialog offers nothing but a close become
    /// Acknowledged. Other statuses are owned by the writer.
    async fn acknowledge(&self, dialog: &OpenDialog) -> bool {
        if dialog.status != EventStatus::Pending || !dialog.descriptor.is_acknowledgement_only() {
            return false;
        }
        match self
            .feed
            .set_status(&dialog.event_id, EventStatus::Acknowledged)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    event_id = %dialog.event_id,
                    error = %error,
                    "could not acknowledge event"
                );
                false
            }
        }
    }

    async fn follow(
        &self,
        dialog: &OpenDialog,
        target: NavTarget,
    ) -> Result<DialogOutcome, DispatchError> {
        match target {
            NavTarget::Screen(screen) => {
                let session = Namespace::session(&dialog.viewer_id);
                self.forget_previous_hand_off(&session).await?;
                self.hand_off(session, dialog).await?;
                Ok(DialogOutcome::Navigate { screen })
            }
            NavTarget::Flow(kind) => {
                let instance = FlowInstance::start(kind);
                self.hand_off(instance.namespace(), dialog).await?;
                Ok(DialogOutcome::LaunchFlow { instance })
            }
        }
    }

    /// Removes what an earlier dialog handed to the session so context from
    /// two events never mixes. Values set by screens themselves are kept.
    async fn forget_previous_hand_off(&self, session: &Namespace) -> Result<(), DispatchError> {
        let seed_error = |source| DispatchError::Seed {
            namespace: session.clone(),
            source,
        };
        let Some(previous) = self
            .store
            .get(session, HANDOFF_FIELD)
            .await
            .map_err(seed_error)?
        else {
            return Ok(());
        };
        for field in previous.split(',').filter(|field| !field.is_empty()) {
            self.store.delete(session, field).await.map_err(seed_error)?;
        }
        debug!(namespace = %session, fields = %previous, "previous hand-off cleared");
        Ok(())
    }

    /// Copies the record's context into `namespace` for the next screen.
    async fn hand_off(&self, namespace: Namespace, dialog: &OpenDialog) -> Result<(), DispatchError> {
        let mut entries: Vec<(String, String)> = dialog
            .context
            .iter()
            .filter(|(key, _)| !key.is_empty() && !key.contains(',') && !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.push((SOURCE_EVENT_FIELD.to_string(), dialog.event_id.to_string()));
        let written = entries
            .iter()
            .map(|(key, _)| key.as_str())
            .collect::<Vec<_>>()
            .join(",");
        entries.push((HANDOFF_FIELD.to_string(), written));

        self.store
            .set_many(&namespace, &entries)
            .await
            .map_err(|source| DispatchError::Seed { namespace, source })
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
