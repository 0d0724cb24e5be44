use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::domain::FlowKind;

use super::*;
use crate::{
    controller::{StepController, WriterRegistry},
    feed::MemoryEventFeed,
    flows::{self, extension},
    notifications::standard_table,
    store::MemoryStepStore,
};

fn record(event_type: EventType, status: EventStatus) -> EventRecord {
    EventRecord {
        id: EventId::new("evt-1"),
        viewer_id: UserId::new("viewer-1"),
        event_type,
        status,
        notif_status: NotifStatus::Unread,
        title: "Lease update".to_string(),
        message: "Your lease changed".to_string(),
        created_at: Utc
            .with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
            .single()
            .expect("timestamp"),
        context: BTreeMap::from([
            ("lease_id".to_string(), "lease-9".to_string()),
            ("proposed_rent".to_string(), "15000".to_string()),
        ]),
    }
}

fn close_only(title: &str) -> DialogDescriptor {
    DialogDescriptor {
        title: title.to_string(),
        message: String::new(),
        actions: vec![DialogAction {
            label: ACKNOWLEDGE_LABEL.to_string(),
            color: ActionColor::Primary,
            kind: ActionKind::Close,
        }],
    }
}

/// Counts read-marks so tests can check they happen once.
#[derive(Default)]
struct CountingFeed {
    inner: MemoryEventFeed,
    read_marks: AtomicUsize,
}

#[async_trait]
impl EventFeed for CountingFeed {
    async fn events_for_viewer(&self, viewer: &UserId) -> Result<Vec<EventRecord>> {
        self.inner.events_for_viewer(viewer).await
    }

    async fn set_notif_status(&self, id: &EventId, status: NotifStatus) -> Result<()> {
        self.read_marks.fetch_add(1, Ordering::SeqCst);
        self.inner.set_notif_status(id, status).await
    }

    async fn set_status(&self, id: &EventId, status: EventStatus) -> Result<()> {
        self.inner.set_status(id, status).await
    }
}

async fn dispatcher_with(
    record: &EventRecord,
) -> (
    EventDispatcher<CountingFeed, MemoryStepStore>,
    Arc<CountingFeed>,
    Arc<MemoryStepStore>,
) {
    let feed = Arc::new(CountingFeed::default());
    feed.inner.insert(record.clone()).await;
    let store = Arc::new(MemoryStepStore::new());
    let dispatcher =
        EventDispatcher::new(Arc::new(standard_table()), feed.clone(), store.clone());
    (dispatcher, feed, store)
}

#[test]
fn resolution_prefers_the_most_specific_entry() {
    let table = DispatchTable::new()
        .with(
            EventType::Report,
            EventStatus::Success,
            Some(Role::Owner),
            close_only("owner success"),
        )
        .with(
            EventType::Report,
            EventStatus::Success,
            None,
            close_only("any success"),
        )
        .with(
            EventType::Report,
            EventStatus::Pending,
            None,
            close_only("default"),
        );
    let success = record(EventType::Report, EventStatus::Success);

    let (dialog, source) = table.resolve_with_source(&success, Role::Owner);
    assert_eq!((dialog.title.as_str(), source), ("owner success", Resolution::Exact));

    let (dialog, source) = table.resolve_with_source(&success, Role::Tenant);
    assert_eq!((dialog.title.as_str(), source), ("any success", Resolution::AnyRole));

    let rejected = record(EventType::Report, EventStatus::Rejected);
    let (dialog, source) = table.resolve_with_source(&rejected, Role::Tenant);
    assert_eq!((dialog.title.as_str(), source), ("default", Resolution::TypeDefault));
}

#[test]
fn unknown_types_fall_back_to_the_record_text() {
    let table = standard_table();
    let unknown = record(EventType::Unknown, EventStatus::Important);

    let (dialog, source) = table.resolve_with_source(&unknown, Role::Tenant);
    assert_eq!(source, Resolution::Fallback);
    assert_eq!(dialog.title, "Lease update");
    assert_eq!(dialog.message, "Your lease changed");
    assert_eq!(dialog.actions.len(), 1);
    assert!(dialog.is_acknowledgement_only());
}

#[test]
fn resolve_is_idempotent() {
    let table = standard_table();
    let approved = record(EventType::LeaseExtension, EventStatus::Approved);
    for role in [Role::Owner, Role::Tenant] {
        assert_eq!(table.resolve(&approved, role), table.resolve(&approved, role));
    }
}

#[test]
fn interpolation_fills_known_keys_and_keeps_unknown_ones() {
    let approved = record(EventType::LeaseExtension, EventStatus::Approved);
    assert_eq!(
        interpolate("Lease {lease_id} at ₱{proposed_rent}: {message}", &approved),
        "Lease lease-9 at ₱15000: Your lease changed"
    );
    assert_eq!(interpolate("{tenant_name} {", &approved), "{tenant_name} {");
}

#[tokio::test]
async fn approved_extension_sends_tenant_to_lease_and_owner_to_rent_setting() {
    let approved = record(EventType::LeaseExtension, EventStatus::Approved);
    let (dispatcher, _feed, store) = dispatcher_with(&approved).await;

    let tenant = dispatcher.open(&approved, Role::Tenant).await;
    assert_eq!(tenant.resolution(), Resolution::Exact);
    let outcome = dispatcher.choose(tenant, 0).await.expect("tenant choice");
    assert_eq!(
        outcome,
        DialogOutcome::Navigate {
            screen: Screen::LeaseView
        }
    );

    let owner = dispatcher.open(&approved, Role::Owner).await;
    assert!(owner.descriptor().message.contains("lease-9"));
    let DialogOutcome::LaunchFlow { instance } =
        dispatcher.choose(owner, 0).await.expect("owner choice")
    else {
        panic!("owner should launch the rent-setting flow");
    };
    assert_eq!(instance.kind, FlowKind::LeaseExtension);

    let controller = StepController::open(
        store.clone(),
        flows::definition(FlowKind::LeaseExtension).expect("definition"),
        instance,
        &WriterRegistry::new(),
    )
    .await
    .expect("open launched flow");
    assert_eq!(controller.active_step().await, extension::SET_RENT);
    let seeded = store.flow_state(&instance.namespace()).await.expect("state");
    assert_eq!(seeded.get("lease_id"), Some("lease-9"));
    assert_eq!(seeded.get(SOURCE_EVENT_FIELD), Some("evt-1"));
}

#[tokio::test]
async fn screen_navigation_hands_context_over_through_the_session() {
    let approved = record(EventType::LeaseExtension, EventStatus::Approved);
    let (dispatcher, _feed, store) = dispatcher_with(&approved).await;

    let dialog = dispatcher.open(&approved, Role::Tenant).await;
    dispatcher.choose(dialog, 0).await.expect("choose");

    let session = Namespace::session(&approved.viewer_id);
    assert_eq!(
        store.get(&session, "lease_id").await.expect("get"),
        Some("lease-9".to_string())
    );
}

#[tokio::test]
async fn a_second_dialog_replaces_the_first_ones_session_context() {
    let mut first = record(EventType::LeaseExtension, EventStatus::Approved);
    first.id = EventId::new("evt-a");
    first.context = BTreeMap::from([
        ("lease_id".to_string(), "lease-A".to_string()),
        ("property_id".to_string(), "prop-A".to_string()),
    ]);
    let mut second = record(EventType::LeaseExtension, EventStatus::Approved);
    second.id = EventId::new("evt-b");
    second.context = BTreeMap::from([("lease_id".to_string(), "lease-B".to_string())]);

    let (dispatcher, feed, store) = dispatcher_with(&first).await;
    feed.inner.insert(second.clone()).await;
    let session = Namespace::session(&first.viewer_id);

    let dialog = dispatcher.open(&first, Role::Tenant).await;
    dispatcher.choose(dialog, 0).await.expect("first choice");
    store
        .set(&session, "draft_filter", "active")
        .await
        .expect("screen value");

    let dialog = dispatcher.open(&second, Role::Tenant).await;
    let outcome = dispatcher.choose(dialog, 0).await.expect("second choice");
    assert_eq!(
        outcome,
        DialogOutcome::Navigate {
            screen: Screen::LeaseView
        }
    );

    let get = |field: &'static str| {
        let store = store.clone();
        let session = session.clone();
        async move { store.get(&session, field).await.expect("get") }
    };
    assert_eq!(get("lease_id").await, Some("lease-B".to_string()));
    assert_eq!(get("property_id").await, None);
    assert_eq!(get(SOURCE_EVENT_FIELD).await, Some("evt-b".to_string()));
    assert_eq!(get("draft_filter").await, Some("active".to_string()));
}

#[tokio::test]
async fn opening_marks_unread_records_read_once() {
    let pending = record(EventType::FeedbackUpa, EventStatus::Pending);
    let (dispatcher, feed, _store) = dispatcher_with(&pending).await;

    let _dialog = dispatcher.open(&pending, Role::Tenant).await;
    let stored = feed.inner.get(&pending.id).await.expect("stored record");
    assert_eq!(stored.notif_status, NotifStatus::Read);

    let _again = dispatcher.open(&stored, Role::Tenant).await;
    assert_eq!(feed.read_marks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closing_an_acknowledgement_dialog_acknowledges_pending_records() {
    let pending = record(EventType::FeedbackUpa, EventStatus::Pending);
    let (dispatcher, feed, _store) = dispatcher_with(&pending).await;

    let dialog = dispatcher.open(&pending, Role::Tenant).await;
    let outcome = dispatcher.choose(dialog, 0).await.expect("choose");
    assert_eq!(outcome, DialogOutcome::Dismissed { acknowledged: true });
    let stored = feed.inner.get(&pending.id).await.expect("stored record");
    assert_eq!(stored.status, EventStatus::Acknowledged);
}

#[tokio::test]
async fn closing_leaves_writer_owned_statuses_alone() {
    let approved = record(EventType::LeaseExtension, EventStatus::Approved);
    let (dispatcher, feed, _store) = dispatcher_with(&approved).await;

    let dialog = dispatcher.open(&approved, Role::Tenant).await;
    let later = dialog.descriptor().actions.len() - 1;
    let outcome = dispatcher.choose(dialog, later).await.expect("later");
    assert_eq!(outcome, DialogOutcome::Dismissed { acknowledged: false });
    let stored = feed.inner.get(&approved.id).await.expect("stored record");
    assert_eq!(stored.status, EventStatus::Approved);
}

#[tokio::test]
async fn out_of_range_action_is_an_error() {
    let pending = record(EventType::Report, EventStatus::Pending);
    let (dispatcher, _feed, _store) = dispatcher_with(&pending).await;

    let dialog = dispatcher.open(&pending, Role::Owner).await;
    let err = dispatcher.choose(dialog, 5).await.expect_err("no action 5");
    assert!(matches!(
        err,
        DispatchError::NoSuchAction {
            index: 5,
            available: 1
        }
    ));
}
