use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use flow::{
    flows::{extension, maintenance, property},
    CommitOperation, FlowState, MemoryEventFeed, MemoryStepStore, RemoteCommitError, Transition,
};
use shared::{
    domain::EventId,
    event::{EventStatus, EventType, NotifStatus, Screen},
};
use tokio::sync::Mutex;

use super::*;

#[derive(Default)]
struct RecordingCommitter {
    commits: Mutex<Vec<(CommitOperation, FlowState)>>,
}

#[async_trait]
impl RemoteCommitter for RecordingCommitter {
    async fn commit(
        &self,
        operation: CommitOperation,
        fields: &FlowState,
    ) -> Result<EntityId, RemoteCommitError> {
        let mut commits = self.commits.lock().await;
        commits.push((operation, fields.clone()));
        Ok(EntityId::new(format!("entity-{}", commits.len())))
    }
}

struct Harness {
    client: RentalClient,
    store: Arc<MemoryStepStore>,
    feed: Arc<MemoryEventFeed>,
    committer: Arc<RecordingCommitter>,
}

fn harness(viewer: &str) -> Harness {
    let store = Arc::new(MemoryStepStore::new());
    let feed = Arc::new(MemoryEventFeed::new());
    let committer = Arc::new(RecordingCommitter::default());
    let client = RentalClient::new(
        UserId::new(viewer),
        store.clone(),
        feed.clone(),
        committer.clone(),
    )
    .expect("client");
    Harness {
        client,
        store,
        feed,
        committer,
    }
}

fn inputs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn approved_extension(viewer: &str) -> EventRecord {
    EventRecord {
        id: EventId::new("evt-ext"),
        viewer_id: UserId::new(viewer),
        event_type: EventType::LeaseExtension,
        status: EventStatus::Approved,
        notif_status: NotifStatus::Unread,
        title: "Lease extension".to_string(),
        message: "Your extension was approved".to_string(),
        created_at: Utc
            .with_ymd_and_hms(2024, 7, 1, 10, 0, 0)
            .single()
            .expect("timestamp"),
        context: BTreeMap::from([("lease_id".to_string(), "lease-3".to_string())]),
    }
}

#[tokio::test]
async fn listing_a_dorm_runs_through_utility_fees_and_commits_once() {
    let h = harness("owner-1");
    let controller = h
        .client
        .start_flow(FlowKind::AddProperty, &[])
        .await
        .expect("start");

    let steps: [&[(&str, &str)]; 5] = [
        &[
            ("property_name", "Sampaguita Dorm"),
            ("property_type", "Dorm"),
            ("address", "45 Katipunan Ave, Quezon City"),
        ],
        &[("latitude", "14.6399"), ("longitude", "121.0777")],
        &[("rent", "3500"), ("max_occupants", "4")],
        &[("electricity_fee", "500"), ("water_fee", "200")],
        &[("accept_terms", "true")],
    ];
    let mut last = None;
    for step in steps {
        last = Some(controller.continue_step(&inputs(step)).await.expect("continue"));
    }
    assert_eq!(last, Some(Transition::Finalize));

    let confirmation = h.client.finalize(&controller).await.expect("finalize");
    assert_eq!(confirmation.operation, CommitOperation::CreateProperty);
    assert!(confirmation.draft_cleared);

    let commits = h.committer.commits.lock().await;
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].1.get("water_fee"), Some("200"));
    drop(commits);
    assert!(h.client.drafts().await.expect("drafts").is_empty());
}

#[tokio::test]
async fn drafts_survive_the_controller_and_resume_where_they_stopped() {
    let h = harness("owner-1");
    let instance = {
        let controller = h
            .client
            .start_flow(FlowKind::AddProperty, &[])
            .await
            .expect("start");
        controller
            .continue_step(&inputs(&[
                ("property_name", "Casa Verde"),
                ("property_type", "Apartment"),
                ("address", "12 Mabini St, Makati"),
            ]))
            .await
            .expect("basics");
        controller.instance()
    };

    assert_eq!(h.client.drafts().await.expect("drafts"), vec![instance]);

    let resumed = h.client.resume_flow(instance).await.expect("resume");
    assert_eq!(resumed.active_step().await, property::LOCATION);
}

#[tokio::test]
async fn one_instance_has_one_writer() {
    let h = harness("owner-1");
    let controller = h
        .client
        .start_flow(FlowKind::SignUp, &[])
        .await
        .expect("start");

    let err = h
        .client
        .resume_flow(controller.instance())
        .await
        .err()
        .expect("second writer refused");
    assert!(matches!(
        err,
        ClientError::Flow(FlowError::NamespaceBusy(_))
    ));

    let err = h
        .client
        .discard_draft(controller.instance())
        .await
        .expect_err("discard while open");
    assert!(matches!(
        err,
        ClientError::Flow(FlowError::NamespaceBusy(_))
    ));

    let instance = controller.instance();
    drop(controller);
    h.client.discard_draft(instance).await.expect("discard");
}

#[tokio::test]
async fn maintenance_requests_target_the_nearest_property() {
    let h = harness("tenant-1");
    let properties = vec![
        PropertyLocation {
            property_id: EntityId::new("cebu-1"),
            name: "Lahug Apartments".to_string(),
            coordinates: Coordinates::new(10.3157, 123.8854),
        },
        PropertyLocation {
            property_id: EntityId::new("makati-1"),
            name: "Casa Verde".to_string(),
            coordinates: Coordinates::new(14.5547, 121.0244),
        },
    ];

    let (controller, property) = h
        .client
        .start_maintenance_request(Coordinates::new(14.5995, 120.9842), &properties)
        .await
        .expect("start");
    assert_eq!(property.property_id, EntityId::new("makati-1"));
    assert_eq!(controller.active_step().await, maintenance::ISSUE);

    let state = h
        .store
        .flow_state(controller.namespace())
        .await
        .expect("state");
    assert_eq!(state.get("property_id"), Some("makati-1"));
}

#[tokio::test]
async fn maintenance_request_needs_a_locatable_property() {
    let h = harness("tenant-1");
    let err = h
        .client
        .start_maintenance_request(Coordinates::new(14.6, 121.0), &[])
        .await
        .err()
        .expect("nothing to pick");
    assert!(matches!(err, ClientError::NoNearbyProperty));

    let lost = [PropertyLocation {
        property_id: EntityId::new("nowhere"),
        name: "Unmapped".to_string(),
        coordinates: Coordinates::new(f64::NAN, 121.0),
    }];
    let err = h
        .client
        .start_maintenance_request(Coordinates::new(14.6, 121.0), &lost)
        .await
        .err()
        .expect("nan coordinates");
    assert!(matches!(err, ClientError::NoNearbyProperty));
}

#[tokio::test]
async fn tenant_dialog_hands_the_lease_to_the_next_screen() {
    let h = harness("tenant-1");
    h.feed.insert(approved_extension("tenant-1")).await;

    let events = h.client.events().await.expect("events");
    assert_eq!(unread_count(&events), 1);

    let dialog = h.client.open_event(&events[0], Role::Tenant).await;
    let outcome = h.client.choose(dialog, 0).await.expect("choose");
    assert_eq!(
        outcome,
        DialogOutcome::Navigate {
            screen: Screen::LeaseView
        }
    );
    assert_eq!(
        h.client.session_value("lease_id").await.expect("session"),
        Some("lease-3".to_string())
    );
    assert_eq!(unread_count(&h.client.events().await.expect("events")), 0);

    h.client.clear_session().await.expect("clear");
    assert_eq!(h.client.session_value("lease_id").await.expect("session"), None);
}

#[tokio::test]
async fn owner_dialog_launches_a_resumable_rent_flow() {
    let h = harness("owner-1");
    h.feed.insert(approved_extension("owner-1")).await;

    let events = h.client.events().await.expect("events");
    let dialog = h.client.open_event(&events[0], Role::Owner).await;
    let DialogOutcome::LaunchFlow { instance } = h.client.choose(dialog, 0).await.expect("choose")
    else {
        panic!("owner should land in the lease-extension flow");
    };

    let controller = h.client.resume_flow(instance).await.expect("resume");
    assert_eq!(controller.active_step().await, extension::SET_RENT);
}

#[tokio::test]
async fn choosing_a_missing_action_is_reported() {
    let h = harness("owner-1");
    h.feed.insert(approved_extension("owner-1")).await;
    let events = h.client.events().await.expect("events");

    let dialog = h.client.open_event(&events[0], Role::Owner).await;
    let err = h.client.choose(dialog, 9).await.expect_err("out of range");
    assert!(matches!(err, ClientError::Dispatch(_)));
}

#[tokio::test]
async fn subscription_delivers_the_viewers_events() {
    let h = harness("tenant-1");
    h.feed.insert(approved_extension("tenant-1")).await;
    let client = h.client.with_poll_interval(Duration::from_millis(10));

    let (mut rx, task) = client.subscribe_events();
    rx.changed().await.expect("snapshot");
    assert_eq!(rx.borrow().len(), 1);
    drop(rx);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("poller stops")
        .expect("poller task");
}

#[tokio::test]
async fn connect_requires_a_viewer() {
    let settings = Settings {
        database_url: "sqlite::memory:".to_string(),
        ..Settings::default()
    };
    let err = RentalClient::connect(&settings)
        .await
        .err()
        .expect("no viewer");
    assert!(err.to_string().contains("no viewer configured"));

    let settings = Settings {
        viewer_id: Some("owner-1".to_string()),
        ..settings
    };
    let client = RentalClient::connect(&settings).await.expect("connect");
    assert_eq!(client.viewer(), &UserId::new("owner-1"));
    assert!(client.drafts().await.expect("drafts").is_empty());
}
