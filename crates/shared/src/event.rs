use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EventId, FlowKind, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    LeaseExtension,
    FeedbackUpa,
    FeedbackPropertyOwner,
    AccountRegistration,
    AccountRegistrationOwner,
    LeaseTermination,
    MaintenanceRequest,
    Report,
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::LeaseExtension => "lease-extension",
            EventType::FeedbackUpa => "feedback-upa",
            EventType::FeedbackPropertyOwner => "feedback-property-owner",
            EventType::AccountRegistration => "account-registration",
            EventType::AccountRegistrationOwner => "account-registration-owner",
            EventType::LeaseTermination => "lease-termination",
            EventType::MaintenanceRequest => "maintenance-request",
            EventType::Report => "report",
            EventType::Unknown => "unknown",
        }
    }

    /// Lenient parse for rows written by other clients; unrecognized types
    /// still resolve through the fallback dialog.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lease-extension" => EventType::LeaseExtension,
            "feedback-upa" => EventType::FeedbackUpa,
            "feedback-property-owner" => EventType::FeedbackPropertyOwner,
            "account-registration" => EventType::AccountRegistration,
            "account-registration-owner" => EventType::AccountRegistrationOwner,
            "lease-termination" => EventType::LeaseTermination,
            "maintenance-request" => EventType::MaintenanceRequest,
            "report" => EventType::Report,
            _ => EventType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Status not set by the writer yet.
    #[default]
    Pending,
    Approved,
    Rejected,
    Urgent,
    Important,
    Success,
    Acknowledged,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Urgent => "urgent",
            EventStatus::Important => "important",
            EventStatus::Success => "success",
            EventStatus::Acknowledged => "acknowledged",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" => EventStatus::Approved,
            "rejected" => EventStatus::Rejected,
            "urgent" => EventStatus::Urgent,
            "important" => EventStatus::Important,
            "success" => EventStatus::Success,
            "acknowledged" => EventStatus::Acknowledged,
            _ => EventStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifStatus {
    #[default]
    Unread,
    Read,
}

impl NotifStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifStatus::Unread => "unread",
            NotifStatus::Read => "read",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("read") {
            NotifStatus::Read
        } else {
            NotifStatus::Unread
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub viewer_id: UserId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub notif_status: NotifStatus,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Cross-flow identifiers attached by the writer (lease id, proposed rent, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    LeaseView,
    ExtensionReview,
    OwnerDashboard,
    TenantDashboard,
    PropertyListing,
    TerminationStatus,
    MaintenanceStatus,
    ReportStatus,
    Notifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum NavTarget {
    Screen(Screen),
    /// Entry step of a fresh instance of the given flow.
    Flow(FlowKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionColor {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ActionKind {
    Close,
    Navigate(NavTarget),
    ConfirmAndNavigate(NavTarget),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogAction {
    pub label: String,
    pub color: ActionColor,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogDescriptor {
    pub title: String,
    pub message: String,
    pub actions: Vec<DialogAction>,
}

impl DialogDescriptor {
    /// True when the only thing the viewer can do is dismiss or confirm.
    pub fn is_acknowledgement_only(&self) -> bool {
        self.actions
            .iter()
            .all(|action| action.kind == ActionKind::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_status_deserializes_as_pending_unread() {
        let raw = serde_json::json!({
            "id": "evt-1",
            "viewer_id": "u-1",
            "type": "lease-extension",
            "title": "Lease extension",
            "message": "A tenant asked to extend",
            "created_at": "2024-05-01T08:00:00Z"
        });
        let record: EventRecord = serde_json::from_value(raw).expect("record");
        assert_eq!(record.status, EventStatus::Pending);
        assert_eq!(record.notif_status, NotifStatus::Unread);
        assert!(record.context.is_empty());
    }

    #[test]
    fn unknown_event_type_is_preserved_as_unknown() {
        let raw = serde_json::json!({
            "id": "evt-2",
            "viewer_id": "u-1",
            "type": "rent-reminder",
            "status": "important",
            "title": "Rent due",
            "message": "Rent is due tomorrow",
            "created_at": "2024-05-01T08:00:00Z"
        });
        let record: EventRecord = serde_json::from_value(raw).expect("record");
        assert_eq!(record.event_type, EventType::Unknown);
        assert_eq!(EventType::parse("rent-reminder"), EventType::Unknown);
        assert_eq!(EventStatus::parse(""), EventStatus::Pending);
    }
}
