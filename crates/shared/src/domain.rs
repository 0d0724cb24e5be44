use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(EventId);
id_newtype!(EntityId);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown flow kind '{0}'")]
    UnknownFlowKind(String),
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("invalid draft id '{0}'")]
    InvalidDraftId(String),
    #[error("malformed flow instance '{0}'; expected '<kind>/<draft id>'")]
    MalformedInstance(String),
}

/// Viewer role supplied by the caller; never stored on event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Tenant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Tenant => "tenant",
        }
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "tenant" => Ok(Role::Tenant),
            _ => Err(ParseError::UnknownRole(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowKind {
    AddProperty,
    EditProperty,
    SignUp,
    ReportProfile,
    ReportProperty,
    LeaseTermination,
    LeaseExtension,
    OwnerUpgrade,
    MaintenanceRequest,
}

impl FlowKind {
    pub const ALL: [FlowKind; 9] = [
        FlowKind::AddProperty,
        FlowKind::EditProperty,
        FlowKind::SignUp,
        FlowKind::ReportProfile,
        FlowKind::ReportProperty,
        FlowKind::LeaseTermination,
        FlowKind::LeaseExtension,
        FlowKind::OwnerUpgrade,
        FlowKind::MaintenanceRequest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::AddProperty => "add-property",
            FlowKind::EditProperty => "edit-property",
            FlowKind::SignUp => "sign-up",
            FlowKind::ReportProfile => "report-profile",
            FlowKind::ReportProperty => "report-property",
            FlowKind::LeaseTermination => "lease-termination",
            FlowKind::LeaseExtension => "lease-extension",
            FlowKind::OwnerUpgrade => "owner-upgrade",
            FlowKind::MaintenanceRequest => "maintenance-request",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        FlowKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| ParseError::UnknownFlowKind(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub Uuid);

impl DraftId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DraftId {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim())
            .map(DraftId)
            .map_err(|_| ParseError::InvalidDraftId(raw.to_string()))
    }
}

/// Identity of one in-progress flow. Every namespace a flow writes to is
/// derived from this, so two instances never share draft keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowInstance {
    pub kind: FlowKind,
    pub draft_id: DraftId,
}

impl FlowInstance {
    pub fn start(kind: FlowKind) -> Self {
        Self {
            kind,
            draft_id: DraftId::generate(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        Namespace(format!("{}/{}", self.kind.as_str(), self.draft_id))
    }
}

impl fmt::Display for FlowInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.draft_id)
    }
}

impl FromStr for FlowInstance {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (kind, draft_id) = raw
            .trim()
            .split_once('/')
            .ok_or_else(|| ParseError::MalformedInstance(raw.to_string()))?;
        Ok(Self {
            kind: kind.parse()?,
            draft_id: draft_id.parse()?,
        })
    }
}

/// Prefix grouping all draft keys of one flow instance (or one viewer session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Per-viewer scratch space for values handed between unrelated screens.
    pub fn session(viewer: &UserId) -> Self {
        Self(format!("session/{viewer}"))
    }

    /// Wraps a namespace string read back from a store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn instance(&self) -> Option<FlowInstance> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftKey {
    pub namespace: Namespace,
    pub field: String,
}

impl DraftKey {
    pub fn new(namespace: Namespace, field: impl Into<String>) -> Self {
        Self {
            namespace,
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_edit_instances_never_share_a_namespace() {
        let add = FlowInstance::start(FlowKind::AddProperty);
        let edit = FlowInstance {
            kind: FlowKind::EditProperty,
            draft_id: add.draft_id,
        };
        assert_ne!(add.namespace(), edit.namespace());
    }

    #[test]
    fn flow_instance_parses_its_own_display_form() {
        let instance = FlowInstance::start(FlowKind::LeaseTermination);
        let parsed: FlowInstance = instance.to_string().parse().expect("parse instance");
        assert_eq!(parsed, instance);
        assert_eq!(instance.namespace().instance(), Some(instance));
    }

    #[test]
    fn session_namespace_is_not_a_flow_instance() {
        let ns = Namespace::session(&UserId::new("u-1"));
        assert_eq!(ns.as_str(), "session/u-1");
        assert_eq!(ns.instance(), None);
    }

    #[test]
    fn rejects_unknown_flow_kind() {
        assert_eq!(
            "add-spaceship".parse::<FlowKind>(),
            Err(ParseError::UnknownFlowKind("add-spaceship".into()))
        );
        assert_eq!("Owner".parse::<Role>(), Ok(Role::Owner));
    }
}
