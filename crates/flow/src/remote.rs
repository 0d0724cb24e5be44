//! Remote collaborators the finalizer commits through.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use shared::{domain::EntityId, error::ApiError};
use thiserror::Error;

use crate::store::FlowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOperation {
    CreateProperty,
    UpdateProperty,
    RegisterAccount,
    SubmitProfileReport,
    SubmitPropertyReport,
    SubmitTerminationRequest,
    ApproveLeaseExtension,
    SubmitUpgradeRequest,
    SubmitMaintenanceRequest,
}

impl CommitOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            CommitOperation::CreateProperty => "create_property",
            CommitOperation::UpdateProperty => "update_property",
            CommitOperation::RegisterAccount => "register_account",
            CommitOperation::SubmitProfileReport => "submit_profile_report",
            CommitOperation::SubmitPropertyReport => "submit_property_report",
            CommitOperation::SubmitTerminationRequest => "submit_termination_request",
            CommitOperation::ApproveLeaseExtension => "approve_lease_extension",
            CommitOperation::SubmitUpgradeRequest => "submit_upgrade_request",
            CommitOperation::SubmitMaintenanceRequest => "submit_maintenance_request",
        }
    }

    /// Draft field naming the existing entity an operation targets, if any.
    pub fn target_field(self) -> Option<&'static str> {
        match self {
            CommitOperation::UpdateProperty => Some("property_id"),
            CommitOperation::ApproveLeaseExtension => Some("lease_id"),
            _ => None,
        }
    }
}

impl fmt::Display for CommitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RemoteCommitError {
    #[error("backend rejected {operation}: {}", error.message)]
    Rejected {
        operation: CommitOperation,
        error: ApiError,
    },
    #[error("{operation} did not reach the backend: {source}")]
    Transport {
        operation: CommitOperation,
        source: anyhow::Error,
    },
}

impl RemoteCommitError {
    pub fn operation(&self) -> CommitOperation {
        match self {
            RemoteCommitError::Rejected { operation, .. }
            | RemoteCommitError::Transport { operation, .. } => *operation,
        }
    }

    /// Transport failures and transient backend codes may succeed on resubmit.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteCommitError::Rejected { error, .. } => error.is_transient(),
            RemoteCommitError::Transport { .. } => true,
        }
    }
}

#[async_trait]
pub trait RemoteCommitter: Send + Sync {
    async fn commit(
        &self,
        operation: CommitOperation,
        fields: &FlowState,
    ) -> Result<EntityId, RemoteCommitError>;
}
