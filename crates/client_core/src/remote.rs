//! Commits finished drafts to the rental backend over HTTP.

use std::{collections::BTreeMap, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use flow::{CommitOperation, FlowState, RemoteCommitError, RemoteCommitter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::{
    domain::EntityId,
    error::{ApiError, ErrorCode},
};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    fields: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
}

#[derive(Clone)]
pub struct HttpCommitter {
    http: Client,
    backend_url: String,
}

impl HttpCommitter {
    pub fn new(backend_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint for `operation`. Operations on an existing entity put its id
    /// in the path.
    pub fn endpoint(
        &self,
        operation: CommitOperation,
        fields: &FlowState,
    ) -> Result<String, RemoteCommitError> {
        let target = match operation.target_field() {
            Some(field) => Some(fields.get(field).filter(|v| !v.trim().is_empty()).ok_or_else(
                || RemoteCommitError::Rejected {
                    operation,
                    error: ApiError::new(
                        ErrorCode::Validation,
                        format!("{operation} needs a {field}"),
                    ),
                },
            )?),
            None => None,
        };

        let path = match (operation, target) {
            (CommitOperation::CreateProperty, _) => "properties".to_string(),
            (CommitOperation::UpdateProperty, Some(id)) => format!("properties/{id}"),
            (CommitOperation::RegisterAccount, _) => "accounts".to_string(),
            (CommitOperation::SubmitProfileReport, _) => "reports/profiles".to_string(),
            (CommitOperation::SubmitPropertyReport, _) => "reports/properties".to_string(),
            (CommitOperation::SubmitTerminationRequest, _) => "termination-requests".to_string(),
            (CommitOperation::ApproveLeaseExtension, Some(id)) => {
                format!("leases/{id}/extension")
            }
            (CommitOperation::SubmitUpgradeRequest, _) => "owner-upgrades".to_string(),
            (CommitOperation::SubmitMaintenanceRequest, _) => "maintenance-requests".to_string(),
            (op, None) => {
                return Err(RemoteCommitError::Transport {
                    operation,
                    source: anyhow!("no target id resolved for {op}"),
                })
            }
        };
        Ok(format!("{}/api/{path}", self.backend_url))
    }
}

/// Best-effort code for rejection bodies that are not an [`ApiError`].
fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

/// Reads a rejection body as an [`ApiError`], falling back to the status
/// when the body is unreadable or not one.
fn rejection<E: std::fmt::Display>(
    operation: CommitOperation,
    status: StatusCode,
    body: Result<String, E>,
) -> ApiError {
    let raw = body.unwrap_or_else(|err| {
        debug!(%operation, %status, error = %err, "could not read rejection body");
        String::new()
    });
    serde_json::from_str::<ApiError>(&raw).unwrap_or_else(|_| {
        ApiError::new(
            code_for_status(status),
            format!("backend answered {status}"),
        )
    })
}

#[async_trait]
impl RemoteCommitter for HttpCommitter {
    async fn commit(
        &self,
        operation: CommitOperation,
        fields: &FlowState,
    ) -> Result<EntityId, RemoteCommitError> {
        let url = self.endpoint(operation, fields)?;
        let transport = |source: anyhow::Error| RemoteCommitError::Transport { operation, source };

        debug!(%operation, %url, fields = fields.len(), "committing draft");
        let response = self
            .http
            .post(&url)
            .json(&CommitRequest {
                fields: fields.iter().collect(),
            })
            .send()
            .await
            .map_err(|err| transport(err.into()))?;

        let status = response.status();
        if status.is_success() {
            let body: CommitResponse = response
                .json()
                .await
                .map_err(|err| transport(anyhow!("malformed commit response: {err}")))?;
            return Ok(EntityId::new(body.id));
        }

        let error = rejection(operation, status, response.text().await);
        warn!(%operation, %status, code = ?error.code, "backend rejected commit");
        Err(RemoteCommitError::Rejected { operation, error })
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
