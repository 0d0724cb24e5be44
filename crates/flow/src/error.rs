use std::fmt;

use serde::Serialize;
use shared::domain::Namespace;
use thiserror::Error;

use crate::{
    definition::{DefinitionError, StepId},
    remote::RemoteCommitError,
    validate::FieldError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingField {
    /// `None` for fields the launcher was supposed to seed.
    pub step: Option<StepId>,
    pub field: &'static str,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "{step}.{}", self.field),
            None => write!(f, "seed.{}", self.field),
        }
    }
}

/// A required field was absent at commit time. This points at a flow-table
/// or launcher defect rather than at user input.
#[derive(Debug, Error)]
#[error("draft {namespace} cannot be committed; missing {}", render_missing(.missing))]
pub struct AggregationError {
    pub namespace: Namespace,
    /// Path the draft's answers select, first step to terminal step.
    pub path: Vec<StepId>,
    pub missing: Vec<MissingField>,
}

impl AggregationError {
    /// Earliest step on the path that owns a missing field.
    pub fn owning_step(&self) -> Option<StepId> {
        self.missing.iter().find_map(|missing| missing.step)
    }
}

fn render_missing(missing: &[MissingField]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("step '{step}' has {} invalid field(s)", errors.len())]
    Validation {
        step: StepId,
        errors: Vec<FieldError>,
    },
    #[error("failed to save step '{step}' of {namespace}: {source}")]
    StoreWrite {
        namespace: Namespace,
        step: StepId,
        source: anyhow::Error,
    },
    #[error("failed to read draft {namespace}: {source}")]
    StoreRead {
        namespace: Namespace,
        source: anyhow::Error,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    RemoteCommit(#[from] RemoteCommitError),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("another action on {0} is still in progress")]
    Busy(Namespace),
    #[error("{0} is already being edited by another flow instance")]
    NamespaceBusy(Namespace),
    #[error("{namespace} is on step '{step}', which does not submit the flow")]
    NotReadyToFinalize { namespace: Namespace, step: StepId },
    #[error("{0} was already submitted")]
    Finished(Namespace),
}

impl FlowError {
    /// Errors the viewer can fix or retry without a code change.
    pub fn is_user_recoverable(&self) -> bool {
        match self {
            FlowError::Validation { .. }
            | FlowError::StoreWrite { .. }
            | FlowError::StoreRead { .. }
            | FlowError::Busy(_)
            | FlowError::NamespaceBusy(_) => true,
            FlowError::RemoteCommit(err) => err.is_retryable(),
            FlowError::Aggregation(_)
            | FlowError::Definition(_)
            | FlowError::NotReadyToFinalize { .. }
            | FlowError::Finished(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dialog offers {available} action(s); index {index} is out of range")]
    NoSuchAction { index: usize, available: usize },
    #[error("failed to hand event context to {namespace}: {source}")]
    Seed {
        namespace: Namespace,
        source: anyhow::Error,
    },
}
