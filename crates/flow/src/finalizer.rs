//! Terminal step: aggregate the draft, commit it once, clear it on success.
//! A draft that outlives its commit is marked so it is never sent twice.

use std::sync::Arc;

use serde::Serialize;
use shared::domain::{EntityId, FlowInstance, Namespace};
use tracing::{error, info, warn};

use crate::{
    definition::FlowDefinition,
    error::{AggregationError, FlowError, MissingField},
    remote::{CommitOperation, RemoteCommitter},
    store::{FlowState, StepStore},
};

/// Written when the backend accepted a draft that could not then be removed.
/// Holds the entity id the commit returned.
pub(crate) const COMMITTED_FIELD: &str = "__committed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub instance: FlowInstance,
    pub operation: CommitOperation,
    pub entity_id: EntityId,
    /// False when the commit succeeded but the draft could not be removed.
    pub draft_cleared: bool,
}

/// Collects the fields owned by the steps the draft's answers select, plus
/// seeded fields. Values left behind by abandoned branches are not included.
pub async fn aggregate<S>(
    store: &S,
    definition: &FlowDefinition,
    namespace: &Namespace,
) -> Result<FlowState, FlowError>
where
    S: StepStore + ?Sized,
{
    let draft = store
        .flow_state(namespace)
        .await
        .map_err(|source| FlowError::StoreRead {
            namespace: namespace.clone(),
            source,
        })?;
    let path = definition.path(&draft)?;

    let mut state = FlowState::new();
    let mut missing = Vec::new();

    for &field in definition.seeded_fields() {
        match draft.get(field) {
            Some(value) if draft.has(field) => state.insert(field, value),
            _ => missing.push(MissingField { step: None, field }),
        }
    }

    for step_id in &path {
        let Some(step) = definition.step(*step_id) else {
            continue;
        };
        for field in &step.fields {
            match draft.get(field.name) {
                Some(value) if draft.has(field.name) => state.insert(field.name, value),
                _ if field.required => missing.push(MissingField {
                    step: Some(step.id),
                    field: field.name,
                }),
                _ => {}
            }
        }
    }

    if !missing.is_empty() {
        let err = AggregationError {
            namespace: namespace.clone(),
            path,
            missing,
        };
        error!(
            flow = %definition.kind(),
            %namespace,
            error = %err,
            "flow definition defect: required draft fields absent at commit time"
        );
        return Err(err.into());
    }

    Ok(state)
}

pub struct Finalizer<C: RemoteCommitter + ?Sized> {
    committer: Arc<C>,
}

impl<C: RemoteCommitter + ?Sized> Clone for Finalizer<C> {
    fn clone(&self) -> Self {
        Self {
            committer: Arc::clone(&self.committer),
        }
    }
}

impl<C: RemoteCommitter + ?Sized> Finalizer<C> {
    pub fn new(committer: Arc<C>) -> Self {
        Self { committer }
    }

    pub async fn finalize<S>(
        &self,
        store: &S,
        definition: &FlowDefinition,
        instance: FlowInstance,
    ) -> Result<Confirmation, FlowError>
    where
        S: StepStore + ?Sized,
    {
        let namespace = instance.namespace();
        let operation = definition.operation();

        let committed = store
            .get(&namespace, COMMITTED_FIELD)
            .await
            .map_err(|source| FlowError::StoreRead {
                namespace: namespace.clone(),
                source,
            })?;
        if let Some(entity_id) = committed {
            let entity_id = EntityId::new(entity_id);
            info!(%namespace, %entity_id, "draft already committed; retrying clear only");
            let draft_cleared = clear(store, &namespace, &entity_id).await;
            return Ok(Confirmation {
                instance,
                operation,
                entity_id,
                draft_cleared,
            });
        }

        let state = aggregate(store, definition, &namespace).await?;
        let entity_id = self
            .committer
            .commit(operation, &state)
            .await
            .map_err(|err| {
                warn!(
                    %namespace,
                    %operation,
                    retryable = err.is_retryable(),
                    error = %err,
                    "remote commit failed; draft kept for retry"
                );
                err
            })?;

        let draft_cleared = clear(store, &namespace, &entity_id).await;
        if !draft_cleared {
            let marker = [(COMMITTED_FIELD.to_string(), entity_id.to_string())];
            if let Err(error) = store.set_many(&namespace, &marker).await {
                error!(
                    %namespace,
                    %entity_id,
                    error = %error,
                    "failed to mark the uncleared draft as committed"
                );
            }
        }

        info!(%namespace, %operation, %entity_id, "flow committed");
        Ok(Confirmation {
            instance,
            operation,
            entity_id,
            draft_cleared,
        })
    }
}

async fn clear<S>(store: &S, namespace: &Namespace, entity_id: &EntityId) -> bool
where
    S: StepStore + ?Sized,
{
    match store.delete_namespace(namespace).await {
        Ok(()) => true,
        Err(error) => {
            error!(
                %namespace,
                %entity_id,
                error = %error,
                "commit succeeded but the draft could not be cleared"
            );
            false
        }
    }
}
