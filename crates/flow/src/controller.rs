//! One controller implementation shared by every step of every flow.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use chrono::NaiveDate;
use serde::Serialize;
use shared::domain::{FlowInstance, Namespace};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId, Transition},
    error::FlowError,
    finalizer::{Confirmation, Finalizer, COMMITTED_FIELD},
    remote::RemoteCommitter,
    store::{is_reserved, FlowState, StepStore},
    validate::{FieldError, ValidationContext},
};

pub(crate) const PATH_FIELD: &str = "__path";
pub(crate) const READY_FIELD: &str = "__ready";

/// Tracks which namespaces currently have a live controller. One writer per
/// namespace; the store itself does not enforce this.
#[derive(Clone, Default)]
pub struct WriterRegistry {
    active: Arc<StdMutex<HashSet<Namespace>>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, namespace: &Namespace) -> Result<NamespaceLease, FlowError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(namespace.clone()) {
            return Err(FlowError::NamespaceBusy(namespace.clone()));
        }
        Ok(NamespaceLease {
            registry: self.clone(),
            namespace: namespace.clone(),
        })
    }

    pub fn is_held(&self, namespace: &Namespace) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(namespace)
    }
}

/// Released on drop.
pub struct NamespaceLease {
    registry: WriterRegistry,
    namespace: Namespace,
}

impl Drop for NamespaceLease {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.namespace);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub value: Option<String>,
}

/// What a screen needs to render the active step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step: StepId,
    pub title: &'static str,
    pub fields: Vec<FieldView>,
    pub copy: Option<&'static str>,
    pub options: Option<&'static [&'static str]>,
    pub ready_to_finalize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cursor {
    first: StepId,
    path: Vec<StepId>,
    ready: bool,
    /// The backend accepted this draft.
    finished: bool,
    /// Set together with `finished` once the draft is gone from the store.
    cleared: bool,
}

impl Cursor {
    fn fresh(first: StepId) -> Self {
        Self {
            first,
            path: vec![first],
            ready: false,
            finished: false,
            cleared: false,
        }
    }

    fn restore(definition: &FlowDefinition, entries: &BTreeMap<String, String>) -> Self {
        let first = definition.first_step();
        let path: Option<Vec<StepId>> = entries.get(PATH_FIELD).and_then(|raw| {
            raw.split(',')
                .map(|name| definition.step_named(name.trim()))
                .collect()
        });
        // A committed draft whose clear failed earlier must never be sent again.
        let finished = entries.contains_key(COMMITTED_FIELD);
        match path {
            Some(path) if path.first() == Some(&first) => Self {
                first,
                path,
                ready: entries.get(READY_FIELD).is_some_and(|v| v == "true"),
                finished,
                cleared: false,
            },
            _ => Self {
                finished,
                ..Self::fresh(first)
            },
        }
    }

    fn active(&self) -> StepId {
        self.path.last().copied().unwrap_or(self.first)
    }

    fn encode(&self) -> [(String, String); 2] {
        let path = self
            .path
            .iter()
            .map(|step| step.as_str())
            .collect::<Vec<_>>()
            .join(",");
        [
            (PATH_FIELD.to_string(), path),
            (READY_FIELD.to_string(), self.ready.to_string()),
        ]
    }
}

pub struct StepController<S: StepStore + ?Sized> {
    store: Arc<S>,
    definition: Arc<FlowDefinition>,
    instance: FlowInstance,
    namespace: Namespace,
    ctx: ValidationContext,
    cursor: Mutex<Cursor>,
    _lease: NamespaceLease,
}

impl<S: StepStore + ?Sized> StepController<S> {
    /// Claims the instance's namespace and restores the step it was left on.
    pub async fn open(
        store: Arc<S>,
        definition: Arc<FlowDefinition>,
        instance: FlowInstance,
        writers: &WriterRegistry,
    ) -> Result<Self, FlowError> {
        if definition.kind() != instance.kind {
            return Err(DefinitionError::KindMismatch {
                flow: definition.kind(),
                instance: instance.kind,
            }
            .into());
        }

        let namespace = instance.namespace();
        let lease = writers.acquire(&namespace)?;
        let entries = store
            .entries(&namespace)
            .await
            .map_err(|source| FlowError::StoreRead {
                namespace: namespace.clone(),
                source,
            })?;
        let cursor = Cursor::restore(&definition, &entries);
        debug!(%namespace, step = %cursor.active(), "flow controller opened");

        Ok(Self {
            store,
            definition,
            instance,
            namespace,
            ctx: ValidationContext::today(),
            cursor: Mutex::new(cursor),
            _lease: lease,
        })
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.ctx = ValidationContext { today };
        self
    }

    pub fn instance(&self) -> FlowInstance {
        self.instance
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub async fn active_step(&self) -> StepId {
        self.cursor.lock().await.active()
    }

    pub async fn is_ready_to_finalize(&self) -> bool {
        self.cursor.lock().await.ready
    }

    /// Writes launcher-provided values (entity ids, event context) before the
    /// first step is shown. Reserved bookkeeping names are dropped.
    pub async fn seed(&self, fields: &[(String, String)]) -> Result<(), FlowError> {
        let cursor = self.lock_idle()?;
        let (reserved, fields): (Vec<_>, Vec<_>) = fields
            .iter()
            .cloned()
            .partition(|(field, _)| is_reserved(field));
        if !reserved.is_empty() {
            warn!(
                namespace = %self.namespace,
                dropped = ?reserved.iter().map(|(field, _)| field.as_str()).collect::<Vec<_>>(),
                "ignoring reserved seed fields"
            );
        }
        if fields.is_empty() {
            return Ok(());
        }
        self.store
            .set_many(&self.namespace, &fields)
            .await
            .map_err(|source| FlowError::StoreWrite {
                namespace: self.namespace.clone(),
                step: cursor.active(),
                source,
            })
    }

    /// Loads the active step with whatever was saved for it earlier.
    pub async fn mount(&self) -> Result<StepView, FlowError> {
        let cursor = self.cursor.lock().await;
        let step = self.step_definition(cursor.active())?;
        let state = self.read_state().await?;
        let options = step.options.and_then(|table| table.select(&state));

        Ok(StepView {
            step: step.id,
            title: step.title,
            fields: step
                .fields
                .iter()
                .map(|field| FieldView {
                    name: field.name,
                    label: field.label,
                    required: field.required,
                    value: state.get(field.name).map(ToOwned::to_owned),
                })
                .collect(),
            copy: options.map(|set| set.copy),
            options: options.map(|set| set.options),
            ready_to_finalize: cursor.ready,
        })
    }

    /// Validates the active step against `inputs` (falling back to saved
    /// values for fields not supplied), saves it as one unit, and advances.
    pub async fn continue_step(
        &self,
        inputs: &BTreeMap<String, String>,
    ) -> Result<Transition, FlowError> {
        let mut cursor = self.lock_idle()?;
        self.ensure_open(&cursor)?;
        let step = self.step_definition(cursor.active())?;

        let mut candidate = self.read_state().await?;
        for field in &step.fields {
            if let Some(value) = inputs.get(field.name) {
                candidate.insert(field.name, value.trim());
            }
        }

        let errors: Vec<FieldError> = step
            .fields
            .iter()
            .filter_map(|field| field.check(&candidate, &self.ctx).err())
            .collect();
        if !errors.is_empty() {
            debug!(
                namespace = %self.namespace,
                step = %step.id,
                invalid = errors.len(),
                "step blocked by validation"
            );
            return Err(FlowError::Validation {
                step: step.id,
                errors,
            });
        }

        let transition = self.definition.next(step.id, &candidate)?;
        let mut next = cursor.clone();
        match transition {
            Transition::Step(id) => {
                next.path.push(id);
                next.ready = false;
            }
            Transition::Finalize => next.ready = true,
        }

        let mut writes: Vec<(String, String)> = step
            .fields
            .iter()
            .filter_map(|field| {
                candidate
                    .get(field.name)
                    .map(|value| (field.name.to_string(), value.to_string()))
            })
            .collect();
        writes.extend(next.encode());

        self.store
            .set_many(&self.namespace, &writes)
            .await
            .map_err(|source| {
                warn!(
                    namespace = %self.namespace,
                    step = %step.id,
                    error = %source,
                    "step save failed; staying on step"
                );
                FlowError::StoreWrite {
                    namespace: self.namespace.clone(),
                    step: step.id,
                    source,
                }
            })?;

        info!(
            namespace = %self.namespace,
            from = %step.id,
            to = ?transition,
            "step saved"
        );
        *cursor = next;
        Ok(transition)
    }

    /// Returns to the previous step. Saved values stay in the store.
    pub async fn back(&self) -> Result<StepId, FlowError> {
        let mut cursor = self.lock_idle()?;
        self.ensure_open(&cursor)?;
        if cursor.path.len() > 1 {
            cursor.path.pop();
        }
        cursor.ready = false;
        self.remember(&cursor).await;
        Ok(cursor.active())
    }

    /// Moves back to `step` if it is on the current path.
    pub async fn rewind_to(&self, step: StepId) -> Result<(), FlowError> {
        let mut cursor = self.lock_idle()?;
        self.ensure_open(&cursor)?;
        let Some(position) = cursor.path.iter().position(|s| *s == step) else {
            return Err(DefinitionError::UnknownStep {
                flow: self.definition.kind(),
                step: step.to_string(),
            }
            .into());
        };
        cursor.path.truncate(position + 1);
        cursor.ready = false;
        self.remember(&cursor).await;
        Ok(())
    }

    /// Discards every answer and returns to the first step. Seeded fields
    /// survive so the flow still knows what it is about.
    pub async fn reset(&self) -> Result<(), FlowError> {
        let mut cursor = self.lock_idle()?;
        self.ensure_open(&cursor)?;
        let state = self.read_state().await?;
        let seeded: Vec<(String, String)> = self
            .definition
            .seeded_fields()
            .iter()
            .filter_map(|&field| state.get(field).map(|v| (field.to_string(), v.to_string())))
            .collect();

        let write_err = |source| FlowError::StoreWrite {
            namespace: self.namespace.clone(),
            step: self.definition.first_step(),
            source,
        };
        self.store
            .delete_namespace(&self.namespace)
            .await
            .map_err(write_err)?;
        if !seeded.is_empty() {
            self.store
                .set_many(&self.namespace, &seeded)
                .await
                .map_err(write_err)?;
        }

        *cursor = Cursor::fresh(self.definition.first_step());
        info!(namespace = %self.namespace, "flow reset");
        Ok(())
    }

    /// Submits the flow. Only allowed once the terminal step has been saved.
    /// A failed commit leaves the draft and the active step untouched; a
    /// missing field routes back to the step that owns it. A committed draft
    /// that could not be cleared is only cleared again, never resent.
    pub async fn finalize<C>(&self, finalizer: &Finalizer<C>) -> Result<Confirmation, FlowError>
    where
        C: RemoteCommitter + ?Sized,
    {
        let mut cursor = self.lock_idle()?;
        if cursor.finished && cursor.cleared {
            return Err(FlowError::Finished(self.namespace.clone()));
        }
        if !cursor.finished && !cursor.ready {
            return Err(FlowError::NotReadyToFinalize {
                namespace: self.namespace.clone(),
                step: cursor.active(),
            });
        }

        match finalizer
            .finalize(&*self.store, &self.definition, self.instance)
            .await
        {
            Ok(confirmation) => {
                cursor.finished = true;
                cursor.cleared = confirmation.draft_cleared;
                Ok(confirmation)
            }
            Err(FlowError::Aggregation(err)) => {
                if let Some(owner) = err.owning_step() {
                    if let Some(position) = err.path.iter().position(|s| *s == owner) {
                        cursor.path = err.path[..=position].to_vec();
                        cursor.ready = false;
                        self.remember(&cursor).await;
                    }
                }
                Err(FlowError::Aggregation(err))
            }
            Err(err) => Err(err),
        }
    }

    fn ensure_open(&self, cursor: &Cursor) -> Result<(), FlowError> {
        if cursor.finished {
            return Err(FlowError::Finished(self.namespace.clone()));
        }
        Ok(())
    }

    fn lock_idle(&self) -> Result<tokio::sync::MutexGuard<'_, Cursor>, FlowError> {
        self.cursor
            .try_lock()
            .map_err(|_| FlowError::Busy(self.namespace.clone()))
    }

    fn step_definition(&self, id: StepId) -> Result<&StepDefinition, FlowError> {
        self.definition.step(id).ok_or_else(|| {
            DefinitionError::UnknownStep {
                flow: self.definition.kind(),
                step: id.to_string(),
            }
            .into()
        })
    }

    async fn read_state(&self) -> Result<FlowState, FlowError> {
        self.store
            .flow_state(&self.namespace)
            .await
            .map_err(|source| FlowError::StoreRead {
                namespace: self.namespace.clone(),
                source,
            })
    }

    /// Persists the cursor so a remount resumes here. Failure only costs the
    /// resume position, never draft values.
    async fn remember(&self, cursor: &Cursor) {
        if let Err(error) = self.store.set_many(&self.namespace, &cursor.encode()).await {
            warn!(
                namespace = %self.namespace,
                error = %error,
                "could not persist step position"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
