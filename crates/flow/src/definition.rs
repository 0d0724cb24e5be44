//! Flow tables: steps, their fields and the pure next-step selector.

use std::{collections::HashSet, fmt, sync::Arc};

use serde::Serialize;
use shared::domain::FlowKind;
use thiserror::Error;

use crate::{
    remote::CommitOperation,
    store::FlowState,
    validate::{FieldSpec, OptionTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StepId(pub &'static str);

impl StepId {
    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Next {
    Goto(StepId),
    /// First arm whose values contain the field's value wins (case-insensitive).
    Branch {
        field: &'static str,
        arms: Vec<(&'static [&'static str], StepId)>,
        otherwise: StepId,
    },
    Finalize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Transition {
    Step(StepId),
    Finalize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("{flow} has no steps")]
    Empty { flow: FlowKind },
    #[error("{flow} defines step '{step}' twice")]
    DuplicateStep { flow: FlowKind, step: StepId },
    #[error("{flow} step '{from}' points at unknown step '{to}'")]
    UnknownTarget {
        flow: FlowKind,
        from: StepId,
        to: StepId,
    },
    #[error("{flow} has no step '{step}'")]
    UnknownStep { flow: FlowKind, step: String },
    #[error("{flow} revisits step '{step}' before finalizing")]
    Cycle { flow: FlowKind, step: StepId },
    #[error("{flow} definition cannot drive a {instance} instance")]
    KindMismatch { flow: FlowKind, instance: FlowKind },
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: StepId,
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
    /// Option list and copy chosen by an earlier answer.
    pub options: Option<&'static OptionTable>,
    pub next: Next,
}

impl StepDefinition {
    pub fn new(id: StepId, title: &'static str) -> Self {
        Self {
            id,
            title,
            fields: Vec::new(),
            options: None,
            next: Next::Finalize,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn options(mut self, table: &'static OptionTable) -> Self {
        self.options = Some(table);
        self
    }

    pub fn goto(mut self, step: StepId) -> Self {
        self.next = Next::Goto(step);
        self
    }

    pub fn branch(
        mut self,
        field: &'static str,
        arms: Vec<(&'static [&'static str], StepId)>,
        otherwise: StepId,
    ) -> Self {
        self.next = Next::Branch {
            field,
            arms,
            otherwise,
        };
        self
    }

    /// Binary classification: `then` when the field's value is in `values`.
    pub fn branch_on(
        self,
        field: &'static str,
        values: &'static [&'static str],
        then: StepId,
        otherwise: StepId,
    ) -> Self {
        self.branch(field, vec![(values, then)], otherwise)
    }

    pub fn finalize(mut self) -> Self {
        self.next = Next::Finalize;
        self
    }

    fn targets(&self) -> Vec<StepId> {
        match &self.next {
            Next::Goto(step) => vec![*step],
            Next::Branch {
                arms, otherwise, ..
            } => arms
                .iter()
                .map(|(_, step)| *step)
                .chain(std::iter::once(*otherwise))
                .collect(),
            Next::Finalize => Vec::new(),
        }
    }

    fn select(&self, state: &FlowState) -> Transition {
        match &self.next {
            Next::Goto(step) => Transition::Step(*step),
            Next::Branch {
                field,
                arms,
                otherwise,
            } => {
                let value = state.get(field).map(str::trim).unwrap_or_default();
                let chosen = arms
                    .iter()
                    .find(|(values, _)| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
                    .map(|(_, step)| *step)
                    .unwrap_or(*otherwise);
                Transition::Step(chosen)
            }
            Next::Finalize => Transition::Finalize,
        }
    }
}

#[derive(Debug)]
pub struct FlowDefinition {
    kind: FlowKind,
    operation: CommitOperation,
    seeded: Vec<&'static str>,
    steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    pub fn builder(kind: FlowKind, operation: CommitOperation) -> FlowBuilder {
        FlowBuilder {
            kind,
            operation,
            seeded: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn operation(&self) -> CommitOperation {
        self.operation
    }

    /// Fields the launcher writes before the first step is shown.
    pub fn seeded_fields(&self) -> &[&'static str] {
        &self.seeded
    }

    pub fn first_step(&self) -> StepId {
        self.steps[0].id
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Resolves a step name read back from storage.
    pub fn step_named(&self, name: &str) -> Option<StepId> {
        self.steps
            .iter()
            .map(|step| step.id)
            .find(|id| id.as_str() == name)
    }

    /// Pure: depends only on the definition table and `state`.
    pub fn next(&self, current: StepId, state: &FlowState) -> Result<Transition, DefinitionError> {
        self.step(current)
            .map(|step| step.select(state))
            .ok_or_else(|| DefinitionError::UnknownStep {
                flow: self.kind,
                step: current.to_string(),
            })
    }

    /// Steps visited from the first step to the terminal one under `state`.
    pub fn path(&self, state: &FlowState) -> Result<Vec<StepId>, DefinitionError> {
        let mut path = vec![self.first_step()];
        let mut current = self.first_step();
        loop {
            match self.next(current, state)? {
                Transition::Finalize => return Ok(path),
                Transition::Step(next) => {
                    if path.contains(&next) {
                        return Err(DefinitionError::Cycle {
                            flow: self.kind,
                            step: next,
                        });
                    }
                    path.push(next);
                    current = next;
                }
            }
        }
    }
}

pub struct FlowBuilder {
    kind: FlowKind,
    operation: CommitOperation,
    seeded: Vec<&'static str>,
    steps: Vec<StepDefinition>,
}

impl FlowBuilder {
    pub fn seeded(mut self, field: &'static str) -> Self {
        self.seeded.push(field);
        self
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> Result<Arc<FlowDefinition>, DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty { flow: self.kind });
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(DefinitionError::DuplicateStep {
                    flow: self.kind,
                    step: step.id,
                });
            }
        }
        for step in &self.steps {
            if let Some(to) = step.targets().into_iter().find(|to| !seen.contains(to)) {
                return Err(DefinitionError::UnknownTarget {
                    flow: self.kind,
                    from: step.id,
                    to,
                });
            }
        }

        Ok(Arc::new(FlowDefinition {
            kind: self.kind,
            operation: self.operation,
            seeded: self.seeded,
            steps: self.steps,
        }))
    }
}

#[cfg(test)]
#[path = "tests/definition_tests.rs"]
mod tests;
