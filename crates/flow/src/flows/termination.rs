use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

pub const REASON: StepId = StepId("reason");
pub const OTHER_REASON: StepId = StepId("other_reason");
pub const MOVE_OUT: StepId = StepId("move_out");
pub const CONFIRM: StepId = StepId("confirm");

pub const REASONS: &[&str] = &[
    "Relocating for work",
    "Found a cheaper place",
    "Property condition",
    "Personal reasons",
    "Other",
];

pub(super) fn definition() -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(FlowKind::LeaseTermination, CommitOperation::SubmitTerminationRequest)
        .seeded("lease_id")
        .step(
            StepDefinition::new(REASON, "Why are you leaving?")
                .field(FieldSpec::required("reason", "Reason").rule(Rule::OneOf(REASONS)))
                .branch_on("reason", &["Other"], OTHER_REASON, MOVE_OUT),
        )
        .step(
            StepDefinition::new(OTHER_REASON, "Tell us why")
                .field(
                    FieldSpec::required("other_reason", "Reason")
                        .rule(Rule::Length { min: 10, max: 300 }),
                )
                .goto(MOVE_OUT),
        )
        .step(
            StepDefinition::new(MOVE_OUT, "Move-out details")
                .field(
                    FieldSpec::required("move_out_date", "Move-out date")
                        .rule(Rule::Date)
                        .rule(Rule::NotInPast),
                )
                .field(
                    FieldSpec::optional("forwarding_address", "Forwarding address")
                        .rule(Rule::Length { min: 5, max: 200 }),
                )
                .goto(CONFIRM),
        )
        .step(
            StepDefinition::new(CONFIRM, "Confirm termination")
                .field(
                    FieldSpec::required("acknowledge_penalty", "Early termination terms")
                        .rule(Rule::Accepted),
                )
                .finalize(),
        )
        .build()
}
