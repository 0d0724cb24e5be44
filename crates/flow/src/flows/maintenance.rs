use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

pub const ISSUE: StepId = StepId("issue");
pub const SCHEDULE: StepId = StepId("schedule");

pub const CATEGORIES: &[&str] = &[
    "Plumbing",
    "Electrical",
    "Appliance",
    "Structural",
    "Pest control",
    "Other",
];

pub(super) fn definition() -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(FlowKind::MaintenanceRequest, CommitOperation::SubmitMaintenanceRequest)
        .seeded("property_id")
        .step(
            StepDefinition::new(ISSUE, "What needs fixing?")
                .field(FieldSpec::required("category", "Category").rule(Rule::OneOf(CATEGORIES)))
                .field(
                    FieldSpec::required("urgency", "Urgency")
                        .rule(Rule::OneOf(&["Urgent", "Important", "Routine"])),
                )
                .field(
                    FieldSpec::required("description", "Description")
                        .rule(Rule::Length { min: 10, max: 500 }),
                )
                .goto(SCHEDULE),
        )
        .step(
            StepDefinition::new(SCHEDULE, "When can we visit?")
                .field(
                    FieldSpec::required("preferred_date", "Preferred date")
                        .rule(Rule::Date)
                        .rule(Rule::NotInPast),
                )
                .field(
                    FieldSpec::optional("access_notes", "Access notes")
                        .rule(Rule::Length { min: 0, max: 300 }),
                )
                .finalize(),
        )
        .build()
}
