use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

pub const BUSINESS_INFO: StepId = StepId("business_info");
pub const DOCUMENTS: StepId = StepId("documents");
pub const CONFIRM: StepId = StepId("confirm");

pub(super) fn definition() -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(FlowKind::OwnerUpgrade, CommitOperation::SubmitUpgradeRequest)
        .step(
            StepDefinition::new(BUSINESS_INFO, "Business information")
                .field(
                    FieldSpec::required("business_name", "Business name")
                        .rule(Rule::Length { min: 2, max: 100 }),
                )
                .field(FieldSpec::required("tin", "TIN").rule(Rule::Digits { min: 9, max: 12 }))
                .goto(DOCUMENTS),
        )
        .step(
            StepDefinition::new(DOCUMENTS, "Supporting documents")
                .field(
                    FieldSpec::required("permit_number", "Business permit number")
                        .rule(Rule::Length { min: 4, max: 40 }),
                )
                .field(
                    FieldSpec::required("valid_id_number", "Valid ID number")
                        .rule(Rule::Length { min: 5, max: 30 }),
                )
                .goto(CONFIRM),
        )
        .step(
            StepDefinition::new(CONFIRM, "Review and submit")
                .field(FieldSpec::required("accept_terms", "Owner terms").rule(Rule::Accepted))
                .finalize(),
        )
        .build()
}
