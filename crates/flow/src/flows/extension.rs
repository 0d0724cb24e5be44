//! Owner-side approval of a tenant's lease extension, launched from the
//! lease-extension notification.

use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

use super::property::RENT;

pub const SET_RENT: StepId = StepId("set_rent");
pub const EXTENSION_TERM: StepId = StepId("extension_term");

pub(super) fn definition() -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(FlowKind::LeaseExtension, CommitOperation::ApproveLeaseExtension)
        .seeded("lease_id")
        .step(
            StepDefinition::new(SET_RENT, "Rent for the extended term")
                .field(FieldSpec::required("rent", "Monthly rent").rule(RENT))
                .goto(EXTENSION_TERM),
        )
        .step(
            StepDefinition::new(EXTENSION_TERM, "Extension term")
                .field(
                    FieldSpec::required("months", "Extension length")
                        .rule(Rule::Integer)
                        .rule(Rule::Range {
                            min: 1.0,
                            max: 24.0,
                            message: "extension must be 1 to 24 months",
                        }),
                )
                .field(
                    FieldSpec::required("start_date", "Start date")
                        .rule(Rule::Date)
                        .rule(Rule::NotInPast),
                )
                .finalize(),
        )
        .build()
}
