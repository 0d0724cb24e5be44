use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

pub const PERSONAL_INFO: StepId = StepId("personal_info");
pub const CONTACT: StepId = StepId("contact");
pub const ACCOUNT_TYPE: StepId = StepId("account_type");
pub const OWNER_DOCUMENTS: StepId = StepId("owner_documents");
pub const TERMS: StepId = StepId("terms");

pub const MINIMUM_AGE: u32 = 18;

const NAME: Rule = Rule::Length { min: 1, max: 50 };

pub(super) fn definition() -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .step(
            StepDefinition::new(PERSONAL_INFO, "Tell us about yourself")
                .field(
                    FieldSpec::required("first_name", "First name")
                        .rule(NAME)
                        .rule(Rule::PersonName),
                )
                .field(
                    FieldSpec::required("last_name", "Last name")
                        .rule(NAME)
                        .rule(Rule::PersonName),
                )
                .field(
                    FieldSpec::required("birthdate", "Birthdate")
                        .rule(Rule::Date)
                        .rule(Rule::MinimumAge(MINIMUM_AGE)),
                )
                .goto(CONTACT),
        )
        .step(
            StepDefinition::new(CONTACT, "How can we reach you?")
                .field(FieldSpec::required("email", "Email").rule(Rule::Email))
                .field(FieldSpec::required("phone", "Mobile number").rule(Rule::MobileNumber))
                .goto(ACCOUNT_TYPE),
        )
        .step(
            StepDefinition::new(ACCOUNT_TYPE, "Account type")
                .field(
                    FieldSpec::required("role", "Account type")
                        .rule(Rule::OneOf(&["Tenant", "Owner"])),
                )
                .branch_on("role", &["Owner"], OWNER_DOCUMENTS, TERMS),
        )
        .step(
            StepDefinition::new(OWNER_DOCUMENTS, "Verify your identity")
                .field(FieldSpec::required("government_id_type", "ID type").rule(Rule::OneOf(&[
                    "Passport",
                    "Driver's License",
                    "UMID",
                    "PhilSys ID",
                ])))
                .field(
                    FieldSpec::required("government_id_number", "ID number")
                        .rule(Rule::Length { min: 5, max: 30 }),
                )
                .goto(TERMS),
        )
        .step(
            StepDefinition::new(TERMS, "Terms of service")
                .field(FieldSpec::required("accept_terms", "Terms of service").rule(Rule::Accepted))
                .field(FieldSpec::required("accept_privacy", "Privacy notice").rule(Rule::Accepted))
                .finalize(),
        )
        .build()
}
