use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowBuilder, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, Rule},
};

pub const BASICS: StepId = StepId("basics");
pub const LOCATION: StepId = StepId("location");
pub const RENTAL_DETAILS: StepId = StepId("rental_details");
pub const UTILITY_FEES: StepId = StepId("utility_fees");
pub const TERMS_AND_CONDITIONS: StepId = StepId("terms_and_conditions");

pub const PROPERTY_TYPES: &[&str] = &["Apartment", "House", "Condominium", "Dorm", "Bedspace"];

/// Shared-room listings bill utilities on top of rent.
const SHARED_ROOM_TYPES: &[&str] = &["Dorm", "Bedspace"];

pub const RENT: Rule = Rule::Range {
    min: 2_000.0,
    max: 100_000.0,
    message: "min ₱2,000 - max ₱100,000",
};

const DEPOSIT: Rule = Rule::Range {
    min: 0.0,
    max: 200_000.0,
    message: "min ₱0 - max ₱200,000",
};

const UTILITY_FEE: Rule = Rule::Range {
    min: 0.0,
    max: 10_000.0,
    message: "min ₱0 - max ₱10,000",
};

pub(super) fn add() -> Result<Arc<FlowDefinition>, DefinitionError> {
    steps(FlowDefinition::builder(
        FlowKind::AddProperty,
        CommitOperation::CreateProperty,
    ))
    .build()
}

pub(super) fn edit() -> Result<Arc<FlowDefinition>, DefinitionError> {
    steps(
        FlowDefinition::builder(FlowKind::EditProperty, CommitOperation::UpdateProperty)
            .seeded("property_id"),
    )
    .build()
}

fn steps(builder: FlowBuilder) -> FlowBuilder {
    builder
        .step(
            StepDefinition::new(BASICS, "About the property")
                .field(
                    FieldSpec::required("property_name", "Property name")
                        .rule(Rule::Length { min: 3, max: 80 }),
                )
                .field(
                    FieldSpec::required("property_type", "Property type")
                        .rule(Rule::OneOf(PROPERTY_TYPES)),
                )
                .field(
                    FieldSpec::required("address", "Address")
                        .rule(Rule::Length { min: 5, max: 200 }),
                )
                .field(
                    FieldSpec::optional("description", "Description")
                        .rule(Rule::Length { min: 0, max: 1000 }),
                )
                .goto(LOCATION),
        )
        .step(
            StepDefinition::new(LOCATION, "Pin the location")
                .field(FieldSpec::required("latitude", "Latitude").rule(Rule::Range {
                    min: -90.0,
                    max: 90.0,
                    message: "latitude must be between -90 and 90",
                }))
                .field(FieldSpec::required("longitude", "Longitude").rule(Rule::Range {
                    min: -180.0,
                    max: 180.0,
                    message: "longitude must be between -180 and 180",
                }))
                .goto(RENTAL_DETAILS),
        )
        .step(
            StepDefinition::new(RENTAL_DETAILS, "Rental details")
                .field(FieldSpec::required("rent", "Monthly rent").rule(RENT))
                .field(FieldSpec::optional("deposit", "Security deposit").rule(DEPOSIT))
                .field(
                    FieldSpec::required("max_occupants", "Maximum occupants")
                        .rule(Rule::Integer)
                        .rule(Rule::Range {
                            min: 1.0,
                            max: 50.0,
                            message: "occupants must be between 1 and 50",
                        }),
                )
                .branch_on(
                    "property_type",
                    SHARED_ROOM_TYPES,
                    UTILITY_FEES,
                    TERMS_AND_CONDITIONS,
                ),
        )
        .step(
            StepDefinition::new(UTILITY_FEES, "Utility fees")
                .field(FieldSpec::required("electricity_fee", "Electricity fee").rule(UTILITY_FEE))
                .field(FieldSpec::required("water_fee", "Water fee").rule(UTILITY_FEE))
                .goto(TERMS_AND_CONDITIONS),
        )
        .step(
            StepDefinition::new(TERMS_AND_CONDITIONS, "Terms and conditions")
                .field(
                    FieldSpec::optional("house_rules", "House rules")
                        .rule(Rule::Length { min: 0, max: 2000 }),
                )
                .field(FieldSpec::required("accept_terms", "Listing terms").rule(Rule::Accepted))
                .finalize(),
        )
}
