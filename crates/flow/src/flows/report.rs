use std::sync::Arc;

use shared::domain::FlowKind;

use crate::{
    definition::{DefinitionError, FlowDefinition, StepDefinition, StepId},
    remote::CommitOperation,
    validate::{FieldSpec, OptionSet, OptionTable, Rule},
};

pub const CATEGORY: StepId = StepId("category");
pub const REASON: StepId = StepId("reason");
pub const DETAILS: StepId = StepId("details");

pub static PROFILE_REASONS: OptionTable = OptionTable {
    driver: "category",
    sets: &[
        OptionSet {
            key: "Scam",
            copy: "How did this user try to mislead you?",
            options: &[
                "Asked for payment outside the app",
                "Fake identity",
                "Requested personal financial details",
            ],
        },
        OptionSet {
            key: "Harassment",
            copy: "What kind of behavior did you experience?",
            options: &["Threats", "Offensive messages", "Repeated unwanted contact"],
        },
        OptionSet {
            key: "Impersonation",
            copy: "Who is this user pretending to be?",
            options: &["Pretending to be me", "Pretending to be someone I know", "Pretending to be staff"],
        },
        OptionSet {
            key: "Inappropriate content",
            copy: "Where did you see it?",
            options: &["Profile photo", "Profile name", "Messages"],
        },
    ],
};

pub static PROPERTY_REASONS: OptionTable = OptionTable {
    driver: "category",
    sets: &[
        OptionSet {
            key: "Misleading listing",
            copy: "What does not match the listing?",
            options: &["Photos", "Price", "Location", "Amenities"],
        },
        OptionSet {
            key: "Safety hazard",
            copy: "What safety issue did you notice?",
            options: &["Fire hazard", "Structural damage", "Unsafe neighborhood", "No emergency exits"],
        },
        OptionSet {
            key: "Unavailable property",
            copy: "What happened when you tried to rent it?",
            options: &["Already occupied", "Owner unreachable", "Property does not exist"],
        },
        OptionSet {
            key: "Pricing issue",
            copy: "Tell us about the charges.",
            options: &["Hidden fees", "Price changed after inquiry", "Deposit not as listed"],
        },
    ],
};

pub(super) fn profile() -> Result<Arc<FlowDefinition>, DefinitionError> {
    definition(
        FlowKind::ReportProfile,
        CommitOperation::SubmitProfileReport,
        &PROFILE_REASONS,
    )
}

pub(super) fn property() -> Result<Arc<FlowDefinition>, DefinitionError> {
    definition(
        FlowKind::ReportProperty,
        CommitOperation::SubmitPropertyReport,
        &PROPERTY_REASONS,
    )
}

fn definition(
    kind: FlowKind,
    operation: CommitOperation,
    reasons: &'static OptionTable,
) -> Result<Arc<FlowDefinition>, DefinitionError> {
    FlowDefinition::builder(kind, operation)
        .seeded("target_id")
        .step(
            StepDefinition::new(CATEGORY, "What is the problem?")
                .field(FieldSpec::required("category", "Category").rule(Rule::OptionKey(reasons)))
                .goto(REASON),
        )
        .step(
            StepDefinition::new(REASON, "Tell us more")
                .field(FieldSpec::required("reason", "reason").rule(Rule::FromOptions(reasons)))
                .options(reasons)
                .goto(DETAILS),
        )
        .step(
            StepDefinition::new(DETAILS, "Anything else?")
                .field(
                    FieldSpec::required("description", "Description")
                        .rule(Rule::Length { min: 10, max: 500 }),
                )
                .field(
                    FieldSpec::optional("evidence_url", "Screenshot link")
                        .rule(Rule::Length { min: 0, max: 500 }),
                )
                .finalize(),
        )
        .build()
}
