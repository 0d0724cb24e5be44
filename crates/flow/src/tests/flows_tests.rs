use super::*;
use crate::{
    definition::{StepId, Transition},
    remote::CommitOperation,
    store::FlowState,
};

fn state(pairs: &[(&str, &str)]) -> FlowState {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn catalog_holds_every_flow_kind() {
    let catalog = FlowCatalog::standard().expect("catalog");
    for kind in FlowKind::ALL {
        let flow = catalog.get(kind).expect("flow for kind");
        assert_eq!(flow.kind(), kind);
        assert!(!flow.steps().is_empty());
    }
}

#[test]
fn add_and_edit_share_steps_but_not_operations() {
    let add = definition(FlowKind::AddProperty).expect("add");
    let edit = definition(FlowKind::EditProperty).expect("edit");

    let ids = |flow: &FlowDefinition| flow.steps().iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(ids(&add), ids(&edit));
    assert_eq!(add.operation(), CommitOperation::CreateProperty);
    assert_eq!(edit.operation(), CommitOperation::UpdateProperty);
    assert!(add.seeded_fields().is_empty());
    assert_eq!(edit.seeded_fields(), &["property_id"]);
}

#[test]
fn shared_room_types_take_the_utility_fee_detour() {
    let flow = definition(FlowKind::AddProperty).expect("flow");

    for kind in ["Dorm", "Bedspace"] {
        let draft = state(&[("property_type", kind)]);
        assert_eq!(
            flow.next(property::RENTAL_DETAILS, &draft).expect("next"),
            Transition::Step(property::UTILITY_FEES)
        );
    }
    for kind in ["Apartment", "House", "Condominium"] {
        let draft = state(&[("property_type", kind)]);
        assert_eq!(
            flow.next(property::RENTAL_DETAILS, &draft).expect("next"),
            Transition::Step(property::TERMS_AND_CONDITIONS)
        );
    }
}

#[test]
fn next_step_depends_only_on_branch_fields() {
    let flow = definition(FlowKind::AddProperty).expect("flow");
    let sparse = state(&[("property_type", "Dorm")]);
    let noisy = state(&[
        ("property_type", "Dorm"),
        ("rent", "9000"),
        ("house_rules", "No pets"),
    ]);

    let first = flow.next(property::RENTAL_DETAILS, &sparse).expect("next");
    assert_eq!(first, flow.next(property::RENTAL_DETAILS, &sparse).expect("again"));
    assert_eq!(first, flow.next(property::RENTAL_DETAILS, &noisy).expect("noisy"));
}

#[test]
fn dorm_path_lists_every_visited_step() {
    let flow = definition(FlowKind::AddProperty).expect("flow");
    let path = flow
        .path(&state(&[("property_type", "Dorm")]))
        .expect("path");
    assert_eq!(
        path,
        vec![
            property::BASICS,
            property::LOCATION,
            property::RENTAL_DETAILS,
            property::UTILITY_FEES,
            property::TERMS_AND_CONDITIONS,
        ]
    );
}

#[test]
fn owner_sign_up_collects_documents() {
    let flow = definition(FlowKind::SignUp).expect("flow");
    assert_eq!(
        flow.next(signup::ACCOUNT_TYPE, &state(&[("role", "Owner")]))
            .expect("owner"),
        Transition::Step(signup::OWNER_DOCUMENTS)
    );
    assert_eq!(
        flow.next(signup::ACCOUNT_TYPE, &state(&[("role", "Tenant")]))
            .expect("tenant"),
        Transition::Step(signup::TERMS)
    );
}

#[test]
fn termination_asks_for_details_only_for_other() {
    let flow = definition(FlowKind::LeaseTermination).expect("flow");
    let other: Vec<StepId> = flow
        .path(&state(&[("reason", "Other")]))
        .expect("path");
    assert!(other.contains(&termination::OTHER_REASON));

    let listed = flow
        .path(&state(&[("reason", "Personal reasons")]))
        .expect("path");
    assert!(!listed.contains(&termination::OTHER_REASON));
    assert_eq!(flow.seeded_fields(), &["lease_id"]);
}

#[test]
fn lease_extension_starts_at_rent_setting() {
    let flow = definition(FlowKind::LeaseExtension).expect("flow");
    assert_eq!(flow.first_step(), extension::SET_RENT);
    assert_eq!(flow.operation(), CommitOperation::ApproveLeaseExtension);
    assert_eq!(
        flow.operation().target_field(),
        flow.seeded_fields().first().copied()
    );
}

#[test]
fn report_categories_each_have_reasons() {
    for table in [&report::PROFILE_REASONS, &report::PROPERTY_REASONS] {
        assert_eq!(table.driver, "category");
        for set in table.sets {
            assert!(!set.options.is_empty(), "{} has no reasons", set.key);
            assert!(!set.copy.is_empty());
        }
    }

    let flow = definition(FlowKind::ReportProfile).expect("flow");
    let reason = flow.step(report::REASON).expect("reason step");
    assert_eq!(reason.options, Some(&report::PROFILE_REASONS));
    assert_eq!(flow.seeded_fields(), &["target_id"]);
}
