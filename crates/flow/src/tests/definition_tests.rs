use super::*;

const A: StepId = StepId("a");
const B: StepId = StepId("b");
const C: StepId = StepId("c");

fn state(pairs: &[(&str, &str)]) -> FlowState {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn rejects_targets_outside_the_table() {
    let err = FlowDefinition::builder(FlowKind::OwnerUpgrade, CommitOperation::SubmitUpgradeRequest)
        .step(StepDefinition::new(A, "A").goto(C))
        .step(StepDefinition::new(B, "B"))
        .build()
        .expect_err("c is undefined");
    assert_eq!(
        err,
        DefinitionError::UnknownTarget {
            flow: FlowKind::OwnerUpgrade,
            from: A,
            to: C
        }
    );
}

#[test]
fn rejects_duplicate_and_empty_tables() {
    let err = FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .step(StepDefinition::new(A, "A"))
        .step(StepDefinition::new(A, "A again"))
        .build()
        .expect_err("duplicate");
    assert!(matches!(err, DefinitionError::DuplicateStep { step, .. } if step == A));

    let err = FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .build()
        .expect_err("empty");
    assert_eq!(err, DefinitionError::Empty { flow: FlowKind::SignUp });
}

#[test]
fn branch_falls_back_to_otherwise() {
    let flow = FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .step(StepDefinition::new(A, "A").branch_on("role", &["Owner"], B, C))
        .step(StepDefinition::new(B, "B").goto(C))
        .step(StepDefinition::new(C, "C").finalize())
        .build()
        .expect("flow");

    assert_eq!(
        flow.next(A, &state(&[("role", "owner")])).expect("next"),
        Transition::Step(B)
    );
    assert_eq!(
        flow.next(A, &state(&[("role", "Tenant")])).expect("next"),
        Transition::Step(C)
    );
    assert_eq!(flow.next(A, &state(&[])).expect("next"), Transition::Step(C));
    assert_eq!(flow.path(&state(&[("role", "Owner")])).expect("path"), vec![A, B, C]);
    assert_eq!(flow.path(&state(&[])).expect("path"), vec![A, C]);
}

#[test]
fn path_detects_cycles() {
    let flow = FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .step(StepDefinition::new(A, "A").goto(B))
        .step(StepDefinition::new(B, "B").goto(A))
        .build()
        .expect("table itself is well formed");
    assert_eq!(
        flow.path(&state(&[])).expect_err("cycle"),
        DefinitionError::Cycle {
            flow: FlowKind::SignUp,
            step: A
        }
    );
}

#[test]
fn unknown_current_step_is_an_error() {
    let flow = FlowDefinition::builder(FlowKind::SignUp, CommitOperation::RegisterAccount)
        .step(StepDefinition::new(A, "A"))
        .build()
        .expect("flow");
    assert!(matches!(
        flow.next(StepId("zzz"), &state(&[])),
        Err(DefinitionError::UnknownStep { .. })
    ));
    assert_eq!(flow.step_named("a"), Some(A));
    assert_eq!(flow.step_named("b"), None);
}
