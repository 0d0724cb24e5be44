//! Dialogs shown for the notification types the backend emits.

use shared::{
    domain::{FlowKind, Role},
    event::{
        ActionColor, ActionKind, DialogAction, DialogDescriptor, EventStatus, EventType,
        NavTarget, Screen,
    },
};

use crate::dispatch::{DispatchTable, ACKNOWLEDGE_LABEL};

fn dialog(title: &str, message: &str, actions: Vec<DialogAction>) -> DialogDescriptor {
    DialogDescriptor {
        title: title.to_string(),
        message: message.to_string(),
        actions,
    }
}

fn action(label: &str, color: ActionColor, kind: ActionKind) -> DialogAction {
    DialogAction {
        label: label.to_string(),
        color,
        kind,
    }
}

fn ok() -> DialogAction {
    action(ACKNOWLEDGE_LABEL, ActionColor::Primary, ActionKind::Close)
}

fn later() -> DialogAction {
    action("Later", ActionColor::Secondary, ActionKind::Close)
}

fn open_screen(label: &str, screen: Screen) -> DialogAction {
    action(
        label,
        ActionColor::Primary,
        ActionKind::Navigate(NavTarget::Screen(screen)),
    )
}

fn start_flow(label: &str, color: ActionColor, kind: FlowKind) -> DialogAction {
    action(
        label,
        color,
        ActionKind::ConfirmAndNavigate(NavTarget::Flow(kind)),
    )
}

pub fn standard_table() -> DispatchTable {
    use EventStatus::*;
    use EventType::*;

    DispatchTable::new()
        // lease extension
        .with(
            LeaseExtension,
            Pending,
            Some(Role::Owner),
            dialog(
                "Lease extension request",
                "Your tenant asked to extend lease {lease_id}.",
                vec![open_screen("Review", Screen::ExtensionReview), later()],
            ),
        )
        .with(
            LeaseExtension,
            Pending,
            Some(Role::Tenant),
            dialog(
                "Extension requested",
                "Your request was sent. We'll let you know once your landlord responds.",
                vec![ok()],
            ),
        )
        .with(
            LeaseExtension,
            Approved,
            Some(Role::Tenant),
            dialog(
                "Lease extension approved",
                "Your landlord approved the extension of lease {lease_id}.",
                vec![open_screen("View lease", Screen::LeaseView), later()],
            ),
        )
        .with(
            LeaseExtension,
            Approved,
            Some(Role::Owner),
            dialog(
                "Set the new rent",
                "You approved extending lease {lease_id}. Set the rent for the extended term.",
                vec![
                    start_flow("Set rent", ActionColor::Success, FlowKind::LeaseExtension),
                    later(),
                ],
            ),
        )
        .with(
            LeaseExtension,
            Rejected,
            None,
            dialog(
                "Lease extension declined",
                "{message}",
                vec![open_screen("View lease", Screen::LeaseView), ok()],
            ),
        )
        // feedback
        .with(
            FeedbackUpa,
            Pending,
            None,
            dialog("Thanks for your feedback", "{message}", vec![ok()]),
        )
        .with(
            FeedbackPropertyOwner,
            Pending,
            Some(Role::Owner),
            dialog(
                "New feedback on your property",
                "{message}",
                vec![open_screen("View listing", Screen::PropertyListing), later()],
            ),
        )
        .with(
            FeedbackPropertyOwner,
            Pending,
            None,
            dialog("Feedback sent", "{message}", vec![ok()]),
        )
        // registration
        .with(
            AccountRegistration,
            Pending,
            None,
            dialog(
                "Registration received",
                "We're reviewing your account. This usually takes a day.",
                vec![ok()],
            ),
        )
        .with(
            AccountRegistration,
            Approved,
            None,
            dialog(
                "Welcome aboard",
                "Your account is verified. Start browsing rentals.",
                vec![open_screen("Get started", Screen::TenantDashboard)],
            ),
        )
        .with(
            AccountRegistration,
            Rejected,
            None,
            dialog(
                "Registration not approved",
                "{message}",
                vec![start_flow("Sign up again", ActionColor::Primary, FlowKind::SignUp), ok()],
            ),
        )
        .with(
            AccountRegistrationOwner,
            Pending,
            None,
            dialog(
                "Owner application received",
                "We're reviewing your business documents.",
                vec![ok()],
            ),
        )
        .with(
            AccountRegistrationOwner,
            Approved,
            None,
            dialog(
                "You're now a property owner",
                "List your first property from the owner dashboard.",
                vec![
                    open_screen("Open dashboard", Screen::OwnerDashboard),
                    start_flow("Add property", ActionColor::Success, FlowKind::AddProperty),
                ],
            ),
        )
        .with(
            AccountRegistrationOwner,
            Rejected,
            None,
            dialog(
                "Owner application declined",
                "{message}",
                vec![
                    start_flow("Apply again", ActionColor::Primary, FlowKind::OwnerUpgrade),
                    ok(),
                ],
            ),
        )
        // termination
        .with(
            LeaseTermination,
            Pending,
            Some(Role::Owner),
            dialog(
                "Termination request",
                "Your tenant wants to end lease {lease_id}.",
                vec![open_screen("Review", Screen::TerminationStatus), later()],
            ),
        )
        .with(
            LeaseTermination,
            Pending,
            Some(Role::Tenant),
            dialog(
                "Termination requested",
                "Your landlord will review your request.",
                vec![ok()],
            ),
        )
        .with(
            LeaseTermination,
            Approved,
            None,
            dialog(
                "Lease termination approved",
                "{message}",
                vec![open_screen("View details", Screen::TerminationStatus), ok()],
            ),
        )
        .with(
            LeaseTermination,
            Rejected,
            None,
            dialog(
                "Lease termination declined",
                "{message}",
                vec![open_screen("View details", Screen::TerminationStatus), ok()],
            ),
        )
        // maintenance
        .with(
            MaintenanceRequest,
            Pending,
            Some(Role::Owner),
            dialog(
                "New maintenance request",
                "{message}",
                vec![open_screen("View request", Screen::MaintenanceStatus), later()],
            ),
        )
        .with(
            MaintenanceRequest,
            Pending,
            Some(Role::Tenant),
            dialog(
                "Maintenance request sent",
                "Your landlord has been notified.",
                vec![ok()],
            ),
        )
        .with(
            MaintenanceRequest,
            Urgent,
            None,
            dialog(
                "Urgent maintenance",
                "{message}",
                vec![
                    action(
                        "View now",
                        ActionColor::Danger,
                        ActionKind::Navigate(NavTarget::Screen(Screen::MaintenanceStatus)),
                    ),
                    later(),
                ],
            ),
        )
        .with(
            MaintenanceRequest,
            Important,
            None,
            dialog(
                "Maintenance update",
                "{message}",
                vec![open_screen("View request", Screen::MaintenanceStatus), later()],
            ),
        )
        .with(
            MaintenanceRequest,
            Success,
            None,
            dialog("Maintenance completed", "{message}", vec![ok()]),
        )
        // reports
        .with(
            Report,
            Pending,
            None,
            dialog(
                "Report received",
                "Thanks for keeping the community safe. We'll review it shortly.",
                vec![ok()],
            ),
        )
        .with(
            Report,
            Success,
            None,
            dialog(
                "Report resolved",
                "{message}",
                vec![open_screen("View report", Screen::ReportStatus), ok()],
            ),
        )
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
