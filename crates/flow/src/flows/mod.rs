//! Concrete flow tables for the rental client.

use std::{collections::HashMap, sync::Arc};

use shared::domain::FlowKind;

use crate::definition::{DefinitionError, FlowDefinition};

pub mod extension;
pub mod maintenance;
pub mod property;
pub mod report;
pub mod signup;
pub mod termination;
pub mod upgrade;

pub fn definition(kind: FlowKind) -> Result<Arc<FlowDefinition>, DefinitionError> {
    match kind {
        FlowKind::AddProperty => property::add(),
        FlowKind::EditProperty => property::edit(),
        FlowKind::SignUp => signup::definition(),
        FlowKind::ReportProfile => report::profile(),
        FlowKind::ReportProperty => report::property(),
        FlowKind::LeaseTermination => termination::definition(),
        FlowKind::LeaseExtension => extension::definition(),
        FlowKind::OwnerUpgrade => upgrade::definition(),
        FlowKind::MaintenanceRequest => maintenance::definition(),
    }
}

/// Every flow the client can run, built and checked once at startup.
#[derive(Clone)]
pub struct FlowCatalog {
    flows: HashMap<FlowKind, Arc<FlowDefinition>>,
}

impl FlowCatalog {
    pub fn standard() -> Result<Self, DefinitionError> {
        let flows = FlowKind::ALL
            .into_iter()
            .map(|kind| definition(kind).map(|flow| (kind, flow)))
            .collect::<Result<_, _>>()?;
        Ok(Self { flows })
    }

    pub fn get(&self, kind: FlowKind) -> Option<Arc<FlowDefinition>> {
        self.flows.get(&kind).cloned()
    }
}

#[cfg(test)]
#[path = "../tests/flows_tests.rs"]
mod tests;
