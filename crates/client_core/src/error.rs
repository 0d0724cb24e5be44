use flow::{DispatchError, FlowError};
use shared::domain::FlowKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("no flow registered for {0}")]
    UnknownFlow(FlowKind),
    #[error("none of the viewer's properties has usable coordinates")]
    NoNearbyProperty,
    #[error("{context}: {source}")]
    Store {
        context: String,
        source: anyhow::Error,
    },
}

impl ClientError {
    pub(crate) fn store(context: impl Into<String>, source: anyhow::Error) -> Self {
        ClientError::Store {
            context: context.into(),
            source,
        }
    }
}
