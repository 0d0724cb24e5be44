pub mod controller;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod finalizer;
pub mod flows;
pub mod geo;
pub mod notifications;
pub mod remote;
pub mod store;
pub mod validate;

pub use controller::{StepController, StepView, WriterRegistry};
pub use definition::{FlowDefinition, StepDefinition, StepId, Transition};
pub use dispatch::{DialogOutcome, DispatchTable, EventDispatcher, OpenDialog};
pub use error::{AggregationError, DispatchError, FlowError};
pub use feed::{EventFeed, MemoryEventFeed};
pub use finalizer::{Confirmation, Finalizer};
pub use flows::FlowCatalog;
pub use remote::{CommitOperation, RemoteCommitError, RemoteCommitter};
pub use store::{FlowState, MemoryStepStore, StepStore};
