pub mod engine;
pub mod states;
pub mod store;

pub use engine::{ApprovalEngine, EngineOptions};
pub use states::{Assignment, Escalation, WorkflowState};
pub use store::{ApprovalStore, StoreError};
