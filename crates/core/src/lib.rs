pub mod config;
pub mod domain;
pub mod downstream;
pub mod errors;
pub mod flows;
pub mod routing;

pub use domain::approval::{ApprovalId, ApprovalRecord, FINAL_APPROVAL_LEVEL, FIRST_APPROVAL_LEVEL};
pub use domain::department::{DepartmentCode, DepartmentTable};
pub use domain::employee::{Employee, EmployeeId};
pub use domain::invoice::{InvoiceDetails, InvoiceId, InvoiceRecord, ScannedPayload};
pub use domain::threshold::Threshold;
pub use downstream::{DownstreamApprover, DownstreamError, LogOnlyApprover};
pub use errors::{ApprovalError, MissingRecord};
pub use flows::{
    ApprovalEngine, ApprovalStore, Assignment, EngineOptions, Escalation, StoreError,
    WorkflowState,
};
pub use routing::{Classifier, ClassifierError, RoutingMode};
