use thiserror::Error;

use crate::domain::department::DepartmentError;
use crate::domain::employee::EmployeeId;
use crate::domain::invoice::{InvoiceId, PayloadError};
use crate::flows::store::StoreError;
use crate::routing::ClassifierError;

/// Reference data or workflow rows an operation needed but could not find.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MissingRecord {
    #[error("invoice {0} was not found or has no scanned data")]
    Invoice(InvoiceId),
    #[error("no threshold in category `{category}` covers amount {amount}")]
    Threshold { category: String, amount: String },
    #[error("no employee holds required rank {0}")]
    Approver(i64),
    #[error("employee {0} has no supervisor configured")]
    Supervisor(EmployeeId),
    #[error("invoice {0} has no approval to escalate")]
    Approval(InvoiceId),
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("store unavailable: {0}")]
    Connection(String),
    #[error("not found: {0}")]
    NotFound(#[from] MissingRecord),
    #[error("invoice {invoice_id} payload could not be parsed: {source}")]
    Parse {
        invoice_id: InvoiceId,
        #[source]
        source: PayloadError,
    },
    #[error("department classification failed: {0}")]
    Classification(String),
    #[error("invoice {0} has already completed every approval level")]
    AlreadyCompleted(InvoiceId),
    #[error("concurrent update rejected: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApprovalError {
    /// Stable machine-readable class used by operator tooling.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::NotFound(MissingRecord::Invoice(_)) => "invoice_not_found",
            Self::NotFound(MissingRecord::Threshold { .. }) => "threshold_not_found",
            Self::NotFound(MissingRecord::Approver(_)) => "approver_not_found",
            Self::NotFound(MissingRecord::Supervisor(_)) => "supervisor_not_found",
            Self::NotFound(MissingRecord::Approval(_)) => "approval_not_found",
            Self::Parse { .. } => "parse",
            Self::Classification(_) => "classification",
            Self::AlreadyCompleted(_) => "already_completed",
            Self::Conflict(_) => "conflict",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for ApprovalError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Connection(message) => Self::Connection(message),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Database(message) | StoreError::Decode(message) => {
                Self::Persistence(message)
            }
        }
    }
}

impl From<ClassifierError> for ApprovalError {
    fn from(value: ClassifierError) -> Self {
        Self::Classification(value.to_string())
    }
}

impl From<DepartmentError> for ApprovalError {
    fn from(value: DepartmentError) -> Self {
        Self::Classification(value.to_string())
    }
}
