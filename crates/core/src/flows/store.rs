use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::approval::ApprovalRecord;
use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::invoice::{InvoiceId, InvoiceRecord};
use crate::domain::threshold::Threshold;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflicting update: {0}")]
    Conflict(String),
}

/// Persistence boundary of the approval workflow.
///
/// `open_approval` and `release_approval` each pair an approval-row write with
/// the matching workload change and must apply both or neither.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Verifies the backing connection, reconnecting when it was lost.
    async fn ensure_connected(&self) -> Result<(), StoreError>;

    async fn find_invoice(&self, id: &InvoiceId) -> Result<Option<InvoiceRecord>, StoreError>;

    async fn find_threshold(
        &self,
        category: &str,
        amount: Decimal,
    ) -> Result<Option<Threshold>, StoreError>;

    async fn find_least_loaded_employee(
        &self,
        role_level: i64,
    ) -> Result<Option<Employee>, StoreError>;

    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError>;

    /// Highest-level approval for the invoice, newest first on ties.
    async fn latest_approval(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Option<ApprovalRecord>, StoreError>;

    /// Inserts an open approval row and increments the approver's workload.
    async fn open_approval(&self, approval: &ApprovalRecord) -> Result<(), StoreError>;

    /// Stamps `completed_at` on an open row and decrements its approver's workload.
    /// Fails with `StoreError::Conflict` when the row was already released.
    async fn release_approval(
        &self,
        approval: &ApprovalRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
