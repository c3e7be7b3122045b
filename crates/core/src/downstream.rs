use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::invoice::InvoiceId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DownstreamError {
    #[error("downstream request failed: {0}")]
    Transport(String),
    #[error("downstream rejected invoice with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Receives invoices once every approval level has signed off.
#[async_trait]
pub trait DownstreamApprover: Send + Sync {
    async fn approve_pending_invoice(
        &self,
        invoice_id: &InvoiceId,
        purchase_order_number: Option<&str>,
    ) -> Result<(), DownstreamError>;
}

/// Used when no downstream endpoint is configured.
#[derive(Clone, Debug, Default)]
pub struct LogOnlyApprover;

#[async_trait]
impl DownstreamApprover for LogOnlyApprover {
    async fn approve_pending_invoice(
        &self,
        invoice_id: &InvoiceId,
        purchase_order_number: Option<&str>,
    ) -> Result<(), DownstreamError> {
        info!(
            event_name = "downstream.approve.logged",
            invoice_id = %invoice_id,
            purchase_order_number = purchase_order_number.unwrap_or("unknown"),
            "no downstream approver configured; approval recorded in logs only"
        );
        Ok(())
    }
}
