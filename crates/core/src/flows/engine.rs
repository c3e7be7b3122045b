use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::domain::approval::{ApprovalRecord, FIRST_APPROVAL_LEVEL};
use crate::domain::department::DepartmentTable;
use crate::domain::invoice::{InvoiceDetails, InvoiceId};
use crate::downstream::DownstreamApprover;
use crate::errors::{ApprovalError, MissingRecord};
use crate::flows::states::{Assignment, Escalation, WorkflowState};
use crate::flows::store::ApprovalStore;
use crate::routing::{Classifier, RoutingMode};

#[derive(Clone, Debug, Default)]
pub struct EngineOptions {
    pub departments: DepartmentTable,
    pub routing: RoutingMode,
}

/// Drives invoices through department assignment and supervisor escalation.
///
/// Operations run their store round-trips strictly one after another. Nothing
/// guards against two callers assigning work to the same employee at once;
/// the workload counter is only as consistent as the store's transactions.
pub struct ApprovalEngine {
    store: Arc<dyn ApprovalStore>,
    classifier: Arc<dyn Classifier>,
    downstream: Arc<dyn DownstreamApprover>,
    options: EngineOptions,
}

impl ApprovalEngine {
    pub fn new(
        store: Arc<dyn ApprovalStore>,
        classifier: Arc<dyn Classifier>,
        downstream: Arc<dyn DownstreamApprover>,
        options: EngineOptions,
    ) -> Self {
        Self { store, classifier, downstream, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Reads the scanned invoice and decides its department. Never writes.
    pub async fn invoice_details(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<InvoiceDetails, ApprovalError> {
        let result = self.load_invoice_details(invoice_id).await;
        if let Err(error) = &result {
            log_failure("approval.details.failed", invoice_id, error);
        }
        result
    }

    /// Assigns the invoice to the least-loaded employee of the required rank
    /// at level 1. Calling it twice assigns the invoice twice.
    pub async fn process_department_approval(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Assignment, ApprovalError> {
        let result = self.assign(invoice_id).await;
        if let Err(error) = &result {
            log_failure("approval.assign.failed", invoice_id, error);
        }
        result
    }

    /// Signs off the current level and moves the invoice to the approver's
    /// supervisor, or hands it downstream once the final level is done.
    pub async fn escalate_approval(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Escalation, ApprovalError> {
        let result = self.escalate(invoice_id).await;
        if let Err(error) = &result {
            log_failure("approval.escalate.failed", invoice_id, error);
        }
        result
    }

    pub async fn workflow_state(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<WorkflowState, ApprovalError> {
        self.store.ensure_connected().await?;
        let latest = self.store.latest_approval(invoice_id).await?;
        Ok(WorkflowState::from_latest(latest.as_ref()))
    }

    async fn load_invoice_details(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<InvoiceDetails, ApprovalError> {
        let payload = self
            .store
            .find_invoice(invoice_id)
            .await?
            .and_then(|record| record.scanned_data)
            .ok_or_else(|| MissingRecord::Invoice(invoice_id.clone()))?;

        let scanned = payload
            .parse()
            .map_err(|source| ApprovalError::Parse { invoice_id: invoice_id.clone(), source })?;

        let departments = &self.options.departments;
        let response = self.classifier.classify(&scanned.items, departments).await?;
        let department = self.options.routing.resolve(&response, departments)?;

        if let RoutingMode::Pinned(pinned) = self.options.routing {
            // The model's answer is not trusted for routing yet; see DESIGN.md.
            debug!(
                event_name = "approval.details.classifier_ignored",
                invoice_id = %invoice_id,
                classifier_response = response.trim(),
                pinned_department = pinned.0,
                "classifier response ignored by pinned routing"
            );
        }

        Ok(InvoiceDetails {
            invoice_id: invoice_id.clone(),
            total_amount: scanned.total,
            department,
            items: scanned.items,
        })
    }

    async fn assign(&self, invoice_id: &InvoiceId) -> Result<Assignment, ApprovalError> {
        self.store.ensure_connected().await?;

        let details = self.load_invoice_details(invoice_id).await?;
        let category = self.options.departments.category(details.department)?.to_string();

        let threshold = self
            .store
            .find_threshold(&category, details.total_amount)
            .await?
            .ok_or_else(|| MissingRecord::Threshold {
                category: category.clone(),
                amount: details.total_amount.to_string(),
            })?;

        let approver = self
            .store
            .find_least_loaded_employee(threshold.min_rank_req)
            .await?
            .ok_or(MissingRecord::Approver(threshold.min_rank_req))?;

        let approval =
            ApprovalRecord::open(invoice_id.clone(), approver.id, FIRST_APPROVAL_LEVEL, &category);
        self.store.open_approval(&approval).await?;

        info!(
            event_name = "approval.assign.completed",
            invoice_id = %invoice_id,
            approver_id = approver.id.0,
            approval_id = %approval.id,
            category = category.as_str(),
            level = approval.level,
            "invoice assigned to department approver"
        );

        Ok(Assignment {
            invoice_id: invoice_id.clone(),
            approval_id: approval.id,
            approver: approver.id,
            level: approval.level,
            category,
            total_amount: details.total_amount,
        })
    }

    async fn escalate(&self, invoice_id: &InvoiceId) -> Result<Escalation, ApprovalError> {
        self.store.ensure_connected().await?;

        let latest = self.store.latest_approval(invoice_id).await?;
        match (WorkflowState::from_latest(latest.as_ref()), latest) {
            (WorkflowState::Pending { .. }, Some(current)) => {
                // Releasing the final level marks the invoice done, so every read the
                // downstream hand-off needs happens first.
                let purchase_order_number = if current.is_final_level() {
                    Some(self.purchase_order_number(invoice_id).await?)
                } else {
                    None
                };

                self.store.release_approval(&current, Utc::now()).await?;
                info!(
                    event_name = "approval.escalate.released",
                    invoice_id = %invoice_id,
                    approver_id = current.approver.0,
                    level = current.level,
                    "approval level signed off"
                );

                match purchase_order_number {
                    Some(purchase_order_number) => {
                        Ok(self.complete(invoice_id, &current, purchase_order_number).await)
                    }
                    None => self.hand_to_supervisor(invoice_id, &current).await,
                }
            }
            (WorkflowState::Stalled { .. }, Some(current)) => {
                info!(
                    event_name = "approval.escalate.resumed",
                    invoice_id = %invoice_id,
                    approver_id = current.approver.0,
                    level = current.level,
                    "retrying escalation of stalled invoice"
                );
                self.hand_to_supervisor(invoice_id, &current).await
            }
            (WorkflowState::Done, _) => Err(ApprovalError::AlreadyCompleted(invoice_id.clone())),
            (WorkflowState::New, _) | (_, None) => {
                Err(MissingRecord::Approval(invoice_id.clone()).into())
            }
        }
    }

    async fn purchase_order_number(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Option<String>, ApprovalError> {
        let invoice = self
            .store
            .find_invoice(invoice_id)
            .await?
            .ok_or_else(|| MissingRecord::Invoice(invoice_id.clone()))?;
        Ok(invoice.purchase_order_number)
    }

    async fn complete(
        &self,
        invoice_id: &InvoiceId,
        current: &ApprovalRecord,
        purchase_order_number: Option<String>,
    ) -> Escalation {
        let notified = match self
            .downstream
            .approve_pending_invoice(invoice_id, purchase_order_number.as_deref())
            .await
        {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    event_name = "approval.downstream.failed",
                    invoice_id = %invoice_id,
                    error = %error,
                    "downstream approver did not accept invoice"
                );
                false
            }
        };

        info!(
            event_name = "approval.escalate.completed",
            invoice_id = %invoice_id,
            approver_id = current.approver.0,
            notified,
            "all approval levels completed"
        );

        Escalation::Completed { approver: current.approver, purchase_order_number, notified }
    }

    async fn hand_to_supervisor(
        &self,
        invoice_id: &InvoiceId,
        current: &ApprovalRecord,
    ) -> Result<Escalation, ApprovalError> {
        let supervisor_id = self
            .store
            .find_employee(current.approver)
            .await?
            .and_then(|employee| employee.supervisor_id);
        let supervisor = match supervisor_id {
            Some(id) => self.store.find_employee(id).await?,
            None => None,
        };

        let Some(supervisor) = supervisor else {
            warn!(
                event_name = "approval.escalate.stalled",
                invoice_id = %invoice_id,
                approver_id = current.approver.0,
                level = current.level,
                "approver has no supervisor; invoice stalled"
            );
            return Err(MissingRecord::Supervisor(current.approver).into());
        };

        let category = supervisor.department.clone().unwrap_or_else(|| current.category.clone());
        let approval =
            ApprovalRecord::open(invoice_id.clone(), supervisor.id, current.level + 1, category);
        self.store.open_approval(&approval).await?;

        info!(
            event_name = "approval.escalate.completed",
            invoice_id = %invoice_id,
            from_approver_id = current.approver.0,
            approver_id = supervisor.id.0,
            level = approval.level,
            "invoice escalated to supervisor"
        );

        Ok(Escalation::Escalated {
            from: current.approver,
            to: supervisor.id,
            level: approval.level,
            approval_id: approval.id,
        })
    }
}

fn log_failure(event_name: &str, invoice_id: &InvoiceId, failure: &ApprovalError) {
    match failure {
        ApprovalError::Connection(_) | ApprovalError::Persistence(_) => error!(
            event_name,
            invoice_id = %invoice_id,
            error_class = failure.class(),
            error = %failure,
            "approval operation aborted"
        ),
        _ => warn!(
            event_name,
            invoice_id = %invoice_id,
            error_class = failure.class(),
            error = %failure,
            "approval operation aborted"
        ),
    }
}
