use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalId, ApprovalRecord};
use crate::domain::employee::EmployeeId;
use crate::domain::invoice::InvoiceId;

/// Where an invoice sits in the two-level approval chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// No approval row exists yet.
    New,
    /// `approver` owns the open approval at `level`.
    Pending { level: i64, approver: EmployeeId },
    /// The approval at `level` was released but nobody above `approver` could
    /// take it over.
    Stalled { level: i64, approver: EmployeeId },
    /// Every level signed off and the invoice was handed downstream.
    Done,
}

impl WorkflowState {
    pub fn from_latest(latest: Option<&ApprovalRecord>) -> Self {
        match latest {
            None => Self::New,
            Some(record) if record.is_open() => {
                Self::Pending { level: record.level, approver: record.approver }
            }
            Some(record) if record.is_final_level() => Self::Done,
            Some(record) => Self::Stalled { level: record.level, approver: record.approver },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Result of routing an invoice to its first approver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub invoice_id: InvoiceId,
    pub approval_id: ApprovalId,
    pub approver: EmployeeId,
    pub level: i64,
    pub category: String,
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Escalation {
    /// The approval moved up to the previous approver's supervisor.
    Escalated { from: EmployeeId, to: EmployeeId, level: i64, approval_id: ApprovalId },
    /// The final level signed off. `notified` reports whether the downstream
    /// hook accepted the invoice.
    Completed { approver: EmployeeId, purchase_order_number: Option<String>, notified: bool },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::WorkflowState;
    use crate::domain::approval::ApprovalRecord;
    use crate::domain::employee::EmployeeId;
    use crate::domain::invoice::InvoiceId;

    fn record(level: i64, completed: bool) -> ApprovalRecord {
        let mut record = ApprovalRecord::open(InvoiceId("INV-1".into()), EmployeeId(3), level, "hr");
        if completed {
            record.completed_at = Some(Utc::now());
        }
        record
    }

    #[test]
    fn state_is_derived_from_latest_row() {
        assert_eq!(WorkflowState::from_latest(None), WorkflowState::New);
        assert_eq!(
            WorkflowState::from_latest(Some(&record(1, false))),
            WorkflowState::Pending { level: 1, approver: EmployeeId(3) }
        );
        assert_eq!(
            WorkflowState::from_latest(Some(&record(1, true))),
            WorkflowState::Stalled { level: 1, approver: EmployeeId(3) }
        );
        assert_eq!(
            WorkflowState::from_latest(Some(&record(2, false))),
            WorkflowState::Pending { level: 2, approver: EmployeeId(3) }
        );
        assert!(WorkflowState::from_latest(Some(&record(2, true))).is_terminal());
    }

    #[test]
    fn states_serialize_with_a_tag() {
        let json = serde_json::to_value(WorkflowState::Pending { level: 2, approver: EmployeeId(5) })
            .expect("serialize");
        assert_eq!(json["state"], "pending");
        assert_eq!(json["level"], 2);
        assert_eq!(json["approver"], 5);
    }
}
