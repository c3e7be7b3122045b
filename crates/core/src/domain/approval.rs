use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::employee::EmployeeId;
use crate::domain::invoice::InvoiceId;

/// Level assigned by the department routing step.
pub const FIRST_APPROVAL_LEVEL: i64 = 1;
/// Level whose completion finishes the workflow.
pub const FINAL_APPROVAL_LEVEL: i64 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub String);

impl ApprovalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the append-only approval log.
///
/// A row is open until the invoice is escalated past it, at which point
/// `completed_at` is stamped. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: ApprovalId,
    pub invoice_id: InvoiceId,
    pub approver: EmployeeId,
    pub created_at: DateTime<Utc>,
    pub level: i64,
    pub category: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    pub fn open(
        invoice_id: InvoiceId,
        approver: EmployeeId,
        level: i64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: ApprovalId::generate(),
            invoice_id,
            approver,
            created_at: Utc::now(),
            level,
            category: category.into(),
            completed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }

    pub fn is_final_level(&self) -> bool {
        self.level >= FINAL_APPROVAL_LEVEL
    }
}

/// Orders candidates the way "latest approval" is defined: highest level,
/// then newest row.
pub fn latest<'a, I>(records: I) -> Option<&'a ApprovalRecord>
where
    I: IntoIterator<Item = &'a ApprovalRecord>,
{
    records.into_iter().max_by(|left, right| {
        left.level.cmp(&right.level).then_with(|| left.created_at.cmp(&right.created_at))
    })
}
