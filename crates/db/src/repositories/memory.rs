use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use billroute_core::domain::approval::{self, ApprovalRecord};
use billroute_core::domain::employee::{least_loaded, Employee, EmployeeId};
use billroute_core::domain::invoice::{InvoiceId, InvoiceRecord};
use billroute_core::domain::threshold::{select_threshold, Threshold};
use billroute_core::flows::store::{ApprovalStore, StoreError};

#[derive(Default)]
struct Tables {
    invoices: BTreeMap<String, InvoiceRecord>,
    thresholds: Vec<Threshold>,
    employees: BTreeMap<i64, Employee>,
    approvals: Vec<ApprovalRecord>,
}

/// Process-local store for tests and dry runs.
///
/// All tables sit behind one lock so paired writes are applied together.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_invoice(&self, invoice: InvoiceRecord) {
        self.tables.write().await.invoices.insert(invoice.id.0.clone(), invoice);
    }

    pub async fn insert_threshold(&self, threshold: Threshold) {
        self.tables.write().await.thresholds.push(threshold);
    }

    pub async fn insert_employee(&self, employee: Employee) {
        self.tables.write().await.employees.insert(employee.id.0, employee);
    }

    pub async fn employee(&self, id: EmployeeId) -> Option<Employee> {
        self.tables.read().await.employees.get(&id.0).cloned()
    }

    pub async fn approvals(&self, invoice_id: &InvoiceId) -> Vec<ApprovalRecord> {
        self.tables
            .read()
            .await
            .approvals
            .iter()
            .filter(|approval| &approval.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    /// Makes every call fail with a connection error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn ensure_connected(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn find_invoice(&self, id: &InvoiceId) -> Result<Option<InvoiceRecord>, StoreError> {
        self.check_online()?;
        Ok(self.tables.read().await.invoices.get(&id.0).cloned())
    }

    async fn find_threshold(
        &self,
        category: &str,
        amount: Decimal,
    ) -> Result<Option<Threshold>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(select_threshold(&tables.thresholds, category, amount).cloned())
    }

    async fn find_least_loaded_employee(
        &self,
        role_level: i64,
    ) -> Result<Option<Employee>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(least_loaded(tables.employees.values(), role_level).cloned())
    }

    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        self.check_online()?;
        Ok(self.tables.read().await.employees.get(&id.0).cloned())
    }

    async fn latest_approval(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Option<ApprovalRecord>, StoreError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let rows = tables.approvals.iter().filter(|row| &row.invoice_id == invoice_id);
        Ok(approval::latest(rows).cloned())
    }

    async fn open_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let Some(employee) = tables.employees.get_mut(&record.approver.0) else {
            return Err(StoreError::Database(format!(
                "employee {} does not exist",
                record.approver
            )));
        };
        employee.workload += 1;
        tables.approvals.push(record.clone());
        Ok(())
    }

    async fn release_approval(
        &self,
        record: &ApprovalRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .approvals
            .iter_mut()
            .find(|row| row.id == record.id && row.completed_at.is_none())
            .ok_or_else(|| {
                StoreError::Conflict(format!("approval {} was already released", record.id))
            })?;
        row.completed_at = Some(completed_at);

        if let Some(employee) = tables.employees.get_mut(&record.approver.0) {
            employee.workload -= 1;
        }
        Ok(())
    }
}
