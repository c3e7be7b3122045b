use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use billroute_core::domain::approval::{ApprovalId, ApprovalRecord};
use billroute_core::domain::employee::{Employee, EmployeeId};
use billroute_core::domain::invoice::{InvoiceId, InvoiceRecord, ScannedPayload};
use billroute_core::domain::threshold::{select_threshold, Threshold};
use billroute_core::flows::store::{ApprovalStore, StoreError};

use super::RepositoryError;
use crate::connection::{ConnectionManager, DbPool};

const APPROVAL_COLUMNS: &str = r#""approval_id", "invoice_id", "emp_id", "created_at",
    "approval_level", "category", "completed_at""#;

const EMPLOYEE_COLUMNS: &str = r#""emp_id", "role_lvl", "workload", "sup_id", "department""#;

/// SQLite-backed approval store.
///
/// Every call goes through the connection manager, so a pool that was closed
/// between calls is reopened before the next query.
pub struct SqlApprovalStore {
    connections: ConnectionManager,
}

impl SqlApprovalStore {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self::new(ConnectionManager::from_pool(pool))
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    async fn pool(&self) -> Result<DbPool, RepositoryError> {
        Ok(self.connections.pool().await?)
    }

    pub async fn list_approvals(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(&format!(
            r#"SELECT {APPROVAL_COLUMNS} FROM "Approval"
               WHERE "invoice_id" = ?
               ORDER BY "approval_level" ASC, "created_at" ASC"#
        ))
        .bind(&invoice_id.0)
        .fetch_all(&pool)
        .await?;

        rows.iter().map(row_to_approval).collect()
    }
}

pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

fn row_to_approval(row: &SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    let approval_id: String = decode(row.try_get("approval_id"))?;
    let invoice_id: String = decode(row.try_get("invoice_id"))?;
    let emp_id: i64 = decode(row.try_get("emp_id"))?;
    let created_at: String = decode(row.try_get("created_at"))?;
    let level: i64 = decode(row.try_get("approval_level"))?;
    let category: String = decode(row.try_get("category"))?;
    let completed_at: Option<String> = decode(row.try_get("completed_at"))?;

    Ok(ApprovalRecord {
        id: ApprovalId(approval_id),
        invoice_id: InvoiceId(invoice_id),
        approver: EmployeeId(emp_id),
        created_at: parse_timestamp("created_at", &created_at)?,
        level,
        category,
        completed_at: completed_at
            .as_deref()
            .map(|raw| parse_timestamp("completed_at", raw))
            .transpose()?,
    })
}

fn row_to_employee(row: &SqliteRow) -> Result<Employee, RepositoryError> {
    let emp_id: i64 = decode(row.try_get("emp_id"))?;
    let role_level: i64 = decode(row.try_get("role_lvl"))?;
    let workload: i64 = decode(row.try_get("workload"))?;
    let sup_id: Option<i64> = decode(row.try_get("sup_id"))?;
    let department: Option<String> = decode(row.try_get("department"))?;

    Ok(Employee {
        id: EmployeeId(emp_id),
        role_level,
        workload,
        supervisor_id: sup_id.map(EmployeeId),
        department,
    })
}

fn row_to_threshold(row: &SqliteRow) -> Result<Threshold, RepositoryError> {
    let category: String = decode(row.try_get("category"))?;
    let max_amount: String = decode(row.try_get("max_amount"))?;
    let min_rank_req: i64 = decode(row.try_get("min_rank_req"))?;

    let max_amount = Decimal::from_str(max_amount.trim()).map_err(|error| {
        RepositoryError::Decode(format!("max_amount `{max_amount}`: {error}"))
    })?;

    Ok(Threshold { category, max_amount, min_rank_req })
}

#[async_trait]
impl ApprovalStore for SqlApprovalStore {
    async fn ensure_connected(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn find_invoice(&self, id: &InvoiceId) -> Result<Option<InvoiceRecord>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            r#"SELECT "zoho_bill_id", "scanned_data", "zoho_po_number"
               FROM "InvoiceStore" WHERE "zoho_bill_id" = ?"#,
        )
        .bind(&id.0)
        .fetch_optional(&pool)
        .await
        .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let scanned_data: Option<String> = decode(row.try_get("scanned_data"))?;
        let purchase_order_number: Option<String> = decode(row.try_get("zoho_po_number"))?;

        Ok(Some(InvoiceRecord {
            id: id.clone(),
            scanned_data: scanned_data.map(ScannedPayload::Encoded),
            purchase_order_number,
        }))
    }

    async fn find_threshold(
        &self,
        category: &str,
        amount: Decimal,
    ) -> Result<Option<Threshold>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            r#"SELECT "category", "max_amount", "min_rank_req"
               FROM "Threshold" WHERE "category" = ?"#,
        )
        .bind(category)
        .fetch_all(&pool)
        .await
        .map_err(RepositoryError::from)?;

        let thresholds = rows.iter().map(row_to_threshold).collect::<Result<Vec<_>, _>>()?;
        Ok(select_threshold(&thresholds, category, amount).cloned())
    }

    async fn find_least_loaded_employee(
        &self,
        role_level: i64,
    ) -> Result<Option<Employee>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            r#"SELECT {EMPLOYEE_COLUMNS} FROM "Employee"
               WHERE "role_lvl" = ?
               ORDER BY "workload" ASC, "emp_id" ASC
               LIMIT 1"#
        ))
        .bind(role_level)
        .fetch_optional(&pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_employee).transpose()?)
    }

    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            r#"SELECT {EMPLOYEE_COLUMNS} FROM "Employee" WHERE "emp_id" = ?"#
        ))
        .bind(id.0)
        .fetch_optional(&pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_employee).transpose()?)
    }

    async fn latest_approval(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<Option<ApprovalRecord>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            r#"SELECT {APPROVAL_COLUMNS} FROM "Approval"
               WHERE "invoice_id" = ?
               ORDER BY "approval_level" DESC, "created_at" DESC
               LIMIT 1"#
        ))
        .bind(&invoice_id.0)
        .fetch_optional(&pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(row_to_approval).transpose()?)
    }

    async fn open_approval(&self, approval: &ApprovalRecord) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query(&format!(
            r#"INSERT INTO "Approval" ({APPROVAL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"#
        ))
        .bind(&approval.id.0)
        .bind(&approval.invoice_id.0)
        .bind(approval.approver.0)
        .bind(timestamp(approval.created_at))
        .bind(approval.level)
        .bind(&approval.category)
        .bind(approval.completed_at.map(timestamp))
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let updated = sqlx::query(
            r#"UPDATE "Employee" SET "workload" = "workload" + 1 WHERE "emp_id" = ?"#,
        )
        .bind(approval.approver.0)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls back the insert.
            return Err(RepositoryError::Conflict(format!(
                "employee {} disappeared during assignment",
                approval.approver
            ))
            .into());
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn release_approval(
        &self,
        approval: &ApprovalRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(RepositoryError::from)?;

        let released = sqlx::query(
            r#"UPDATE "Approval" SET "completed_at" = ?
               WHERE "approval_id" = ? AND "completed_at" IS NULL"#,
        )
        .bind(timestamp(completed_at))
        .bind(&approval.id.0)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        if released.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "approval {} was already released",
                approval.id
            ))
            .into());
        }

        sqlx::query(r#"UPDATE "Employee" SET "workload" = "workload" - 1 WHERE "emp_id" = ?"#)
            .bind(approval.approver.0)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }
}
