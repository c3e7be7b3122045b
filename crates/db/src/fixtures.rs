use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const DEMO_INVOICE_ID: &str = "INV-DEMO-001";
const DEMO_EMPLOYEE_IDS: &[i64] = &[1, 5];
const DEMO_THRESHOLD_CATEGORIES: &[&str] = &["hr", "logistics", "it"];

/// Reference data for a local walkthrough of the approval chain.
///
/// Seeds one invoice in the `hr` band that routes to employee 1, whose
/// supervisor (employee 5) takes the second level.
pub struct DemoDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub invoice_id: &'static str,
    pub employee_ids: &'static [i64],
    pub threshold_categories: &'static [&'static str],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Re-running it leaves existing rows untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            invoice_id: DEMO_INVOICE_ID,
            employee_ids: DEMO_EMPLOYEE_IDS,
            threshold_categories: DEMO_THRESHOLD_CATEGORIES,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let invoice_ok: i64 = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM "InvoiceStore"
               WHERE "zoho_bill_id" = ?1 AND "scanned_data" IS NOT NULL)"#,
        )
        .bind(DEMO_INVOICE_ID)
        .fetch_one(pool)
        .await?;
        checks.push(("demo-invoice", invoice_ok == 1));

        for category in DEMO_THRESHOLD_CATEGORIES {
            let count: i64 =
                sqlx::query_scalar(r#"SELECT COUNT(1) FROM "Threshold" WHERE "category" = ?1"#)
                    .bind(category)
                    .fetch_one(pool)
                    .await?;
            checks.push((threshold_label(category), count > 0));
        }

        let employees: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(1) FROM "Employee" WHERE "emp_id" IN (1, 5)"#)
                .fetch_one(pool)
                .await?;
        checks.push(("demo-employees", employees == DEMO_EMPLOYEE_IDS.len() as i64));

        let hierarchy_ok: i64 = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM "Employee" AS e
               JOIN "Employee" AS s ON s."emp_id" = e."sup_id"
               WHERE e."emp_id" = 1)"#,
        )
        .fetch_one(pool)
        .await?;
        checks.push(("demo-supervisor-link", hierarchy_ok == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo invoice, its approvals, and the demo employees.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query(r#"DELETE FROM "Approval" WHERE "invoice_id" = ?1"#)
            .bind(DEMO_INVOICE_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r#"DELETE FROM "InvoiceStore" WHERE "zoho_bill_id" = ?1"#)
            .bind(DEMO_INVOICE_ID)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r#"DELETE FROM "Employee" WHERE "emp_id" IN (1, 5)"#)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn threshold_label(category: &str) -> &'static str {
    match category {
        "hr" => "threshold-hr",
        "logistics" => "threshold-logistics",
        _ => "threshold-it",
    }
}

#[cfg(test)]
mod tests {
    use super::DemoDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        DemoDataset::load(&pool).await.expect("first load");
        DemoDataset::load(&pool).await.expect("second load");

        let thresholds: i64 = sqlx::query_scalar(r#"SELECT COUNT(1) FROM "Threshold""#)
            .fetch_one(&pool)
            .await
            .expect("count thresholds");
        assert_eq!(thresholds, 4);

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);
    }

    #[tokio::test]
    async fn clean_removes_demo_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoDataset::load(&pool).await.expect("load");

        DemoDataset::clean(&pool).await.expect("clean");
        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }
}
