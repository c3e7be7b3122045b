use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const WORKFLOW_TABLES: &[&str] = &["Approval", "Employee", "InvoiceStore", "Threshold"];

    #[tokio::test]
    async fn migrations_create_workflow_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let mut tables: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\'
             AND name NOT LIKE 'sqlite%'",
        )
        .fetch_all(&pool)
        .await
        .expect("list tables")
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
        tables.sort();

        assert_eq!(tables, WORKFLOW_TABLES);
    }

    #[tokio::test]
    async fn rerunning_migrations_is_a_no_op() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("count applied migrations");
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn approval_level_must_be_positive() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(r#"INSERT INTO "Employee" ("emp_id", "role_lvl") VALUES (1, 2)"#)
            .execute(&pool)
            .await
            .expect("insert employee");
        let rejected = sqlx::query(
            r#"INSERT INTO "Approval" ("approval_id", "invoice_id", "emp_id", "created_at",
               "approval_level", "category") VALUES ('a', 'INV', 1, '2026-01-01T00:00:00Z', 0, 'hr')"#,
        )
        .execute(&pool)
        .await;
        assert!(rejected.is_err());
    }
}
