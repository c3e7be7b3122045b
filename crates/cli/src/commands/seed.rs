use billroute_core::config::LoadOptions;
use billroute_db::{connect_with_settings, migrations, DemoDataset, SeedResult};
use serde_json::json;

use crate::commands::workflow::{load_config, runtime};
use crate::commands::CommandResult;

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return failure.into_result("seed"),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result("seed"),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome = if verification.all_present {
            Ok(seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed_checks), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success_with_data("seed", summary(&seeded), seed_data(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "demo dataset loaded: invoice {} with employees {:?} and thresholds for {}",
        seeded.invoice_id,
        seeded.employee_ids,
        seeded.threshold_categories.join(", ")
    )
}

fn seed_data(seeded: &SeedResult) -> serde_json::Value {
    json!({
        "invoice_id": seeded.invoice_id,
        "employee_ids": seeded.employee_ids,
        "threshold_categories": seeded.threshold_categories,
    })
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_failed_checks() {
        assert_eq!(
            verification_message(&["demo-invoice", "threshold-it"]),
            "seed verification failed for checks: demo-invoice, threshold-it"
        );
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }
}
