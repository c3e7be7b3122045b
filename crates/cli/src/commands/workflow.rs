use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::info;

use billroute_agent::{HttpLlmClient, PromptClassifier, WebhookApprover};
use billroute_core::config::{AppConfig, LoadOptions};
use billroute_core::domain::department::DepartmentTable;
use billroute_core::routing::{Classifier, ClassifierError};
use billroute_core::{ApprovalEngine, ApprovalError, DownstreamApprover, LogOnlyApprover};
use billroute_db::{migrations, ConnectionManager, SqlApprovalStore};

use crate::commands::CommandResult;

/// Why a command stopped, already mapped to its output class and exit code.
#[derive(Debug)]
pub(crate) struct CommandFailure {
    pub error_class: String,
    pub message: String,
    pub exit_code: u8,
}

impl CommandFailure {
    pub(crate) fn new(error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class: error_class.to_string(), message: message.into(), exit_code }
    }

    pub(crate) fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, &self.error_class, self.message, self.exit_code)
    }
}

impl From<ApprovalError> for CommandFailure {
    fn from(error: ApprovalError) -> Self {
        let exit_code = match error {
            ApprovalError::Connection(_) => 4,
            _ => 6,
        };
        Self::new(error.class(), error.to_string(), exit_code)
    }
}

pub(crate) fn load_config(options: LoadOptions) -> Result<AppConfig, CommandFailure> {
    AppConfig::load(options).map_err(|error| {
        CommandFailure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub(crate) fn runtime() -> Result<Runtime, CommandFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandFailure::new(
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) fn to_data(value: &impl Serialize) -> Result<Value, CommandFailure> {
    serde_json::to_value(value)
        .map_err(|error| CommandFailure::new("serialization", error.to_string(), 3))
}

/// Which outbound adapters a command needs besides the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wiring {
    /// Classifier and downstream hook built from configuration.
    Full,
    /// Read-only commands never classify or notify.
    StoreOnly,
}

/// Stands in for the classifier on commands that never route an invoice.
struct UnwiredClassifier;

#[async_trait]
impl Classifier for UnwiredClassifier {
    async fn classify(
        &self,
        _items: &[Value],
        _departments: &DepartmentTable,
    ) -> Result<String, ClassifierError> {
        Err(ClassifierError::Unavailable("classifier is not wired for this command".to_string()))
    }
}

/// Opens the store and applies pending migrations. With [`Wiring::Full`] it also
/// wires the classifier and downstream hook from configuration.
pub(crate) async fn open_engine(
    config: &AppConfig,
    wiring: Wiring,
) -> Result<ApprovalEngine, CommandFailure> {
    let connections = ConnectionManager::new(
        config.database.url.clone(),
        config.database.max_connections,
        config.database.timeout_secs,
    );
    let pool = connections
        .pool()
        .await
        .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;

    let store = Arc::new(SqlApprovalStore::new(connections));

    if wiring == Wiring::StoreOnly {
        info!(
            event_name = "system.bootstrap.engine_ready",
            wiring = "store_only",
            "approval engine ready"
        );
        return Ok(ApprovalEngine::new(
            store,
            Arc::new(UnwiredClassifier),
            Arc::new(LogOnlyApprover),
            config.engine_options(),
        ));
    }

    let client = HttpLlmClient::from_config(&config.llm)
        .map_err(|error| CommandFailure::new("classifier_init", error.to_string(), 3))?;

    let downstream: Arc<dyn DownstreamApprover> = match WebhookApprover::from_config(
        &config.downstream,
    )
    .map_err(|error| CommandFailure::new("downstream_init", error.to_string(), 3))?
    {
        Some(webhook) => Arc::new(webhook),
        None => Arc::new(LogOnlyApprover),
    };

    info!(
        event_name = "system.bootstrap.engine_ready",
        wiring = "full",
        llm_endpoint = client.endpoint(),
        webhook_configured = config.downstream.webhook_url.is_some(),
        "approval engine ready"
    );

    Ok(ApprovalEngine::new(
        store,
        Arc::new(PromptClassifier::new(client)),
        downstream,
        config.engine_options(),
    ))
}

/// Runs one engine operation and renders its outcome as a command result.
pub(crate) fn execute<F, Fut>(
    command: &str,
    options: LoadOptions,
    wiring: Wiring,
    operation: F,
) -> CommandResult
where
    F: FnOnce(ApprovalEngine) -> Fut,
    Fut: Future<Output = Result<(String, Value), CommandFailure>>,
{
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return failure.into_result(command),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result(command),
    };

    let result = runtime.block_on(async {
        let engine = open_engine(&config, wiring).await?;
        operation(engine).await
    });

    match result {
        Ok((message, data)) => CommandResult::success_with_data(command, message, data),
        Err(failure) => failure.into_result(command),
    }
}

#[cfg(test)]
mod tests {
    use billroute_core::domain::department::DepartmentTable;
    use billroute_core::routing::{Classifier, ClassifierError};
    use billroute_core::{ApprovalError, InvoiceId, MissingRecord};

    use super::{runtime, CommandFailure, UnwiredClassifier};

    #[test]
    fn engine_errors_map_to_exit_codes() {
        let offline = CommandFailure::from(ApprovalError::Connection("refused".into()));
        assert_eq!((offline.error_class.as_str(), offline.exit_code), ("connection", 4));

        let missing =
            CommandFailure::from(ApprovalError::from(MissingRecord::Invoice(InvoiceId("X".into()))));
        assert_eq!((missing.error_class.as_str(), missing.exit_code), ("invoice_not_found", 6));
    }

    #[test]
    fn store_only_wiring_refuses_to_classify() {
        let runtime = runtime().expect("runtime");
        let answer = runtime.block_on(UnwiredClassifier.classify(&[], &DepartmentTable::default()));
        assert!(matches!(answer, Err(ClassifierError::Unavailable(_))));
    }
}
