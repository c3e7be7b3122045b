use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use billroute_core::domain::department::DepartmentTable;
use billroute_core::routing::{classification_prompt, Classifier, ClassifierError};

use crate::llm::LlmClient;

/// Asks a language model which department an invoice's line items belong to.
///
/// The raw answer is returned untouched; validating it against the department
/// table is the routing mode's job.
pub struct PromptClassifier<C> {
    client: C,
}

impl<C> PromptClassifier<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> Classifier for PromptClassifier<C>
where
    C: LlmClient,
{
    async fn classify(
        &self,
        items: &[Value],
        departments: &DepartmentTable,
    ) -> Result<String, ClassifierError> {
        let prompt = classification_prompt(items, departments);
        let response = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| ClassifierError::Unavailable(format!("{error:#}")))?;

        if response.trim().is_empty() {
            return Err(ClassifierError::EmptyResponse);
        }

        debug!(
            event_name = "classifier.response.received",
            item_count = items.len(),
            response = response.trim(),
            "classifier answered"
        );
        Ok(response)
    }
}
