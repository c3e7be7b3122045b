//! Department routing: the classifier boundary and how its answer is used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::department::{DepartmentCode, DepartmentError, DepartmentTable};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier returned an empty response")]
    EmptyResponse,
}

/// Maps an invoice's line items onto one department.
///
/// Implementations return the raw model text. The caller validates it.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        items: &[Value],
        departments: &DepartmentTable,
    ) -> Result<String, ClassifierError>;
}

/// How the classifier response turns into a department.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingMode {
    /// The classifier is still consulted, but its answer is ignored and every
    /// invoice goes to the pinned department.
    Pinned(DepartmentCode),
    /// The validated classifier answer decides the department.
    Classified,
}

impl Default for RoutingMode {
    fn default() -> Self {
        Self::Pinned(DepartmentCode(1))
    }
}

impl RoutingMode {
    pub fn resolve(
        &self,
        response: &str,
        departments: &DepartmentTable,
    ) -> Result<DepartmentCode, DepartmentError> {
        match self {
            Self::Pinned(code) => {
                departments.category(*code)?;
                Ok(*code)
            }
            Self::Classified => departments.parse_response(response),
        }
    }
}

/// Builds the routing prompt sent to the language model.
pub fn classification_prompt(items: &[Value], departments: &DepartmentTable) -> String {
    let items = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
    let listing = departments
        .entries()
        .map(|(code, name)| format!("{code}: \"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let choices =
        departments.routable().map(|(code, _)| code.to_string()).collect::<Vec<_>>().join(", ");

    format!(
        "You are routing invoices to the concerned department.\n\
         You are given a list of items = {items}\n\
         Map it onto one of these departments = {{{listing}}}\n\
         Do not give any explanation, answer with the department number only.\n\
         A single number and nothing else: one of {choices}. Never answer 0."
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{classification_prompt, RoutingMode};
    use crate::domain::department::{DepartmentCode, DepartmentError, DepartmentTable};

    #[test]
    fn pinned_mode_ignores_the_response() {
        let table = DepartmentTable::default();
        let mode = RoutingMode::default();

        assert_eq!(mode.resolve("3", &table), Ok(DepartmentCode(1)));
        assert_eq!(mode.resolve("nonsense", &table), Ok(DepartmentCode(1)));
    }

    #[test]
    fn pinned_mode_still_rejects_the_placeholder() {
        let table = DepartmentTable::default();
        let mode = RoutingMode::Pinned(DepartmentCode(0));

        assert_eq!(mode.resolve("1", &table), Err(DepartmentError::Unassigned(DepartmentCode(0))));
    }

    #[test]
    fn classified_mode_uses_the_validated_response() {
        let table = DepartmentTable::default();

        assert_eq!(RoutingMode::Classified.resolve("2", &table), Ok(DepartmentCode(2)));
        assert!(RoutingMode::Classified.resolve("two", &table).is_err());
    }

    #[test]
    fn prompt_lists_items_and_routable_codes() {
        let prompt =
            classification_prompt(&[json!({"name": "forklift"})], &DepartmentTable::default());

        assert!(prompt.contains("forklift"));
        assert!(prompt.contains("2: \"logistics\""));
        assert!(prompt.contains("one of 1, 2, 3"));
    }
}
