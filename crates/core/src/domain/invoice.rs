use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::department::DepartmentCode;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw scanned document payload as it comes out of the invoice store.
///
/// Some rows hold structured JSON, others hold the same document serialized
/// as text. Both forms are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScannedPayload {
    Structured(Value),
    Encoded(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub scanned_data: Option<ScannedPayload>,
    pub purchase_order_number: Option<String>,
}

/// Fields of a scanned invoice the approval workflow cares about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannedInvoice {
    pub total: Decimal,
    pub items: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice_id: InvoiceId,
    pub total_amount: Decimal,
    pub department: DepartmentCode,
    pub items: Vec<Value>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("scanned data is not valid json: {0}")]
    InvalidJson(String),
    #[error("scanned data must be a json object, got {0}")]
    NotAnObject(&'static str),
    #[error("scanned total `{0}` is not a number")]
    InvalidTotal(String),
    #[error("scanned items must be a list, got {0}")]
    InvalidItems(&'static str),
}

impl ScannedPayload {
    pub fn parse(&self) -> Result<ScannedInvoice, PayloadError> {
        match self {
            Self::Structured(value) => extract(value),
            Self::Encoded(raw) => {
                let value = serde_json::from_str::<Value>(raw)
                    .map_err(|error| PayloadError::InvalidJson(error.to_string()))?;
                extract(&value)
            }
        }
    }
}

fn extract(value: &Value) -> Result<ScannedInvoice, PayloadError> {
    let object = value.as_object().ok_or(PayloadError::NotAnObject(json_kind(value)))?;

    let total = match object.get("total") {
        None | Some(Value::Null) => Decimal::ZERO,
        Some(Value::Number(number)) => parse_amount(&number.to_string())?,
        Some(Value::String(text)) => parse_amount(text)?,
        Some(other) => return Err(PayloadError::InvalidTotal(other.to_string())),
    };

    let items = match object.get("items") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => return Err(PayloadError::InvalidItems(json_kind(other))),
    };

    Ok(ScannedInvoice { total, items })
}

fn parse_amount(raw: &str) -> Result<Decimal, PayloadError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| PayloadError::InvalidTotal(raw.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{PayloadError, ScannedPayload};

    #[test]
    fn structured_and_encoded_payloads_parse_the_same() {
        let document = json!({"total": 320, "items": [{"name": "chair"}]});
        let structured = ScannedPayload::Structured(document.clone()).parse().expect("structured");
        let encoded = ScannedPayload::Encoded(document.to_string()).parse().expect("encoded");

        assert_eq!(structured, encoded);
        assert_eq!(structured.total, Decimal::new(320, 0));
        assert_eq!(structured.items.len(), 1);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed = ScannedPayload::Encoded("{}".to_string()).parse().expect("parse");
        assert_eq!(parsed.total, Decimal::ZERO);
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn fractional_and_string_totals_are_accepted() {
        let parsed = ScannedPayload::Structured(json!({"total": "1250.75"})).parse().expect("parse");
        assert_eq!(parsed.total, Decimal::new(125075, 2));

        let parsed = ScannedPayload::Structured(json!({"total": 99.5})).parse().expect("parse");
        assert_eq!(parsed.total, Decimal::new(995, 1));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            ScannedPayload::Encoded("{not json".to_string()).parse(),
            Err(PayloadError::InvalidJson(_))
        ));
        assert_eq!(
            ScannedPayload::Structured(json!([1, 2])).parse(),
            Err(PayloadError::NotAnObject("array"))
        );
        assert!(matches!(
            ScannedPayload::Structured(json!({"total": "lots"})).parse(),
            Err(PayloadError::InvalidTotal(_))
        ));
        assert_eq!(
            ScannedPayload::Structured(json!({"items": "chair"})).parse(),
            Err(PayloadError::InvalidItems("string"))
        );
    }
}
