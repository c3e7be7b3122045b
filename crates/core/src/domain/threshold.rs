use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub category: String,
    pub max_amount: Decimal,
    pub min_rank_req: i64,
}

/// Smallest ceiling in `category` that still covers `amount`.
pub fn select_threshold<'a, I>(thresholds: I, category: &str, amount: Decimal) -> Option<&'a Threshold>
where
    I: IntoIterator<Item = &'a Threshold>,
{
    thresholds
        .into_iter()
        .filter(|threshold| threshold.category == category && threshold.max_amount >= amount)
        .min_by_key(|threshold| threshold.max_amount)
}
