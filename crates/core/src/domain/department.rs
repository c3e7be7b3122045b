use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder code that classification must never return.
pub const UNASSIGNED_DEPARTMENT: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepartmentCode(pub u8);

impl std::fmt::Display for DepartmentCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DepartmentError {
    #[error("department code {0} is the unassigned placeholder")]
    Unassigned(DepartmentCode),
    #[error("department code {0} is not configured")]
    Unknown(DepartmentCode),
    #[error("classifier response `{0}` is not a department code")]
    Unparseable(String),
}

/// Fixed mapping from department codes to threshold categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentTable {
    entries: BTreeMap<u8, String>,
}

impl Default for DepartmentTable {
    fn default() -> Self {
        Self::new([
            (UNASSIGNED_DEPARTMENT, "None"),
            (1, "hr"),
            (2, "logistics"),
            (3, "it"),
        ])
    }
}

impl DepartmentTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u8, S)>,
        S: Into<String>,
    {
        let mut entries: BTreeMap<u8, String> =
            entries.into_iter().map(|(code, name)| (code, name.into())).collect();
        entries.entry(UNASSIGNED_DEPARTMENT).or_insert_with(|| "None".to_string());
        Self { entries }
    }

    /// Category name used for threshold lookups. Never resolves the placeholder.
    pub fn category(&self, code: DepartmentCode) -> Result<&str, DepartmentError> {
        if code.0 == UNASSIGNED_DEPARTMENT {
            return Err(DepartmentError::Unassigned(code));
        }
        self.entries.get(&code.0).map(String::as_str).ok_or(DepartmentError::Unknown(code))
    }

    pub fn routable(&self) -> impl Iterator<Item = (DepartmentCode, &str)> + '_ {
        self.entries
            .iter()
            .filter(|(code, _)| **code != UNASSIGNED_DEPARTMENT)
            .map(|(code, name)| (DepartmentCode(*code), name.as_str()))
    }

    pub fn entries(&self) -> impl Iterator<Item = (DepartmentCode, &str)> + '_ {
        self.entries.iter().map(|(code, name)| (DepartmentCode(*code), name.as_str()))
    }

    /// Validates untrusted classifier output. Accepts a bare code, optionally
    /// quoted or followed by a period.
    pub fn parse_response(&self, response: &str) -> Result<DepartmentCode, DepartmentError> {
        let cleaned = response
            .trim_matches(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | '`' | '.'));

        let code = cleaned
            .parse::<u8>()
            .map(DepartmentCode)
            .map_err(|_| DepartmentError::Unparseable(response.trim().to_string()))?;
        self.category(code)?;
        Ok(code)
    }
}
