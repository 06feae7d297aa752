//! Categorical encoders shared by validation and feature building.
//!
//! The mappings here must match what the training pipeline produced. Home ownership
//! is an ordinal code. Loan intent is one-hot encoded with the first category
//! (alphabetically `DEBTCONSOLIDATION`) dropped, so that category is represented by
//! every `loan_intent_*` column being zero.

use super::domain::{HomeOwnership, LoanIntent};

/// Column prefix used by the one-hot loan intent columns.
pub const INTENT_COLUMN_PREFIX: &str = "loan_intent_";

const HOME_OWNERSHIP_LABELS: &[&str] = &["other", "rent", "mortgage", "own"];
const LOAN_INTENT_LABELS: &[&str] = &[
    "debtconsolidation",
    "personal",
    "education",
    "medical",
    "venture",
    "homeimprovement",
];

/// A categorical value outside the mapping used at training time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must be one of: {} (got '{value}')", .expected.join(", "))]
pub struct InvalidCategory {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static [&'static str],
}

pub fn parse_home_ownership(raw: &str) -> Result<HomeOwnership, InvalidCategory> {
    let key = raw.trim().to_lowercase();
    HomeOwnership::ALL
        .into_iter()
        .find(|candidate| candidate.label() == key)
        .ok_or_else(|| InvalidCategory {
            field: "home_ownership",
            value: raw.to_string(),
            expected: HOME_OWNERSHIP_LABELS,
        })
}

/// Ordinal code the model was trained with.
pub fn home_ownership_code(value: HomeOwnership) -> f64 {
    match value {
        HomeOwnership::Other => 0.0,
        HomeOwnership::Rent => 1.0,
        HomeOwnership::Mortgage => 2.0,
        HomeOwnership::Own => 3.0,
    }
}

pub fn encode_home_ownership(raw: &str) -> Result<f64, InvalidCategory> {
    parse_home_ownership(raw).map(home_ownership_code)
}

/// Uppercase, with whitespace, `-` and `_` removed.
pub fn normalize_intent(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '-' && *ch != '_')
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn parse_loan_intent(raw: &str) -> Result<LoanIntent, InvalidCategory> {
    let key = normalize_intent(raw);
    LoanIntent::ALL
        .into_iter()
        .find(|candidate| candidate.label() == key)
        .ok_or_else(|| InvalidCategory {
            field: "loan_intent",
            value: raw.to_string(),
            expected: LOAN_INTENT_LABELS,
        })
}

pub fn encode_loan_intent(raw: &str) -> Result<IntentOneHot, InvalidCategory> {
    parse_loan_intent(raw).map(IntentOneHot::new)
}

/// One-hot contribution of a single loan intent across the schema's intent columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentOneHot {
    intent: LoanIntent,
}

impl IntentOneHot {
    pub fn new(intent: LoanIntent) -> Self {
        Self { intent }
    }

    pub fn intent(&self) -> LoanIntent {
        self.intent
    }

    /// Indicator for an already-normalized intent label.
    pub fn value_for_label(&self, label: &str) -> f64 {
        if self.intent.label() == label {
            1.0
        } else {
            0.0
        }
    }

    /// Indicator for a schema column, or `None` when the column is not an intent column.
    pub fn value_for(&self, column: &str) -> Option<f64> {
        column
            .strip_prefix(INTENT_COLUMN_PREFIX)
            .map(|suffix| self.value_for_label(&normalize_intent(suffix)))
    }
}
