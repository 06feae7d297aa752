//! Ordered feature columns agreed with the training pipeline.
//!
//! Column order is the positional contract with the model. The resolution rule for
//! each column is decided once, when the schema is constructed, and every feature
//! vector is produced from that resolution.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::domain::LoanIntent;
use super::encoding::{normalize_intent, INTENT_COLUMN_PREFIX};

/// Column list emitted by the training pipeline: raw columns in dataset order, then
/// the `loan_intent` dummies with the first category dropped.
pub const TRAINING_FEATURE_COLUMNS: [&str; 11] = [
    "person_age",
    "person_income",
    "person_home_ownership",
    "person_emp_length",
    "loan_amnt",
    "cb_person_default_on_file",
    "loan_intent_EDUCATION",
    "loan_intent_HOMEIMPROVEMENT",
    "loan_intent_MEDICAL",
    "loan_intent_PERSONAL",
    "loan_intent_VENTURE",
];

pub const HOME_OWNERSHIP_COLUMN: &str = "person_home_ownership";

/// Applicant fields copied into the vector without encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectField {
    Age,
    Income,
    EmploymentLength,
    LoanAmount,
    DefaultOnFile,
}

impl DirectField {
    pub const ALL: [DirectField; 5] = [
        DirectField::Age,
        DirectField::Income,
        DirectField::EmploymentLength,
        DirectField::LoanAmount,
        DirectField::DefaultOnFile,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            DirectField::Age => "person_age",
            DirectField::Income => "person_income",
            DirectField::EmploymentLength => "person_emp_length",
            DirectField::LoanAmount => "loan_amnt",
            DirectField::DefaultOnFile => "cb_person_default_on_file",
        }
    }

    fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == name)
    }
}

/// How a schema column obtains its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    Direct(DirectField),
    HomeOwnership,
    /// One-hot indicator; `label` is the normalized intent suffix.
    LoanIntent { label: String },
    /// Not populated by this service; always zero-filled.
    Unpopulated,
}

impl SlotKind {
    fn resolve(name: &str) -> Self {
        if let Some(field) = DirectField::from_column(name) {
            return SlotKind::Direct(field);
        }
        if name == HOME_OWNERSHIP_COLUMN {
            return SlotKind::HomeOwnership;
        }
        match name.strip_prefix(INTENT_COLUMN_PREFIX) {
            Some(suffix) if !suffix.trim().is_empty() => SlotKind::LoanIntent {
                label: normalize_intent(suffix),
            },
            _ => SlotKind::Unpopulated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureColumn {
    name: String,
    kind: SlotKind,
}

impl FeatureColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SlotKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for name in names {
            let name: String = name.into();
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateColumn(name));
            }
            let kind = SlotKind::resolve(&name);
            columns.push(FeatureColumn { name, kind });
        }

        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        Ok(Self { columns })
    }

    /// The column list the bundled training pipeline produces.
    pub fn training_default() -> Self {
        let columns = TRAINING_FEATURE_COLUMNS
            .iter()
            .map(|name| FeatureColumn {
                name: (*name).to_string(),
                kind: SlotKind::resolve(name),
            })
            .collect();
        Self { columns }
    }

    /// Parse a JSON array of column names, as written next to the model artifact.
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaError> {
        let names: Vec<String> = serde_json::from_str(raw).map_err(SchemaError::Parse)?;
        Self::new(names)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(FeatureColumn::name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Columns that will always be zero-filled.
    pub fn unpopulated_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.kind == SlotKind::Unpopulated)
            .map(FeatureColumn::name)
            .collect()
    }

    /// Intents without an indicator column, i.e. encoded as all-zero intent columns.
    ///
    /// A schema produced with the first category dropped yields exactly one entry.
    pub fn implicit_intents(&self) -> Vec<LoanIntent> {
        LoanIntent::ALL
            .into_iter()
            .filter(|intent| {
                !self.columns.iter().any(|column| match &column.kind {
                    SlotKind::LoanIntent { label } => label == intent.label(),
                    _ => false,
                })
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("feature schema is empty")]
    Empty,
    #[error("feature schema lists column '{0}' more than once")]
    DuplicateColumn(String),
    #[error("failed to read feature schema {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("feature schema must be a JSON array of column names: {0}")]
    Parse(serde_json::Error),
}
