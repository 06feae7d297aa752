use super::domain::ApplicantRecord;
use super::encoding::{home_ownership_code, IntentOneHot};
use super::schema::{DirectField, FeatureSchema, SlotKind};

/// Value written to schema columns this service does not populate.
pub const UNPOPULATED_DEFAULT: f64 = 0.0;

/// Positional feature row, one value per schema column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Assemble the feature row for `record` in exactly the order of `schema`.
pub fn build(record: &ApplicantRecord, schema: &FeatureSchema) -> FeatureVector {
    let intent = IntentOneHot::new(record.loan_intent());

    let values = schema
        .columns()
        .iter()
        .map(|column| match column.kind() {
            SlotKind::Direct(field) => direct_value(record, *field),
            SlotKind::HomeOwnership => home_ownership_code(record.home_ownership()),
            SlotKind::LoanIntent { label } => intent.value_for_label(label),
            SlotKind::Unpopulated => UNPOPULATED_DEFAULT,
        })
        .collect();

    FeatureVector(values)
}

fn direct_value(record: &ApplicantRecord, field: DirectField) -> f64 {
    match field {
        DirectField::Age => f64::from(record.age()),
        DirectField::Income => record.income() as f64,
        DirectField::EmploymentLength => record.employment_length(),
        DirectField::LoanAmount => record.loan_amount() as f64,
        DirectField::DefaultOnFile => record.default_on_file(),
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}
