use super::domain::{ApplicantRecord, ScoreRequest};
use super::encoding::{parse_home_ownership, parse_loan_intent, InvalidCategory};

/// Inclusive numeric range accepted for a payload field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    pub min: f64,
    pub max: f64,
}

impl FieldBounds {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const AGE_BOUNDS: FieldBounds = FieldBounds::new(18.0, 120.0);
pub const INCOME_BOUNDS: FieldBounds = FieldBounds::new(0.0, 100_000_000.0);
pub const EMPLOYMENT_LENGTH_BOUNDS: FieldBounds = FieldBounds::new(0.0, 110.0);
pub const LOAN_AMOUNT_BOUNDS: FieldBounds = FieldBounds::new(1.0, 1_000_000_000.0);

/// Rejections raised before a payload may reach the feature builder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be a whole number (got {value})")]
    NotInteger { field: &'static str, value: f64 },
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be 0 or 1 (got {value})")]
    InvalidFlag { field: &'static str, value: f64 },
    #[error(transparent)]
    InvalidCategory(#[from] InvalidCategory),
    #[error("employment_length cannot be greater than age ({employment_length} > {age})")]
    EmploymentExceedsAge { employment_length: f64, age: u8 },
}

impl ValidationError {
    /// Payload field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field }
            | ValidationError::NotFinite { field }
            | ValidationError::NotInteger { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFlag { field, .. } => field,
            ValidationError::InvalidCategory(category) => category.field,
            ValidationError::EmploymentExceedsAge { .. } => "employment_length",
        }
    }
}

/// Field-range, enum, and cross-field checks for scoring payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, request: ScoreRequest) -> Result<ApplicantRecord, ValidationError> {
        let age = whole_number("age", request.age, AGE_BOUNDS)?;
        let income = whole_number("income", request.income, INCOME_BOUNDS)?;
        let home_ownership = parse_home_ownership(required(
            "home_ownership",
            request.home_ownership.as_deref(),
        )?)?;
        let employment_length = bounded(
            "employment_length",
            request.employment_length,
            EMPLOYMENT_LENGTH_BOUNDS,
        )?;
        let loan_amount = whole_number("loan_amount", request.loan_amount, LOAN_AMOUNT_BOUNDS)?;
        let default_on_file = flag("def_on_file", request.def_on_file)?;
        let loan_intent =
            parse_loan_intent(required("loan_intent", request.loan_intent.as_deref())?)?;

        let age = age as u8;
        if employment_length > f64::from(age) {
            return Err(ValidationError::EmploymentExceedsAge {
                employment_length,
                age,
            });
        }

        Ok(ApplicantRecord::new(
            age,
            income as u64,
            home_ownership,
            employment_length,
            loan_amount as u64,
            default_on_file,
            loan_intent,
        ))
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::Missing { field })
}

fn finite(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = required(field, value)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

fn bounded(
    field: &'static str,
    value: Option<f64>,
    bounds: FieldBounds,
) -> Result<f64, ValidationError> {
    let value = finite(field, value)?;
    if bounds.contains(value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: bounds.min,
            max: bounds.max,
            value,
        })
    }
}

fn whole_number(
    field: &'static str,
    value: Option<f64>,
    bounds: FieldBounds,
) -> Result<f64, ValidationError> {
    let value = finite(field, value)?;
    if value.fract() != 0.0 {
        return Err(ValidationError::NotInteger { field, value });
    }
    bounded(field, Some(value), bounds)
}

fn flag(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = finite(field, value)?;
    if value == 0.0 || value == 1.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidFlag { field, value })
    }
}
