use serde::{Deserialize, Serialize};

/// Raw scoring payload as it arrives at the service boundary.
///
/// Every field is optional so that the validator, not the deserializer, decides
/// which field is missing and reports it by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub age: Option<f64>,
    pub income: Option<f64>,
    pub home_ownership: Option<String>,
    pub employment_length: Option<f64>,
    pub loan_amount: Option<f64>,
    pub def_on_file: Option<f64>,
    pub loan_intent: Option<String>,
}

/// Housing situation declared by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeOwnership {
    Other,
    Rent,
    Mortgage,
    Own,
}

impl HomeOwnership {
    pub const ALL: [HomeOwnership; 4] = [
        HomeOwnership::Other,
        HomeOwnership::Rent,
        HomeOwnership::Mortgage,
        HomeOwnership::Own,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            HomeOwnership::Other => "other",
            HomeOwnership::Rent => "rent",
            HomeOwnership::Mortgage => "mortgage",
            HomeOwnership::Own => "own",
        }
    }
}

/// Declared purpose of the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanIntent {
    DebtConsolidation,
    Personal,
    Education,
    Medical,
    Venture,
    HomeImprovement,
}

impl LoanIntent {
    pub const ALL: [LoanIntent; 6] = [
        LoanIntent::DebtConsolidation,
        LoanIntent::Personal,
        LoanIntent::Education,
        LoanIntent::Medical,
        LoanIntent::Venture,
        LoanIntent::HomeImprovement,
    ];

    /// Uppercase label used by the training data and the `loan_intent_*` columns.
    pub fn label(&self) -> &'static str {
        match self {
            LoanIntent::DebtConsolidation => "DEBTCONSOLIDATION",
            LoanIntent::Personal => "PERSONAL",
            LoanIntent::Education => "EDUCATION",
            LoanIntent::Medical => "MEDICAL",
            LoanIntent::Venture => "VENTURE",
            LoanIntent::HomeImprovement => "HOMEIMPROVEMENT",
        }
    }
}

/// Applicant attributes that passed validation.
///
/// Only the request validator constructs records, so every instance satisfies the
/// field bounds and `employment_length <= age`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantRecord {
    age: u8,
    income: u64,
    home_ownership: HomeOwnership,
    employment_length: f64,
    loan_amount: u64,
    default_on_file: f64,
    loan_intent: LoanIntent,
}

impl ApplicantRecord {
    pub(crate) fn new(
        age: u8,
        income: u64,
        home_ownership: HomeOwnership,
        employment_length: f64,
        loan_amount: u64,
        default_on_file: f64,
        loan_intent: LoanIntent,
    ) -> Self {
        Self {
            age,
            income,
            home_ownership,
            employment_length,
            loan_amount,
            default_on_file,
            loan_intent,
        }
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn income(&self) -> u64 {
        self.income
    }

    pub fn home_ownership(&self) -> HomeOwnership {
        self.home_ownership
    }

    pub fn employment_length(&self) -> f64 {
        self.employment_length
    }

    pub fn loan_amount(&self) -> u64 {
        self.loan_amount
    }

    pub fn default_on_file(&self) -> f64 {
        self.default_on_file
    }

    pub fn loan_intent(&self) -> LoanIntent {
        self.loan_intent
    }
}
