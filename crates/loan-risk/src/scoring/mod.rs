//! Loan default-risk scoring: request validation, feature alignment, model
//! backends, and the approve/deny decision.

pub mod batch;
pub mod decision;
pub mod domain;
pub mod encoding;
pub mod features;
pub mod model;
pub mod router;
pub mod schema;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use decision::{DecisionPolicy, InvalidThreshold, ScoringError, ScoringResult};
pub use domain::{ApplicantRecord, HomeOwnership, LoanIntent, ScoreRequest};
pub use encoding::InvalidCategory;
pub use features::FeatureVector;
pub use model::{ModelMetadata, ModelProvider, ModelUnavailable, ScoringModel, SourceLoader};
pub use router::scoring_router;
pub use schema::FeatureSchema;
pub use service::{Disclosure, LoanScoringService, ScoreResponse, ScoringServiceError};
pub use validation::{RequestValidator, ValidationError};
