//! Offline scoring of many applications read from a JSON or CSV file.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::decision::ScoringResult;
use super::domain::ScoreRequest;
use super::model::{ModelLoader, ModelUnavailable};
use super::service::{LoanScoringService, ScoringServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    /// A JSON array of request objects.
    Json,
    /// A CSV file whose header names the request fields.
    Csv,
}

impl BatchFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchInputError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot infer batch format from {0:?}; use a .json or .csv file")]
    UnknownFormat(PathBuf),
    #[error("invalid JSON batch: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV batch: {0}")]
    Csv(#[from] csv::Error),
}

pub fn read_requests(path: impl AsRef<Path>) -> Result<Vec<ScoreRequest>, BatchInputError> {
    let path = path.as_ref();
    let format = BatchFormat::from_path(path)
        .ok_or_else(|| BatchInputError::UnknownFormat(path.to_path_buf()))?;
    let file = File::open(path).map_err(|source| BatchInputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_requests_from(file, format)
}

pub fn read_requests_from<R: Read>(
    reader: R,
    format: BatchFormat,
) -> Result<Vec<ScoreRequest>, BatchInputError> {
    match format {
        BatchFormat::Json => Ok(serde_json::from_reader(reader)?),
        BatchFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
            let mut requests = Vec::new();
            for row in reader.deserialize() {
                requests.push(row?);
            }
            Ok(requests)
        }
    }
}

/// Outcome for one input row, numbered from 1.
#[derive(Debug)]
pub struct BatchRow {
    pub row: usize,
    pub outcome: Result<ScoringResult, ScoringServiceError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub approved: usize,
    pub denied: usize,
    pub rejected_input: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Share of scored applications that were denied, in percent.
    pub fn denial_rate(&self) -> f64 {
        let scored = self.approved + self.denied;
        if scored == 0 {
            0.0
        } else {
            self.denied as f64 * 100.0 / scored as f64
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub rows: Vec<BatchRow>,
    pub summary: BatchSummary,
}

/// Score every request in order. An unavailable model aborts the batch; every
/// other failure is recorded against its row.
pub async fn score_batch<L>(
    service: &LoanScoringService<L>,
    requests: Vec<ScoreRequest>,
) -> Result<BatchReport, ModelUnavailable>
where
    L: ModelLoader + 'static,
{
    service.readiness().await?;

    let mut summary = BatchSummary::default();
    let mut rows = Vec::with_capacity(requests.len());

    for (index, request) in requests.into_iter().enumerate() {
        let outcome = service.score(request).await;
        summary.total += 1;
        match &outcome {
            Ok(result) if result.approved => summary.approved += 1,
            Ok(_) => summary.denied += 1,
            Err(ScoringServiceError::Validation(_)) => summary.rejected_input += 1,
            Err(ScoringServiceError::Unavailable(error)) => return Err(error.clone()),
            Err(ScoringServiceError::Scoring(_)) => summary.failed += 1,
        }
        rows.push(BatchRow {
            row: index + 1,
            outcome,
        });
    }

    Ok(BatchReport { rows, summary })
}
