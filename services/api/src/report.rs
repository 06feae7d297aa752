use crate::infra::{override_threshold, scoring_service};
use clap::Args;
use loan_risk::config::AppConfig;
use loan_risk::error::AppError;
use loan_risk::scoring::batch::{read_requests, score_batch, BatchReport};
use loan_risk::scoring::{ModelProvider, ScoringModel, ScoringServiceError};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON array or CSV file of applications
    #[arg(long, short)]
    pub(crate) input: PathBuf,
    /// Override the approval threshold on the probability of default
    #[arg(long)]
    pub(crate) threshold: Option<f64>,
}

pub(crate) async fn run_batch_score(args: ScoreArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    override_threshold(&mut config, args.threshold)?;

    let requests = read_requests(&args.input)?;
    let service = scoring_service(&config);
    let report = score_batch(&service, requests).await?;

    print!(
        "{}",
        render_batch_report(&report, config.scoring.policy.threshold())
    );
    Ok(())
}

pub(crate) async fn run_model_info() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let provider = ModelProvider::new(config.model.loader(), config.model.retry);
    let model = provider.get().await?;
    print!("{}", render_model_info(&model));
    Ok(())
}

pub(crate) fn render_batch_report(report: &BatchReport, threshold: f64) -> String {
    let mut out = String::new();
    for row in &report.rows {
        let line = match &row.outcome {
            Ok(result) if result.contract_violation => format!(
                "denied (p_default={:.4}, model output outside [0, 1])",
                result.probability_of_default
            ),
            Ok(result) => format!(
                "{} (p_default={:.4})",
                if result.approved { "approved" } else { "denied" },
                result.probability_of_default
            ),
            Err(ScoringServiceError::Validation(err)) => format!("invalid input: {err}"),
            Err(err) => format!("failed: {err}"),
        };
        let _ = writeln!(out, "row {}: {line}", row.row);
    }

    let summary = &report.summary;
    let scored = summary.approved + summary.denied;
    let approval_rate = if scored == 0 {
        0.0
    } else {
        100.0 - summary.denial_rate()
    };
    let _ = writeln!(
        out,
        "Scored {scored} of {} applications at threshold {threshold:.2}",
        summary.total
    );
    let _ = writeln!(out, "Approved: {} ({approval_rate:.1}%)", summary.approved);
    let _ = writeln!(
        out,
        "Rejected: {} ({:.1}%)",
        summary.denied,
        summary.denial_rate()
    );
    let _ = writeln!(
        out,
        "Invalid input: {}, failed: {}",
        summary.rejected_input, summary.failed
    );
    out
}

pub(crate) fn render_model_info(model: &ScoringModel) -> String {
    let metadata = model.metadata();
    let mut out = String::new();
    let _ = writeln!(out, "Model: {}", metadata.model_uri);
    let _ = writeln!(out, "Backend: {}", metadata.backend);
    if let Some(version) = &metadata.version {
        let _ = writeln!(out, "Version: {version}");
    }
    if let Some(run_id) = &metadata.run_id {
        let _ = writeln!(out, "Run: {run_id}");
    }
    if let Some(description) = &metadata.description {
        let _ = writeln!(out, "Description: {description}");
    }
    if let Some(registered_at) = &metadata.registered_at {
        let _ = writeln!(out, "Registered at: {}", registered_at.to_rfc3339());
    }
    let _ = writeln!(out, "Loaded at: {}", metadata.loaded_at.to_rfc3339());
    let _ = writeln!(out, "Feature columns ({}):", metadata.num_features);
    for (index, name) in model.schema().names().enumerate() {
        let _ = writeln!(out, "  {index:>2}. {name}");
    }

    let unpopulated = model.schema().unpopulated_columns();
    if unpopulated.is_empty() {
        let _ = writeln!(out, "Unpopulated columns: none");
    } else {
        let _ = writeln!(
            out,
            "Unpopulated columns (zero-filled): {}",
            unpopulated.join(", ")
        );
    }
    out
}
