//! Lazily-loaded, process-cached model with explicit reset.
//!
//! The cache moves between three states: uninitialized, loaded, and failed. A
//! failure is shared with the callers that were already waiting on the load, but
//! a request arriving after it attempts the load again. Concurrent first requests
//! are serialized behind the write lock and observe the single outcome the winner
//! stored.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use tracing::{info, warn};

use super::backend::{ModelMetadata, ScoringModel};
use super::loader::{ModelLoadError, ModelLoader};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounds on how long a single `get` may spend loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total load attempts, at least one.
    pub attempts: usize,
    /// First delay between attempts; each later delay doubles it.
    pub backoff: Duration,
    /// Upper bound for each individual attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
            timeout,
        }
    }

    /// Delays of `backoff`, `2 * backoff`, `4 * backoff`, ... capped at five seconds.
    ///
    /// `ExponentialBackoff` raises its base to the attempt number, so the base is
    /// pinned at 2 and the configured backoff becomes the factor.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(MAX_BACKOFF * 2)
            .map(|delay| delay / 2)
            .take(self.attempts.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt(Duration::from_secs(10))
    }
}

/// The model could not be obtained; callers should retry later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model not available from {model_uri}: {reason}")]
pub struct ModelUnavailable {
    pub model_uri: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    Uninitialized,
    Loaded(ModelMetadata),
    Failed {
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

enum ModelSlot {
    Uninitialized,
    Loaded(Arc<ScoringModel>),
    Failed {
        reason: String,
        failed_at: DateTime<Utc>,
        settled: Instant,
    },
}

pub struct ModelProvider<L> {
    loader: Arc<L>,
    retry: RetryPolicy,
    slot: RwLock<ModelSlot>,
    load_attempts: AtomicUsize,
}

impl<L> ModelProvider<L>
where
    L: ModelLoader + 'static,
{
    pub fn new(loader: L, retry: RetryPolicy) -> Self {
        Self {
            loader: Arc::new(loader),
            retry,
            slot: RwLock::new(ModelSlot::Uninitialized),
            load_attempts: AtomicUsize::new(0),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Return the cached model, loading it on first use.
    ///
    /// A caller that queued behind a load which then failed receives that failure
    /// instead of starting another retry cycle.
    pub async fn get(&self) -> Result<Arc<ScoringModel>, ModelUnavailable> {
        let requested = Instant::now();
        if let ModelSlot::Loaded(model) = &*self.slot.read().await {
            return Ok(Arc::clone(model));
        }

        let mut slot = self.slot.write().await;
        match &*slot {
            ModelSlot::Loaded(model) => return Ok(Arc::clone(model)),
            ModelSlot::Failed {
                reason, settled, ..
            } if *settled >= requested => {
                return Err(ModelUnavailable {
                    model_uri: self.loader.describe(),
                    reason: reason.clone(),
                });
            }
            ModelSlot::Uninitialized | ModelSlot::Failed { .. } => {}
        }

        match self.load_with_retry().await {
            Ok(model) => {
                let model = Arc::new(model);
                let metadata = model.metadata();
                info!(
                    model_uri = %metadata.model_uri,
                    backend = %metadata.backend,
                    version = ?metadata.version,
                    features = metadata.num_features,
                    "scoring model loaded"
                );
                *slot = ModelSlot::Loaded(Arc::clone(&model));
                Ok(model)
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(source = %self.loader.describe(), %reason, "scoring model unavailable");
                *slot = ModelSlot::Failed {
                    reason: reason.clone(),
                    failed_at: Utc::now(),
                    settled: Instant::now(),
                };
                Err(ModelUnavailable {
                    model_uri: self.loader.describe(),
                    reason,
                })
            }
        }
    }

    /// Readiness runs the same load-or-fail path as scoring.
    pub async fn is_ready(&self) -> bool {
        self.get().await.is_ok()
    }

    /// Drop the cached model so the next `get` loads it again.
    pub async fn reset(&self) {
        let mut slot = self.slot.write().await;
        *slot = ModelSlot::Uninitialized;
        info!(source = %self.loader.describe(), "scoring model cache reset");
    }

    pub async fn reload(&self) -> Result<Arc<ScoringModel>, ModelUnavailable> {
        self.reset().await;
        self.get().await
    }

    pub async fn status(&self) -> ProviderStatus {
        match &*self.slot.read().await {
            ModelSlot::Uninitialized => ProviderStatus::Uninitialized,
            ModelSlot::Loaded(model) => ProviderStatus::Loaded(model.metadata().clone()),
            ModelSlot::Failed {
                reason, failed_at, ..
            } => ProviderStatus::Failed {
                reason: reason.clone(),
                failed_at: *failed_at,
            },
        }
    }

    /// Number of times the loader has been invoked, across retries and reloads.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::Acquire)
    }

    async fn load_with_retry(&self) -> Result<ScoringModel, ModelLoadError> {
        let timeout = self.retry.timeout;
        let loader = &self.loader;
        let counter = &self.load_attempts;

        Retry::start(self.retry.delays(), || {
            let loader = Arc::clone(loader);
            async move {
                let attempt = counter.fetch_add(1, Ordering::AcqRel) + 1;
                let task = tokio::task::spawn_blocking(move || loader.load());
                let result = match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join)) => Err(ModelLoadError::Interrupted(join.to_string())),
                    Err(_) => Err(ModelLoadError::TimedOut(timeout)),
                };
                if let Err(err) = &result {
                    warn!(attempt, error = %err, "model load attempt failed");
                }
                result
            }
        })
        .await
    }
}
