//! Request orchestration.
//!
//! Runs the reasoning loop, classifies its typed outcome, and either returns
//! the loop's answer, delegates to the fallback synthesizer, or returns a
//! fixed user-facing message. `answer` is the only operation callers may
//! depend on: it is total (never fails) and never surfaces raw provider
//! error text.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::agent::{LoopOutcome, ReasoningLoop};
use crate::capability::{Generator, Retriever};
use crate::config::QaConfig;
use crate::corpus::Corpus;
use crate::error::CapabilityError;
use crate::fallback::FallbackSynthesizer;

pub const EMPTY_QUERY_MESSAGE: &str =
    "Please enter a question about the Constitution of India or the Bharatiya Nyaya Sanhita.";

/// Returned on quota or rate pressure. The fallback path is skipped here on
/// purpose: it would issue further provider calls against an exhausted quota.
pub const RATE_LIMIT_MESSAGE: &str =
    "The answering service has hit its request limit with the language model \
     provider. Please wait a minute and try again.";

pub const TIMEOUT_MESSAGE: &str =
    "The request took too long to complete. Please try again with a shorter \
     or more specific question.";

pub const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong while answering your question. Please try again.";

/// The shared retrieval and generation handles. Read-only after construction;
/// safe for concurrent use by any number of in-flight requests.
pub struct Capabilities {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
}

/// Builds the capability handle. Construction may be expensive (index load,
/// HTTP client setup), so the orchestrator invokes it at most once.
#[async_trait]
pub trait CapabilityFactory: Send + Sync {
    async fn build(&self) -> anyhow::Result<Capabilities>;
}

pub struct Orchestrator {
    config: QaConfig,
    factory: Box<dyn CapabilityFactory>,
    capabilities: OnceCell<Arc<Capabilities>>,
}

impl Orchestrator {
    pub fn new(config: QaConfig, factory: Box<dyn CapabilityFactory>) -> Self {
        Self {
            config,
            factory,
            capabilities: OnceCell::new(),
        }
    }

    /// Answer one query. Total function: every path returns a non-empty
    /// string within the loop budget plus one fallback call's latency.
    pub async fn answer(&self, query: &str) -> String {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return EMPTY_QUERY_MESSAGE.to_string();
        }

        let caps = match self.capabilities().await {
            Ok(caps) => caps,
            Err(e) => {
                tracing::error!(error = %e, "capability construction failed");
                return GENERIC_APOLOGY.to_string();
            }
        };

        let outcome = ReasoningLoop::new(
            caps.generator.clone(),
            caps.retriever.clone(),
            self.config.reasoning.clone(),
            self.config.generation.reasoning_temperature,
        )
        .run(query)
        .await;

        let answer = self.resolve(query, &caps, outcome).await;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered query"
        );
        answer
    }

    /// Force capability construction and prime both corpus indexes so the
    /// first real query does not pay the cold-start cost. Failures are
    /// tolerated; the system warms on first query instead.
    pub async fn warmup(&self) {
        let caps = match self.capabilities().await {
            Ok(caps) => caps,
            Err(e) => {
                tracing::warn!(error = %e, "warmup: capability construction failed; will retry on first query");
                return;
            }
        };

        for (corpus, probe) in [(Corpus::Constitution, "preamble"), (Corpus::PenalCode, "section 1")]
        {
            if let Err(e) = caps.retriever.search(corpus, probe, 1).await {
                tracing::warn!(corpus = ?corpus, error = %e, "warmup probe failed");
            }
        }
        tracing::info!("warmup complete");
    }

    /// Lazily build the capability handle. Concurrent first requests are
    /// serialized by the once-guard so construction happens exactly once;
    /// a failed construction leaves the cell empty for the next request.
    async fn capabilities(&self) -> anyhow::Result<Arc<Capabilities>> {
        let caps = self
            .capabilities
            .get_or_try_init(|| async {
                tracing::info!("building retrieval and generation capabilities");
                self.factory.build().await.map(Arc::new)
            })
            .await?;
        Ok(caps.clone())
    }

    async fn resolve(&self, query: &str, caps: &Arc<Capabilities>, outcome: LoopOutcome) -> String {
        match outcome {
            LoopOutcome::Completed(answer) => {
                let answer = answer.trim();
                if answer.is_empty() || self.matches_early_stop_marker(answer) {
                    tracing::warn!("reasoning loop completed without a usable answer; falling back");
                    self.fallback(caps).synthesize(query).await
                } else {
                    answer.to_string()
                }
            }
            LoopOutcome::EarlyStopped(reason) => {
                tracing::warn!(reason = ?reason, "reasoning loop stopped early; falling back");
                self.fallback(caps).synthesize(query).await
            }
            LoopOutcome::Failed(err) => {
                if err.is_quota_pressure() {
                    tracing::warn!(error = %err, "provider under quota pressure; skipping fallback");
                    RATE_LIMIT_MESSAGE.to_string()
                } else if matches!(err, CapabilityError::Timeout) {
                    tracing::warn!(error = %err, "upstream call timed out");
                    TIMEOUT_MESSAGE.to_string()
                } else {
                    tracing::error!(error = %err, "reasoning loop failed");
                    GENERIC_APOLOGY.to_string()
                }
            }
        }
    }

    fn fallback(&self, caps: &Arc<Capabilities>) -> FallbackSynthesizer {
        FallbackSynthesizer::new(
            caps.retriever.clone(),
            caps.generator.clone(),
            self.config.fallback.clone(),
            self.config.generation.synthesis_temperature,
        )
    }

    fn matches_early_stop_marker(&self, answer: &str) -> bool {
        self.config
            .reasoning
            .early_stop_markers
            .iter()
            .any(|marker| answer.contains(marker.as_str()))
    }
}
