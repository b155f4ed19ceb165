//! Capability seams consumed by the reasoning loop and fallback synthesizer.
//!
//! Retrieval and generation are injected behind traits so the orchestration
//! core never depends on a concrete index or provider. The crate ships one
//! concrete generator (Google Gemini over HTTP); index ownership stays with
//! the collaborator that builds and persists it.

use async_trait::async_trait;

use crate::corpus::{Corpus, Passage};
use crate::error::CapabilityError;

pub mod google;

pub use google::GeminiGenerator;

/// Similarity search over one of the persisted corpus indexes.
///
/// Implementations must be idempotent and side-effect-free from the caller's
/// perspective. Safe to share across concurrent requests behind an `Arc`.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        corpus: Corpus,
        query: &str,
        k: usize,
    ) -> Result<Vec<Passage>, CapabilityError>;
}

/// Text generation from a prompt.
///
/// The prompt may be a rendered reasoning transcript or a flat synthesis
/// prompt; implementations must not distinguish the two. Stateless per call.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, CapabilityError>;
}
