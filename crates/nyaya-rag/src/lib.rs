//! nyaya-rag — retrieval-augmented legal question answering core.
//!
//! Answers natural-language questions about the Constitution of India and
//! the Bharatiya Nyaya Sanhita, 2023 by interleaving LLM generation with
//! semantic retrieval over the two corpora. The public surface is
//! [`Orchestrator::answer`]: a total function that runs a bounded reasoning
//! loop, classifies its typed outcome, and degrades to single-shot grounded
//! synthesis (or a fixed message) instead of ever failing.
//!
//! Retrieval and generation are injected behind the [`Retriever`] and
//! [`Generator`] traits via a [`CapabilityFactory`]; the factory runs at most
//! once per orchestrator, guarded against concurrent first requests. A
//! concrete Gemini-backed generator is provided; index construction and
//! persistence belong to the embedding application.

pub mod agent;
pub mod capability;
pub mod config;
pub mod corpus;
pub mod error;
pub mod fallback;
pub mod orchestrator;

// Re-export primary types for convenience
pub use agent::{LoopOutcome, ReasoningLoop, StopReason};
pub use capability::{GeminiGenerator, Generator, Retriever};
pub use config::QaConfig;
pub use corpus::{Corpus, Passage};
pub use error::CapabilityError;
pub use fallback::FallbackSynthesizer;
pub use orchestrator::{Capabilities, CapabilityFactory, Orchestrator};
