//! Fallback synthesizer: single-shot grounded generation.
//!
//! Used when the reasoning loop does not cleanly complete. Retrieves from
//! both corpora, builds one bounded context block, and makes a single
//! generation call with a strict grounding instruction. This is the terminal
//! error boundary of the system: `synthesize` never fails outward.

use std::sync::Arc;

use crate::capability::{Generator, Retriever};
use crate::config::FallbackSettings;
use crate::corpus::{Corpus, Passage};
use crate::error::CapabilityError;

/// Returned when even the fallback path cannot produce an answer.
pub const FALLBACK_APOLOGY: &str =
    "Sorry, I could not find an answer to your query right now. Please try \
     rephrasing your question or ask again in a moment.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub struct FallbackSynthesizer {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    settings: FallbackSettings,
    temperature: f32,
}

impl FallbackSynthesizer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        settings: FallbackSettings,
        temperature: f32,
    ) -> Self {
        Self {
            retriever,
            generator,
            settings,
            temperature,
        }
    }

    /// Retrieve, ground, generate. Any failure is swallowed and replaced by
    /// the fixed apology string.
    pub async fn synthesize(&self, query: &str) -> String {
        match self.try_synthesize(query).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "fallback synthesis failed");
                FALLBACK_APOLOGY.to_string()
            }
        }
    }

    async fn try_synthesize(&self, query: &str) -> Result<String, CapabilityError> {
        let mut passages = Vec::new();
        let mut last_error = None;

        // Both corpora are queried independently; one failing corpus degrades
        // the context rather than aborting the whole attempt.
        for corpus in Corpus::ALL {
            match self
                .retriever
                .search(corpus, query, self.settings.passages_per_corpus)
                .await
            {
                Ok(mut found) => passages.append(&mut found),
                Err(e) => {
                    tracing::warn!(corpus = ?corpus, error = %e, "fallback retrieval failed");
                    last_error = Some(e);
                }
            }
        }

        if passages.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let context = build_context_block(&passages, self.settings.max_context_chars);
        let prompt = synthesis_prompt(query, &context);

        let answer = self.generator.generate(&prompt, self.temperature).await?;
        if answer.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(answer.trim().to_string())
    }
}

/// Concatenate passages into a single block hard-capped at `max_chars` bytes.
///
/// Earlier passages are always kept whole; the first passage that does not
/// fit is tail-truncated at a char boundary and everything after it is
/// dropped. Same inputs always produce the same block, byte for byte.
pub fn build_context_block(passages: &[Passage], max_chars: usize) -> String {
    let mut block = String::new();

    for passage in passages {
        let entry = format!("[{}] {}", passage.corpus.display_name(), passage.text.trim());
        let separator_len = if block.is_empty() {
            0
        } else {
            CONTEXT_SEPARATOR.len()
        };

        if block.len() + separator_len + entry.len() <= max_chars {
            if separator_len > 0 {
                block.push_str(CONTEXT_SEPARATOR);
            }
            block.push_str(&entry);
        } else {
            let remaining = max_chars.saturating_sub(block.len() + separator_len);
            if remaining > 0 {
                if separator_len > 0 {
                    block.push_str(CONTEXT_SEPARATOR);
                }
                block.push_str(truncate_at_char_boundary(&entry, remaining));
            }
            break;
        }
    }

    block
}

fn truncate_at_char_boundary(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// The grounding instruction here is a correctness contract: the model must
/// answer only from the excerpts and must say when they are insufficient.
fn synthesis_prompt(query: &str, context: &str) -> String {
    let context = if context.is_empty() {
        "No relevant excerpts were retrieved."
    } else {
        context
    };
    format!(
        "You are a legal assistant answering questions about the Constitution of India \
         and the Bharatiya Nyaya Sanhita, 2023.\n\n\
         Answer the question strictly from the excerpts below. Do not rely on outside \
         knowledge. If the excerpts do not contain enough information to answer, state \
         that explicitly.\n\n\
         === EXCERPTS ===\n{context}\n=== END EXCERPTS ===\n\n\
         Question: {query}\n\nAnswer:"
    )
}
