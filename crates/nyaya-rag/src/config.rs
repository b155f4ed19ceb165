//! Crate configuration: budgets, retrieval depths, temperatures, and the
//! early-stop marker allowlist. All budgets are fixed at configuration time;
//! nothing is derived per request.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    pub generation: GenerationSettings,
    pub reasoning: ReasoningSettings,
    pub fallback: FallbackSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Model name passed to the generation provider.
    pub model: String,
    /// Sampling temperature for reasoning-loop steps.
    pub reasoning_temperature: f32,
    /// Sampling temperature for fallback synthesis.
    pub synthesis_temperature: f32,
    pub max_output_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSettings {
    /// Maximum generation round-trips before the loop gives up.
    pub max_iterations: usize,
    /// Wall-clock budget in seconds, checked before each iteration.
    pub time_budget_secs: u64,
    /// Consecutive unparseable generation outputs tolerated before the loop
    /// stops with a parsing failure.
    pub max_parse_failures: usize,
    /// Passages returned per retrieval tool call.
    pub passages_per_search: usize,
    /// Phrases that mark a nominally-completed answer as an early stop in
    /// disguise. Checked verbatim against the final answer; configurable
    /// rather than hard-coded because the set is observational, not closed.
    pub early_stop_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSettings {
    /// Passages retrieved from each corpus for the synthesis context.
    pub passages_per_corpus: usize,
    /// Hard cap on the synthesis context block, in bytes.
    pub max_context_chars: usize,
}

impl QaConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.generation.model.trim().is_empty() {
            return Err("generation.model must not be empty".into());
        }
        for (name, t) in [
            ("reasoning_temperature", self.generation.reasoning_temperature),
            ("synthesis_temperature", self.generation.synthesis_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("generation.{} must be in [0.0, 2.0]", name));
            }
        }
        if self.generation.max_output_tokens == 0 {
            return Err("generation.max_output_tokens must be > 0".into());
        }
        if self.reasoning.max_iterations == 0 {
            return Err("reasoning.max_iterations must be > 0".into());
        }
        if self.reasoning.time_budget_secs == 0 {
            return Err("reasoning.time_budget_secs must be > 0".into());
        }
        if self.reasoning.max_parse_failures == 0 {
            return Err("reasoning.max_parse_failures must be > 0".into());
        }
        if self.reasoning.passages_per_search == 0 {
            return Err("reasoning.passages_per_search must be > 0".into());
        }
        if self.fallback.passages_per_corpus == 0 {
            return Err("fallback.passages_per_corpus must be > 0".into());
        }
        if self.fallback.max_context_chars < 500 {
            return Err("fallback.max_context_chars must be >= 500".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings {
                model: "gemini-2.5-flash".to_string(),
                reasoning_temperature: 0.0,
                synthesis_temperature: 0.3,
                max_output_tokens: 2048,
            },
            reasoning: ReasoningSettings {
                max_iterations: 10,
                time_budget_secs: 60,
                max_parse_failures: 3,
                passages_per_search: 4,
                early_stop_markers: vec![
                    "Agent stopped due to iteration limit or time limit".to_string(),
                    "Agent stopped due to max iterations".to_string(),
                ],
            },
            fallback: FallbackSettings {
                passages_per_corpus: 4,
                max_context_chars: 6000,
            },
        }
    }
}
