//! Reasoning loop: a bounded think/act/observe cycle.
//!
//! Each iteration sends the rendered transcript to the generator, parses the
//! reply into a tool action or a final answer, and on a tool action runs a
//! retrieval search and feeds the passages back as the observation. The loop
//! is bounded by an iteration cap, a wall-clock budget, and a tolerance for
//! consecutive unparseable steps; every termination is a typed [`LoopOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capability::{Generator, Retriever};
use crate::config::ReasoningSettings;
use crate::corpus::{Corpus, Passage};
use crate::error::CapabilityError;

pub mod parser;
pub mod transcript;

use parser::{parse_step, AgentStep, FORMAT_CORRECTION};
use transcript::Transcript;

/// Terminal result of one reasoning-loop run. The orchestrator's branching
/// depends entirely on this tag.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model declared a final answer.
    Completed(String),
    /// The loop stopped before a final answer was produced.
    EarlyStopped(StopReason),
    /// A capability failed; not retried inside the loop.
    Failed(CapabilityError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IterationLimit,
    TimeLimit,
    ParsingFailure,
}

/// Bounded iterative reasoning over the two retrieval tools.
///
/// Holds only shared read-only capability handles; safe to run concurrently
/// from many requests.
pub struct ReasoningLoop {
    generator: Arc<dyn Generator>,
    retriever: Arc<dyn Retriever>,
    settings: ReasoningSettings,
    temperature: f32,
}

impl ReasoningLoop {
    pub fn new(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        settings: ReasoningSettings,
        temperature: f32,
    ) -> Self {
        Self {
            generator,
            retriever,
            settings,
            temperature,
        }
    }

    /// Run the loop to completion for one query.
    ///
    /// The time budget is cooperative: it is checked before each iteration,
    /// so a single slow generation call can overrun it by one call's latency.
    pub async fn run(&self, query: &str) -> LoopOutcome {
        let started = Instant::now();
        let budget = Duration::from_secs(self.settings.time_budget_secs);
        let mut transcript = Transcript::new(query);
        let mut consecutive_parse_failures = 0usize;

        for iteration in 1..=self.settings.max_iterations {
            if started.elapsed() > budget {
                tracing::warn!(
                    iteration,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "reasoning loop exceeded its time budget"
                );
                return LoopOutcome::EarlyStopped(StopReason::TimeLimit);
            }

            tracing::debug!(iteration, steps = transcript.len(), "reasoning loop: generating");

            let raw = match self
                .generator
                .generate(&transcript.render(), self.temperature)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "generation failed inside reasoning loop");
                    return LoopOutcome::Failed(e);
                }
            };

            match parse_step(&raw) {
                Ok(AgentStep::FinalAnswer(answer)) => {
                    tracing::debug!(iteration, "reasoning loop completed");
                    return LoopOutcome::Completed(answer);
                }
                Ok(AgentStep::Action { tool, input }) => {
                    consecutive_parse_failures = 0;
                    let observation = match Corpus::from_tool_id(&tool) {
                        Some(corpus) => {
                            tracing::info!(iteration, corpus = ?corpus, "reasoning loop: tool call");
                            match self
                                .retriever
                                .search(corpus, &input, self.settings.passages_per_search)
                                .await
                            {
                                Ok(passages) => format_observation(&passages),
                                Err(e) => {
                                    tracing::warn!(iteration, corpus = ?corpus, error = %e, "retrieval failed inside reasoning loop");
                                    return LoopOutcome::Failed(e);
                                }
                            }
                        }
                        None => {
                            tracing::warn!(iteration, tool = %tool, "reasoning loop: unknown tool requested");
                            unknown_tool_notice(&tool)
                        }
                    };
                    transcript.push_step(raw, observation);
                }
                Err(parse_err) => {
                    consecutive_parse_failures += 1;
                    tracing::warn!(
                        iteration,
                        consecutive = consecutive_parse_failures,
                        error = ?parse_err,
                        "reasoning loop: unparseable step"
                    );
                    if consecutive_parse_failures >= self.settings.max_parse_failures {
                        return LoopOutcome::EarlyStopped(StopReason::ParsingFailure);
                    }
                    transcript.push_step(raw, FORMAT_CORRECTION.to_string());
                }
            }
        }

        tracing::warn!(
            max = self.settings.max_iterations,
            "reasoning loop hit its iteration limit"
        );
        LoopOutcome::EarlyStopped(StopReason::IterationLimit)
    }
}

/// Render retrieved passages as a single observation block.
fn format_observation(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return "No relevant passages found.".to_string();
    }
    passages
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn unknown_tool_notice(tool: &str) -> String {
    let known = Corpus::ALL
        .iter()
        .map(|c| c.tool_id())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Unknown tool '{}'. Available tools: {}.", tool, known)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn settings() -> ReasoningSettings {
        ReasoningSettings {
            max_iterations: 5,
            time_budget_secs: 30,
            max_parse_failures: 3,
            passages_per_search: 4,
            early_stop_markers: Vec::new(),
        }
    }

    /// Generator that replays a fixed script of step outputs.
    struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<String, CapabilityError>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
        last_prompt: Mutex<String>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<String, CapabilityError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
                delay: None,
                last_prompt: Mutex::new(String::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            _temperature: f32,
        ) -> Result<String, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("Final Answer: script exhausted".to_string()))
        }
    }

    struct StubRetriever {
        calls: AtomicUsize,
        last_search: Mutex<Option<(Corpus, String)>>,
        result: Result<Vec<Passage>, CapabilityError>,
    }

    impl StubRetriever {
        fn returning(passages: Vec<Passage>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_search: Mutex::new(None),
                result: Ok(passages),
            }
        }

        fn failing(err: CapabilityError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_search: Mutex::new(None),
                result: Err(err),
            }
        }
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn search(
            &self,
            corpus: Corpus,
            query: &str,
            _k: usize,
        ) -> Result<Vec<Passage>, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_search.lock().unwrap() = Some((corpus, query.to_string()));
            self.result.clone()
        }
    }

    fn action(tool: &str, input: &str) -> Result<String, CapabilityError> {
        Ok(format!(
            "Thought: let me search\nAction: {}\nAction Input: {}",
            tool, input
        ))
    }

    #[tokio::test]
    async fn test_completes_on_immediate_final_answer() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "Thought: I know this\nFinal Answer: Article 21 protects life and liberty.".to_string(),
        )]));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator.clone(), retriever.clone(), settings(), 0.0)
            .run("What is Article 21?")
            .await;

        match outcome {
            LoopOutcome::Completed(answer) => {
                assert_eq!(answer, "Article 21 protects life and liberty.")
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_call_feeds_observation_back() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            action("constitution_search", "right to life"),
            Ok("Final Answer: done".to_string()),
        ]));
        let retriever = Arc::new(StubRetriever::returning(vec![Passage::new(
            Corpus::Constitution,
            "Article 21. Protection of life and personal liberty.",
        )]));

        let outcome = ReasoningLoop::new(generator.clone(), retriever.clone(), settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(outcome, LoopOutcome::Completed(_)));
        let (corpus, query) = retriever.last_search.lock().unwrap().clone().unwrap();
        assert_eq!(corpus, Corpus::Constitution);
        assert_eq!(query, "right to life");
        // The second generation call must have seen the retrieved passage.
        let prompt = generator.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Protection of life and personal liberty"));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let generator = Arc::new(ScriptedGenerator::new(
            (0..10).map(|_| action("constitution_search", "x")).collect(),
        ));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator.clone(), retriever, settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(
            outcome,
            LoopOutcome::EarlyStopped(StopReason::IterationLimit)
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), settings().max_iterations);
    }

    #[tokio::test]
    async fn test_time_budget_stops_new_iterations() {
        let mut s = settings();
        s.time_budget_secs = 1;
        let generator = Arc::new(
            ScriptedGenerator::new(
                (0..10).map(|_| action("constitution_search", "x")).collect(),
            )
            .with_delay(Duration::from_millis(600)),
        );
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator, retriever, s, 0.0).run("q").await;

        assert!(matches!(
            outcome,
            LoopOutcome::EarlyStopped(StopReason::TimeLimit)
        ));
    }

    #[tokio::test]
    async fn test_consecutive_parse_failures_stop_the_loop() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("rambling without structure".to_string()),
            Ok("still no structure".to_string()),
            Ok("and again".to_string()),
        ]));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator.clone(), retriever, settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(
            outcome,
            LoopOutcome::EarlyStopped(StopReason::ParsingFailure)
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_parse_failure_counter_resets_on_valid_step() {
        // Two bad steps, a good tool step, two more bad steps: never three in
        // a row, so the loop ends via the iteration limit instead.
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("bad".to_string()),
            Ok("bad".to_string()),
            action("penal_code_search", "theft"),
            Ok("bad".to_string()),
            Ok("bad".to_string()),
        ]));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator, retriever, settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(
            outcome,
            LoopOutcome::EarlyStopped(StopReason::IterationLimit)
        ));
    }

    #[tokio::test]
    async fn test_generation_error_fails_the_loop() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(
            CapabilityError::QuotaExceeded,
        )]));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator, retriever.clone(), settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(
            outcome,
            LoopOutcome::Failed(CapabilityError::QuotaExceeded)
        ));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieval_error_fails_the_loop() {
        let generator = Arc::new(ScriptedGenerator::new(vec![action(
            "constitution_search",
            "x",
        )]));
        let retriever = Arc::new(StubRetriever::failing(CapabilityError::Network(
            "connection reset".to_string(),
        )));
        let outcome = ReasoningLoop::new(generator, retriever, settings(), 0.0)
            .run("q")
            .await;

        assert!(matches!(
            outcome,
            LoopOutcome::Failed(CapabilityError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_corrected_not_fatal() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            action("web_search", "x"),
            Ok("Final Answer: recovered".to_string()),
        ]));
        let retriever = Arc::new(StubRetriever::returning(vec![]));
        let outcome = ReasoningLoop::new(generator.clone(), retriever.clone(), settings(), 0.0)
            .run("q")
            .await;

        match outcome {
            LoopOutcome::Completed(answer) => assert_eq!(answer, "recovered"),
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        let prompt = generator.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Unknown tool 'web_search'"));
    }

    #[test]
    fn test_format_observation_empty_and_nonempty() {
        assert_eq!(format_observation(&[]), "No relevant passages found.");
        let passages = vec![
            Passage::new(Corpus::Constitution, "first"),
            Passage::new(Corpus::Constitution, "second"),
        ];
        assert_eq!(format_observation(&passages), "first\n\nsecond");
    }
}
