//! Parsing of a reasoning step's raw output into a tool action or a final
//! answer declaration.

use std::sync::LazyLock;

static ACTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?s)Action\s*:\s*(.*?)\s*Action\s*Input\s*:\s*(.*)")
        .expect("action regex is valid")
});

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Corrective observation fed back to the model after an unparseable step.
pub const FORMAT_CORRECTION: &str =
    "Invalid format. Reply with either a tool step (an `Action:` line naming one \
     available tool and an `Action Input:` line with the search query) or with \
     `Final Answer:` followed by your answer.";

/// One parsed reasoning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    /// The model asked to run a retrieval tool.
    Action { tool: String, input: String },
    /// The model declared its final answer.
    FinalAnswer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepParseError {
    /// Neither an action nor a final answer was found.
    Unrecognized,
    /// Both an action and a final answer were present; intent is ambiguous.
    Ambiguous,
}

/// Parse the model's step output.
///
/// A step is either a tool action (`Action:` + `Action Input:`) or a final
/// answer (`Final Answer:`). A step containing both is rejected rather than
/// guessed at.
pub fn parse_step(output: &str) -> Result<AgentStep, StepParseError> {
    let action = ACTION_RE.captures(output);
    let final_idx = output.find(FINAL_ANSWER_MARKER);

    match (action, final_idx) {
        (Some(_), Some(_)) => Err(StepParseError::Ambiguous),
        (Some(caps), None) => Ok(AgentStep::Action {
            tool: caps[1].trim().to_string(),
            input: clean_action_input(&caps[2]),
        }),
        (None, Some(idx)) => Ok(AgentStep::FinalAnswer(
            output[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string(),
        )),
        (None, None) => Err(StepParseError::Unrecognized),
    }
}

/// Trim an action input down to the actual query: drop any hallucinated
/// `Observation:` continuation and surrounding quotes.
fn clean_action_input(raw: &str) -> String {
    let raw = raw.split("\nObservation").next().unwrap_or(raw);
    raw.trim().trim_matches('"').trim().to_string()
}
