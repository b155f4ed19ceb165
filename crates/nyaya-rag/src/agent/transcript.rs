//! Reasoning transcript and prompt rendering.
//!
//! Holds the (thought, action, observation) steps of one request and renders
//! them into the prompt sent to the model at each iteration. The transcript
//! lives for a single request and is never shared.

use crate::corpus::Corpus;

pub struct Transcript {
    query: String,
    steps: Vec<Step>,
}

struct Step {
    /// Raw model output for the step (thought plus action lines).
    model_text: String,
    /// Tool result or corrective notice fed back to the model.
    observation: String,
}

impl Transcript {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn push_step(&mut self, model_text: String, observation: String) {
        self.steps.push(Step {
            model_text,
            observation,
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render the full prompt: instructions, tool listing, the question, and
    /// the scratchpad of prior steps.
    pub fn render(&self) -> String {
        let tools = Corpus::ALL
            .iter()
            .map(|c| format!("{}: {}", c.tool_id(), c.tool_description()))
            .collect::<Vec<_>>()
            .join("\n");
        let tool_names = Corpus::ALL
            .iter()
            .map(|c| c.tool_id())
            .collect::<Vec<_>>()
            .join(", ");

        let mut scratchpad = String::new();
        for step in &self.steps {
            scratchpad.push_str(step.model_text.trim());
            scratchpad.push_str("\nObservation: ");
            scratchpad.push_str(step.observation.trim());
            scratchpad.push_str("\nThought: ");
        }

        format!(
            "Answer the following question as best you can. You have access to the following tools:\n\n\
             {tools}\n\n\
             Use the following format:\n\n\
             Question: the input question you must answer\n\
             Thought: you should always think about what to do\n\
             Action: the action to take, should be one of [{tool_names}]\n\
             Action Input: the input to the action\n\
             Observation: the result of the action\n\
             ... (this Thought/Action/Action Input/Observation can repeat N times)\n\
             Thought: I now know the final answer\n\
             Final Answer: the final answer to the original input question\n\n\
             Begin!\n\n\
             Question: {query}\n\
             Thought: {scratchpad}",
            tools = tools,
            tool_names = tool_names,
            query = self.query,
            scratchpad = scratchpad,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_both_tools() {
        let prompt = Transcript::new("What is Article 21?").render();
        assert!(prompt.contains("constitution_search"));
        assert!(prompt.contains("penal_code_search"));
        assert!(prompt.contains("Question: What is Article 21?"));
    }

    #[test]
    fn test_render_appends_steps_in_order() {
        let mut transcript = Transcript::new("q");
        transcript.push_step(
            "Thought: check A\nAction: constitution_search\nAction Input: a".to_string(),
            "passage one".to_string(),
        );
        transcript.push_step(
            "Thought: check B\nAction: penal_code_search\nAction Input: b".to_string(),
            "passage two".to_string(),
        );

        let prompt = transcript.render();
        let first = prompt.find("passage one").unwrap();
        let second = prompt.find("passage two").unwrap();
        assert!(first < second);
        assert!(prompt.ends_with("Thought: "));
    }
}
