//! Prompt text for the tutoring nodes.
//!
//! System prompts are fixed strings; per-call instruction blocks are
//! assembled from state. JSON-mode prompts spell out the exact keys the
//! [`outputs`](super::outputs) types expect, so parsing stays in lockstep
//! with what the model is asked for.

/// System prompt for breaking a learning request into goals.
pub const GOALS_SYSTEM: &str = "You are a tutor planning a study session. \
Break the student's request into a short list of concrete learning goals, \
ordered from foundational to advanced. Each goal is one sentence the \
student could check off. Respond with a JSON object: \
{\"goals\": [\"...\"]}.";

/// System prompt for naming a freshly created thread.
pub const TITLE_SYSTEM: &str = "Name this conversation after the topic \
being studied. Respond with the title only: at most five words, no \
quotes, no trailing punctuation.";

/// System prompt for deriving knowledge-base queries from the goals.
pub const QUERIES_SYSTEM: &str = "You write search queries against the \
student's personal knowledge base. Given their learning goals, produce up \
to four short queries that would surface notes relevant to this session. \
Respond with a JSON object: {\"queries\": [\"...\"]}.";

/// System prompt for deciding whether more background context is needed.
pub const ASSESS_SYSTEM: &str = "You are a careful tutor. Decide whether \
more background context is needed to explain the learning goals simply. \
Respond with a JSON object: {\"needs_more_context\": true|false, \
\"focus\": \"what to look up next\"}.";

/// System prompt for the research call that fills a context gap.
pub const RESEARCH_SYSTEM: &str = "You research study material. Answer \
with a compact summary a tutor could teach from, in plain prose.";

/// System prompt for judging the learner's own explanation.
pub const FEYNMAN_SYSTEM: &str = "You are a tutor using the Feynman \
technique: a concept counts as mastered when the student can explain it \
simply, in their own words, without hidden jargon or gaps. Examine their \
explanation for correctness and simplicity. Instead of lecturing on \
mistakes, ask short Socratic questions that lead the student to find \
them. Praise explanations that are clear and correct.";

/// Research focus used when the assessment did not name one.
pub const DEFAULT_FOCUS: &str =
    "key definitions, core intuition, and one concrete example";

fn bullet_list(items: &[String]) -> String {
    let mut out = String::new();
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
    out
}

/// System prompt for the main tutoring reply, anchored to the session's
/// goals and accumulated background knowledge.
#[must_use]
pub fn learning_system(goals: &[String], knowledge: &[String]) -> String {
    let mut prompt = String::from(
        "You are a tutor guiding a discovery, not delivering a lecture. \
         Anchor every explanation to what the student already knows, using \
         analogies and direct comparisons to familiar ideas. Break complex \
         ideas into small steps with concrete examples, and after each key \
         point ask one guiding question that bridges to the next concept.\n",
    );
    if !goals.is_empty() {
        prompt.push_str("\nLearning goals for this session:\n");
        prompt.push_str(&bullet_list(goals));
    }
    if !knowledge.is_empty() {
        prompt.push_str("\nBackground knowledge to anchor to:\n");
        prompt.push_str(&bullet_list(knowledge));
    }
    prompt.push_str(
        "\nRespond with a JSON object: {\"reply\": \"your tutoring \
         reply\", \"mastered\": true|false}, where mastered reports \
         whether the student has now demonstrated command of the goals.",
    );
    prompt
}

/// Instruction block for the context assessment call.
#[must_use]
pub fn assess_instruction(goals: &[String], knowledge: &[String]) -> String {
    let knowledge_block = if knowledge.is_empty() {
        "<none>".to_string()
    } else {
        knowledge.join("\n")
    };
    format!(
        "Learning goals:\n{}\nCurrent background knowledge:\n{knowledge_block}",
        bullet_list(goals)
    )
}

/// Instruction block for deriving queries from the goals.
#[must_use]
pub fn queries_instruction(goals: &[String]) -> String {
    format!("Learning goals:\n{}", bullet_list(goals))
}

/// Text-mode research prompt over one goal and a focus.
#[must_use]
pub fn research_prompt(target: &str, focus: &str) -> String {
    format!(
        "Provide a concise, beginner-friendly explanation of '{target}'. \
         Focus on: {focus}. Summarize in a short paragraph."
    )
}

/// Instruction appended to the history for the evaluation call.
#[must_use]
pub fn evaluate_instruction(target: &str) -> String {
    format!(
        "Evaluate the student's most recent explanation for correctness \
         and simplicity. Target concept: {target}. Respond with a JSON \
         object: {{\"mastered\": true|false, \"feedback\": \"...\"}}. If \
         mastered, praise and keep it concise."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_system_embeds_goals_and_knowledge() {
        let goals = vec!["identify the base case".to_string()];
        let knowledge = vec!["stacks grow per call".to_string()];
        let prompt = learning_system(&goals, &knowledge);
        assert!(prompt.contains("- identify the base case"));
        assert!(prompt.contains("- stacks grow per call"));
        assert!(prompt.contains("\"mastered\""));
    }

    #[test]
    fn assess_instruction_marks_missing_knowledge() {
        let goals = vec!["explain recursion".to_string()];
        let block = assess_instruction(&goals, &[]);
        assert!(block.contains("<none>"));
    }

    #[test]
    fn research_prompt_names_target_and_focus() {
        let prompt = research_prompt("recursion", DEFAULT_FOCUS);
        assert!(prompt.contains("'recursion'"));
        assert!(prompt.contains("core intuition"));
    }
}
