//! Prompt composition for the Evaluator and Planner/Executor roles.
//!
//! Each iteration's evaluation prompt carries the task specification and
//! the captured output of the immediately preceding iteration, nothing
//! older. Earlier iterations reach the evaluator only through whatever the
//! executor chose to repeat.

use std::fmt::Write;

use disclaude_core::TaskSpecification;

/// System prompt for the Planner/Executor role.
pub const EXECUTOR_SYSTEM_PROMPT: &str = "\
You are the executor in an evaluate-then-execute loop. Carry out the \
guidance you are given using the tools available to you. Work inside the \
workspace, report what you changed, and say plainly when something failed.";

/// System prompt for the Evaluator role.
pub fn evaluator_system_prompt(completion_tool: &str) -> String {
    format!(
        "You are the evaluator in an evaluate-then-execute loop. Compare the \
         task with the latest execution output and decide whether the task is \
         complete. If it is, call the `{completion_tool}` tool with a short \
         summary and nothing else. If it is not, give the executor concise, \
         concrete instructions for the next step."
    )
}

/// Prompt for the evaluator on `iteration`.
///
/// On iteration 1 there is no previous output and the evaluator is asked
/// for an initial plan, as a JSON object in a fenced code block.
pub fn build_evaluation_prompt(
    spec: &TaskSpecification,
    iteration: u32,
    previous_output: Option<&str>,
    completion_tool: &str,
) -> String {
    let mut prompt = task_section(spec, iteration);

    match previous_output {
        None => {
            prompt.push_str(
                "## Planning\n\n\
                 Nothing has been executed yet. Break the task down and reply \
                 with a plan in a fenced JSON block:\n\n\
                 ```json\n\
                 {\"title\": \"...\", \"description\": \"...\", \
                 \"subtasks\": [{\"title\": \"...\", \"description\": \"...\"}]}\n\
                 ```\n\n\
                 Then give the executor its first instructions.\n",
            );
        }
        Some(output) => {
            let output = output.trim();
            let _ = write!(
                prompt,
                "## Output of iteration {}\n\n{}\n\n",
                iteration.saturating_sub(1),
                if output.is_empty() {
                    "(the executor produced no output)"
                } else {
                    output
                }
            );
            let _ = writeln!(
                prompt,
                "## Decision\n\nIf the task is complete, call `{completion_tool}`. \
                 Otherwise, tell the executor what to do next."
            );
        }
    }

    prompt
}

/// Prompt for the executor on `iteration`, carrying this iteration's
/// evaluator output as guidance.
pub fn build_execution_prompt(spec: &TaskSpecification, iteration: u32, guidance: &str) -> String {
    let mut prompt = task_section(spec, iteration);
    let guidance = guidance.trim();
    if guidance.is_empty() {
        prompt.push_str("## Instructions\n\nWork on the task directly.\n");
    } else {
        let _ = writeln!(prompt, "## Instructions from the evaluator\n\n{guidance}");
    }
    prompt
}

fn task_section(spec: &TaskSpecification, iteration: u32) -> String {
    let mut section = format!("# Task {}\n\nIteration: {iteration}\n\n", spec.task_id);
    let document = spec.document.trim();
    if document.is_empty() {
        let _ = write!(
            section,
            "## Original Request\n\n{}\n\n",
            spec.original_request.trim()
        );
    } else {
        let _ = write!(section, "## Task Specification\n\n{document}\n\n");
    }
    section
}
