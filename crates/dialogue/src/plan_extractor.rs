//! Best-effort plan extraction from free-form capability output.
//!
//! Sources are tried in order:
//!
//! 1. JSON objects inside fenced code blocks
//! 2. JSON objects embedded anywhere in the prose
//! 3. `Title:` / `Description:` / `Subtasks:` markers followed by list items
//!
//! Nothing here returns an error. Text without a recognizable plan yields
//! `None`.

use disclaude_core::{PlanSubtask, TaskPlan};
use serde_json::{Map, Value};

const TITLE_MAX_CHARS: usize = 80;
const SUBTASK_KEYS: [&str; 4] = ["subtasks", "steps", "tasks", "sub_tasks"];
/// Upper bound on `{` positions probed, so pathological input stays linear-ish.
const MAX_OBJECT_PROBES: usize = 64;

/// Extract a [`TaskPlan`] from `text`, or `None` if no plan is identifiable.
///
/// `original_request` fills in a missing title or description.
pub fn extract_plan(text: &str, original_request: &str, task_id: &str) -> Option<TaskPlan> {
    let draft = fenced_blocks(text)
        .iter()
        .find_map(|block| draft_from_json_text(block))
        .or_else(|| draft_from_json_text(text))
        .or_else(|| draft_from_markers(text))?;
    Some(draft.into_plan(task_id, original_request))
}

#[derive(Debug, Default)]
struct PlanDraft {
    title: Option<String>,
    description: Option<String>,
    subtasks: Vec<(String, String)>,
}

impl PlanDraft {
    fn into_plan(self, task_id: &str, original_request: &str) -> TaskPlan {
        let title = self
            .title
            .unwrap_or_else(|| fallback_title(original_request));
        let description = self
            .description
            .unwrap_or_else(|| original_request.trim().to_string());
        let subtasks = self
            .subtasks
            .into_iter()
            .enumerate()
            .map(|(i, (title, description))| PlanSubtask {
                sequence: i + 1,
                title,
                description,
            })
            .collect();
        TaskPlan::new(task_id, original_request, title, description, subtasks)
    }
}

fn fallback_title(original_request: &str) -> String {
    let first = original_request
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled task");
    first.chars().take(TITLE_MAX_CHARS).collect()
}

// --- fenced code blocks ---

fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some((fence, body)) = &mut current {
            if trimmed == *fence {
                blocks.push(body.join("\n"));
                current = None;
            } else {
                body.push(line);
            }
            continue;
        }
        if trimmed.starts_with("```") {
            current = Some(("```", Vec::new()));
        } else if trimmed.starts_with("~~~") {
            current = Some(("~~~", Vec::new()));
        }
    }

    // An unterminated fence still holds whatever was emitted.
    if let Some((_, body)) = current {
        blocks.push(body.join("\n"));
    }
    blocks
}

// --- embedded JSON ---

fn draft_from_json_text(text: &str) -> Option<PlanDraft> {
    let found = text
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .take(MAX_OBJECT_PROBES)
        .filter_map(|(start, _)| balanced_object_at(text, start))
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(obj)) => draft_from_object(&obj),
            _ => None,
        });
    if found.is_some() {
        return found;
    }

    // Widest span, for objects whose strings confuse the brace matcher.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(obj)) => draft_from_object(&obj),
        _ => None,
    }
}

/// The `{...}` starting at byte `start`, matched with string awareness.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let tail = text.get(start..)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in tail.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return tail.get(..offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn draft_from_object(obj: &Map<String, Value>) -> Option<PlanDraft> {
    if let Some(Value::Object(inner)) = obj.get("plan")
        && let Some(draft) = draft_from_object(inner)
    {
        return Some(draft);
    }

    let title = string_field(obj, &["title"]);
    let description = string_field(obj, &["description", "summary", "overview"]);
    let items = SUBTASK_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array));

    if title.is_none() && items.is_none() {
        return None;
    }

    let subtasks = items
        .map(|items| items.iter().filter_map(subtask_from_value).collect())
        .unwrap_or_default();

    Some(PlanDraft {
        title,
        description,
        subtasks,
    })
}

fn subtask_from_value(value: &Value) -> Option<(String, String)> {
    match value {
        Value::String(s) => non_empty(s).map(|t| (t, String::new())),
        Value::Object(obj) => {
            let title = string_field(obj, &["title", "name", "task", "step"]);
            let description = string_field(obj, &["description", "details"]);
            match (title, description) {
                (Some(t), d) => Some((t, d.unwrap_or_default())),
                (None, Some(d)) => Some((d, String::new())),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).and_then(non_empty))
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// --- explicit markers ---

fn draft_from_markers(text: &str) -> Option<PlanDraft> {
    let mut draft = PlanDraft::default();
    let mut in_list = false;

    for raw in text.lines() {
        let line = normalize_marker_line(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(value) = marker_value(&line, &["title", "plan title"]) {
            if draft.title.is_none() {
                draft.title = non_empty(&value);
            }
            in_list = false;
            continue;
        }
        if let Some(value) = marker_value(&line, &["description", "summary"]) {
            if draft.description.is_none() {
                draft.description = non_empty(&value);
            }
            in_list = false;
            continue;
        }
        if marker_value(&line, &["subtasks", "sub-tasks", "steps", "tasks"]).is_some() {
            in_list = true;
            continue;
        }

        if in_list {
            if let Some(item) = list_item(&line) {
                draft.subtasks.push((item, String::new()));
                continue;
            }
            in_list = false;
        }
    }

    if draft.title.is_none() && draft.subtasks.is_empty() {
        return None;
    }
    Some(draft)
}

/// Strip heading hashes and bold markers.
fn normalize_marker_line(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('#')
        .replace("**", "")
        .trim()
        .to_string()
}

fn marker_value(line: &str, names: &[&str]) -> Option<String> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim().to_ascii_lowercase();
    names
        .iter()
        .any(|name| *name == key)
        .then(|| value.trim().to_string())
}

fn list_item(line: &str) -> Option<String> {
    match line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        Some(rest) => non_empty(
            rest.trim_start_matches("[ ] ")
                .trim_start_matches("[x] "),
        ),
        None => numbered_item(line),
    }
}

/// The text of a `1. item` or `1) item` line.
pub(crate) fn numbered_item(line: &str) -> Option<String> {
    let line = line.trim();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let after = line.get(digits..)?;
    let rest = after
        .strip_prefix(". ")
        .or_else(|| after.strip_prefix(") "))?;
    non_empty(&rest.replace("**", ""))
}
