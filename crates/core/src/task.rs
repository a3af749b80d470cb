//! Task specification documents.
//!
//! A task specification is a small Markdown file written when a request is
//! accepted and read once when its dialogue starts:
//!
//! ~~~text
//! # Task: write hello.txt
//!
//! **Task ID**: om_123
//! **Chat ID**: oc_456
//! **User ID**: ou_789
//! **Created**: 2026-10-18T09:00:00Z
//!
//! ## Original Request
//!
//! ```
//! write hello.txt
//! ```
//! ~~~

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TaskSpecError;

const REQUEST_HEADING: &str = "Original Request";

/// An immutable task specification, read once at loop start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpecification {
    pub task_id: String,

    pub original_request: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// The full document text, handed verbatim to the capabilities.
    #[serde(default)]
    pub document: String,
}

impl TaskSpecification {
    /// Build a specification for a new request.
    pub fn new(task_id: impl Into<String>, original_request: impl Into<String>) -> Self {
        let mut spec = Self {
            task_id: task_id.into(),
            original_request: original_request.into(),
            chat_id: None,
            user_id: None,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
            document: String::new(),
        };
        spec.document = spec.render();
        spec
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self.document = self.render();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.document = self.render();
        self
    }

    /// Read and parse a specification file.
    pub async fn load(path: &Path) -> Result<Self, TaskSpecError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TaskSpecError::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        let spec = Self::parse(path, &content)?;
        tracing::debug!(task_id = %spec.task_id, path = %path.display(), "Task specification loaded");
        Ok(spec)
    }

    /// Parse a specification document. `path` supplies the task id when the
    /// document does not name one.
    pub fn parse(path: &Path, content: &str) -> Result<Self, TaskSpecError> {
        let mut explicit_id = None;
        let mut chat_id = None;
        let mut user_id = None;
        let mut created_at = None;
        let mut request_lines: Vec<&str> = Vec::new();
        let mut in_request = false;
        let mut open_fence: Option<usize> = None;

        for line in content.lines() {
            let trimmed = line.trim();

            // Headings inside a fenced request body are part of the request.
            if in_request {
                if let Some(open) = open_fence {
                    if is_closing_fence(trimmed, open) {
                        open_fence = None;
                    }
                    request_lines.push(line);
                    continue;
                }
                if let Some(len) = fence_len(trimmed) {
                    open_fence = Some(len);
                    request_lines.push(line);
                    continue;
                }
            }

            if let Some(heading) = trimmed.strip_prefix("## ") {
                in_request = heading.trim().eq_ignore_ascii_case(REQUEST_HEADING);
                continue;
            }

            if in_request {
                request_lines.push(line);
                continue;
            }

            if let Some((key, value)) = parse_header_line(trimmed) {
                let value = Some(value.to_string());
                match key.to_ascii_lowercase().as_str() {
                    "task id" => explicit_id = value,
                    "chat id" => chat_id = value,
                    "user id" => user_id = value,
                    "created" => created_at = value,
                    _ => {}
                }
            }
        }

        let original_request = strip_fence(&request_lines.join("\n"));
        if original_request.is_empty() {
            return Err(TaskSpecError::MissingField {
                path: path.to_path_buf(),
                field: REQUEST_HEADING,
            });
        }

        let task_id = match explicit_id {
            Some(id) => id,
            None => task_id_from_path(path).ok_or_else(|| TaskSpecError::NoTaskId {
                path: path.to_path_buf(),
            })?,
        };

        Ok(Self {
            task_id,
            original_request,
            chat_id,
            user_id,
            created_at,
            document: content.to_string(),
        })
    }

    /// Render the specification back to its Markdown form.
    pub fn render(&self) -> String {
        let title: String = self
            .original_request
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(60)
            .collect();

        let mut doc = format!("# Task: {title}\n\n**Task ID**: {}\n", self.task_id);
        if let Some(chat_id) = &self.chat_id {
            doc.push_str(&format!("**Chat ID**: {chat_id}\n"));
        }
        if let Some(user_id) = &self.user_id {
            doc.push_str(&format!("**User ID**: {user_id}\n"));
        }
        if let Some(created) = &self.created_at {
            doc.push_str(&format!("**Created**: {created}\n"));
        }
        let fence = "`".repeat(longest_backtick_run(&self.original_request).max(2) + 1);
        doc.push_str(&format!(
            "\n## {REQUEST_HEADING}\n\n{fence}\n{}\n{fence}\n",
            self.original_request
        ));
        doc
    }
}

/// `**Key**: value` or `- **Key**: value`.
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let line = line.strip_prefix("- ").unwrap_or(line);
    let rest = line.strip_prefix("**")?;
    let (key, value) = rest.split_once("**")?;
    let value = value.strip_prefix(':')?.trim();
    if value.is_empty() {
        None
    } else {
        Some((key.trim(), value))
    }
}

/// Length of the backtick run opening a fence line, if it is one.
fn fence_len(line: &str) -> Option<usize> {
    let len = line.chars().take_while(|c| *c == '`').count();
    (len >= 3).then_some(len)
}

fn is_closing_fence(line: &str, open: usize) -> bool {
    fence_len(line).is_some_and(|len| len >= open) && line.chars().all(|c| c == '`')
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

/// Drop a surrounding code fence, if the section body is fenced.
fn strip_fence(body: &str) -> String {
    let trimmed = body.trim();
    let Some(open) = fence_len(trimmed) else {
        return trimmed.to_string();
    };
    // Skip the info string on the opening fence line.
    let inner = trimmed.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let inner = inner.trim_end();
    let (head, last) = inner.rsplit_once('\n').unwrap_or(("", inner));
    let inner = if is_closing_fence(last.trim(), open) {
        head
    } else {
        inner
    };
    inner.trim().to_string()
}

/// The file stem, or the parent directory name for a generic `Task.md`.
fn task_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem.eq_ignore_ascii_case("task") {
        let dir = path.parent()?.file_name()?.to_str()?;
        return Some(dir.to_string());
    }
    Some(stem.to_string())
}
