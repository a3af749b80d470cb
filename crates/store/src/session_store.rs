//! Chat-to-session persistence for chat adapters.
//!
//! A chat adapter keeps one dialogue session id per chat so a follow-up
//! message continues the same session. The map is held in memory and
//! flushed to a JSON object file on every mutation. A missing or corrupt
//! file starts empty; a failed flush is logged and the in-memory map stays
//! authoritative.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SessionStore {
    path: PathBuf,
    sessions: Arc<RwLock<BTreeMap<String, String>>>,
}

impl SessionStore {
    /// Load the store from `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = Self::read_file(&path).await;
        info!(path = %path.display(), count = sessions.len(), "Sessions loaded");
        Self {
            path,
            sessions: Arc::new(RwLock::new(sessions)),
        }
    }

    async fn read_file(path: &Path) -> BTreeMap<String, String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read sessions");
                return BTreeMap::new();
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse sessions");
                return BTreeMap::new();
            }
        };

        // Values are stringified the same way keys are.
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect(),
            _ => {
                warn!(path = %path.display(), "Sessions file is not a JSON object");
                BTreeMap::new()
            }
        }
    }

    async fn flush(&self) {
        let content = {
            let sessions = self.sessions.read().await;
            match serde_json::to_string_pretty(&*sessions) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize sessions");
                    return;
                }
            }
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            warn!(path = %self.path.display(), error = %e, "Failed to create sessions directory");
            return;
        }

        if let Err(e) = tokio::fs::write(&self.path, content).await {
            warn!(path = %self.path.display(), error = %e, "Failed to save sessions");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, chat_id: &str) -> Option<String> {
        self.sessions.read().await.get(chat_id).cloned()
    }

    pub async fn set(&self, chat_id: impl Into<String>, session_id: impl Into<String>) {
        let chat_id = chat_id.into();
        let session_id = session_id.into();
        debug!(chat_id = %chat_id, session_id = %session_id, "Session recorded");
        self.sessions.write().await.insert(chat_id, session_id);
        self.flush().await;
    }

    /// Forget the session of a chat. Returns whether one existed.
    pub async fn clear(&self, chat_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(chat_id).is_some();
        if removed {
            self.flush().await;
        }
        removed
    }

    /// All `(chat_id, session_id)` pairs, ordered by chat id.
    pub async fn list(&self) -> Vec<(String, String)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.json");

        let store = SessionStore::load(&path).await;
        assert!(store.get("oc_1").await.is_none());
        store.set("oc_1", "sess-a").await;
        store.set("oc_2", "sess-b").await;

        let reloaded = SessionStore::load(&path).await;
        assert_eq!(reloaded.get("oc_1").await.as_deref(), Some("sess-a"));
        assert_eq!(
            reloaded.list().await,
            vec![
                ("oc_1".to_string(), "sess-a".to_string()),
                ("oc_2".to_string(), "sess-b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn clear_removes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let store = SessionStore::load(&path).await;
        store.set("oc_1", "sess-a").await;

        assert!(store.clear("oc_1").await);
        assert!(!store.clear("oc_1").await);
        assert!(SessionStore::load(&path).await.list().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::load(&path).await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn non_string_values_are_stringified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, r#"{"oc_1": 42}"#).unwrap();

        let store = SessionStore::load(&path).await;
        assert_eq!(store.get("oc_1").await.as_deref(), Some("42"));
    }
}
