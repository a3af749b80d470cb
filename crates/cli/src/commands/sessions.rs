//! `disclaude sessions` — The chat-to-session map.

use disclaude_config::AppConfig;
use disclaude_store::SessionStore;

async fn open() -> Result<SessionStore, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(SessionStore::load(&config.workspace.sessions_file).await)
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = open().await?;
    let sessions = store.list().await;

    if sessions.is_empty() {
        println!("No sessions recorded in {}", store.path().display());
        return Ok(());
    }
    for (chat_id, session_id) in sessions {
        println!("{chat_id}\t{session_id}");
    }
    Ok(())
}

pub async fn clear(chat_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open().await?;
    if store.clear(chat_id).await {
        println!("Cleared session for {chat_id}");
    } else {
        println!("No session recorded for {chat_id}");
    }
    Ok(())
}
