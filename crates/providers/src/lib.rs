//! LLM provider implementations for Disclaude.
//!
//! All providers implement the `disclaude_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use std::sync::Arc;

use disclaude_config::ResolvedAgent;
use disclaude_core::Provider;

/// Build the provider for the resolved agent backend.
pub fn from_resolved(agent: &ResolvedAgent) -> Arc<dyn Provider> {
    let mut provider =
        AnthropicProvider::new(agent.api_key.clone()).with_name(agent.provider.clone());
    if let Some(url) = &agent.base_url {
        provider = provider.with_base_url(url.clone());
    }
    tracing::info!(provider = %agent.provider, model = %agent.model, "Provider configured");
    Arc::new(provider)
}
