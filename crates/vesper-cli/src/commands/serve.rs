//! Server command implementation

use anyhow::{Context, Result};
use vesper_core::{PromptLibrary, ProviderConfig, StoreConfig, StoreKind};
use vesper_server::{AppState, ServerConfig};

pub async fn cmd_serve(host: &str, port: u16, store: Option<StoreKind>) -> Result<()> {
    let mut store_config = StoreConfig::from_env();
    if let Some(kind) = store {
        store_config.kind = kind;
    }
    let provider = ProviderConfig::from_env();
    let server_config = ServerConfig::from_env();

    println!("🚀 Starting Vesper web server...");
    println!("   Listening: http://{}:{}", host, port);
    match store_config.kind {
        StoreKind::Postgrest => println!(
            "   Row store: PostgREST ({})",
            store_config.url.as_deref().unwrap_or("SUPABASE_URL not set")
        ),
        StoreKind::Memory => {
            println!("   Row store: in-memory");
            println!("   ⚠️  Entries are lost when the server stops");
        }
    }
    println!("   AI backend: {}", provider.backend.as_str());
    let missing = provider.missing();
    if !missing.is_empty() {
        println!("   ⚠️  Missing {}: entries will get fallback analysis", missing.join(", "));
    }
    println!("   CORS origins: {}", server_config.allowed_origins.join(", "));
    println!();
    println!("   Press Ctrl+C to stop");

    let prompts = PromptLibrary::from_env().context("Failed to load prompts")?;
    let state = AppState::from_config(provider, &store_config, prompts, server_config)
        .context("Failed to configure row store")?;

    vesper_server::serve(state, host, port).await
}
