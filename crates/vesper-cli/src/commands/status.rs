//! Status command implementation

use anyhow::Result;
use vesper_core::{ModelGateway, PromptId, PromptLibrary, ProviderConfig, StoreConfig, StoreKind};

/// Mask all but the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}

pub async fn cmd_status() -> Result<()> {
    let provider = ProviderConfig::from_env();
    let store = StoreConfig::from_env();

    println!();
    println!("📊 Vesper Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Provider
    println!("   AI backend: {}", provider.backend.as_str());
    println!("   Host: {}", provider.host.as_deref().unwrap_or("(not set)"));
    println!("   Model: {}", provider.model.as_deref().unwrap_or("(not set)"));
    println!("   Embedding model: {}", provider.embedding_model);
    match provider.api_key {
        Some(ref key) => println!("   🔑 API key: {}", mask_secret(key)),
        None => println!("   🔑 API key: (not set)"),
    }

    let missing = provider.missing();
    if missing.is_empty() {
        let gateway = ModelGateway::new(provider);
        if gateway.health_check().await {
            println!("   ✅ Provider reachable");
        } else {
            println!("   ⚠️  Provider configured but not responding");
        }
    } else {
        println!("   ❌ Missing: {}", missing.join(", "));
    }

    // Store
    println!();
    match store.kind {
        StoreKind::Postgrest => {
            println!("   Row store: PostgREST");
            println!("   URL: {}", store.url.as_deref().unwrap_or("(SUPABASE_URL not set)"));
            if store.key.is_none() {
                println!("   ❌ SUPABASE_KEY not set");
            }
        }
        StoreKind::Memory => println!("   Row store: in-memory"),
    }

    // Prompts
    println!();
    match PromptLibrary::from_env() {
        Ok(library) => {
            for &id in PromptId::all() {
                let source = if library.get(id).is_override() {
                    "override"
                } else {
                    "default"
                };
                println!("   Prompt {}: {}", id.as_str(), source);
            }
        }
        Err(e) => println!("   ❌ Error loading prompt overrides: {}", e),
    }

    println!();
    Ok(())
}
