//! Model backend health command

use std::path::Path;

use anyhow::{Context, Result};
use ledgersort_core::{AIBackend, AIClient};

use super::{load_config, Overrides};

/// Report which backend is configured and whether it answers
pub async fn cmd_health(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path, &Overrides::default())?;

    println!("🔍 Checking model backend...\n");
    println!("  Configured backend: {}", config.model.backend);

    let Some(client) =
        AIClient::from_config(&config.model).context("Failed to configure model backend")?
    else {
        println!("  ⚠️  No model backend available");
        println!();
        println!("Dictionary matching still works; unresolved transactions stay uncategorized.");
        println!("To enable the model stage, set one of:");
        println!("  ANTHROPIC_API_KEY=...                              (anthropic)");
        println!("  AI_BACKEND=ollama OLLAMA_HOST=http://localhost:11434");
        println!("  AI_BACKEND=openai_compatible OPENAI_COMPATIBLE_HOST=...");
        return Ok(());
    };

    if check_backend(&client).await {
        println!("\n✅ Model backend is reachable");
    } else {
        println!("\n❌ Model backend did not respond");
    }

    Ok(())
}

/// Print backend details and run its health check
pub async fn check_backend(client: &AIClient) -> bool {
    let info = client.info();
    println!("  Backend: {}", info.backend);
    println!("  Model:   {}", info.model);
    println!("  Host:    {}", info.host);

    print!("  Status:  ");
    let healthy = client.health_check().await;
    println!("{}", if healthy { "✓ healthy" } else { "✗ unreachable" });
    healthy
}
