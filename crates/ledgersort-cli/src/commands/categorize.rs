//! Categorize command implementation

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use ledgersort_core::{
    export::{export_transactions, write_csv, write_json, ExportFormat},
    import::load_transactions,
    prompts::{PromptId, PromptLibrary},
    AIClient, CategorizationPipeline, PipelineConfig, PipelineOutput, PipelineStats,
};

use super::{load_config, open_store, Overrides};

pub async fn cmd_categorize(
    config_path: Option<&Path>,
    overrides: &Overrides,
    input: &Path,
    output: Option<&Path>,
    format: Option<&str>,
    no_model: bool,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;

    let client = if no_model {
        None
    } else {
        AIClient::from_config(&config.model).context("Failed to configure model backend")?
    };
    if client.is_none() && !no_model {
        eprintln!("💡 Tip: Set ANTHROPIC_API_KEY (or AI_BACKEND + host) to categorize leftovers with a model");
    }

    let format = resolve_format(format, output)?;
    let result = run_categorize(&config, input, client).await?;

    match output {
        Some(path) => {
            export_transactions(path, format, &result.transactions)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_stats(&mut std::io::stdout(), &result.stats)?;
            println!("✅ Wrote {} transactions to {}", result.stats.total, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            match format {
                ExportFormat::Csv => write_csv(&mut out, &result.transactions)?,
                ExportFormat::Json => {
                    write_json(&mut out, &result.transactions)?;
                    writeln!(out)?;
                }
            }
            print_stats(&mut std::io::stderr(), &result.stats)?;
        }
    }

    Ok(())
}

/// Load dictionaries and transactions, then run the pipeline
pub async fn run_categorize(
    config: &PipelineConfig,
    input: &Path,
    client: Option<AIClient>,
) -> Result<PipelineOutput> {
    let store = open_store(config)?;
    let transactions = load_transactions(input)
        .with_context(|| format!("Failed to load transactions from {}", input.display()))?;

    let mut pipeline = CategorizationPipeline::new(&store, config);
    if let Some(client) = client {
        let mut library = PromptLibrary::new();
        let prompt = library
            .get(PromptId::CategorizeTransactions)
            .context("Failed to load categorization prompt")?
            .clone();
        pipeline = pipeline.with_model(client, prompt, config);
    }

    Ok(pipeline.run(&transactions).await)
}

/// Explicit `--format` wins, then the output extension, then CSV
pub fn resolve_format(format: Option<&str>, output: Option<&Path>) -> Result<ExportFormat> {
    match (format, output) {
        (Some(f), _) => Ok(f.parse()?),
        (None, Some(path)) => Ok(ExportFormat::from_path(path)),
        (None, None) => Ok(ExportFormat::Csv),
    }
}

pub fn print_stats<W: Write>(out: &mut W, stats: &PipelineStats) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "📊 Categorization Results")?;
    writeln!(out, "   ─────────────────────────────")?;
    writeln!(out, "   Transactions:         {}", stats.total)?;
    writeln!(out, "   Industry dictionary:  {}", stats.industry_resolved)?;
    writeln!(out, "   General dictionary:   {}", stats.general_resolved)?;
    writeln!(out, "   Sent to model:        {}", stats.sent_to_model)?;
    writeln!(out, "   Model categorized:    {}", stats.model_resolved)?;
    writeln!(out, "   Unresolved:           {}", stats.unresolved)?;
    writeln!(out, "   Outside range:        {}", stats.outside_range)?;
    if stats.processing_errors > 0 {
        writeln!(out, "   ⚠️  Processing errors: {}", stats.processing_errors)?;
    }
    if stats.failed_batches > 0 {
        writeln!(
            out,
            "   ⚠️  Failed batches: {} of {}",
            stats.failed_batches, stats.batches
        )?;
    }
    Ok(())
}
