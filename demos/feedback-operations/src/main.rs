//! Walks through every feedback-memory operation against a throwaway store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::try_join_all;
use self_learner::{EmbeddingBackend, LearnerConfig, SelectionBackend, SelfLearner};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Feedback memory walkthrough
#[derive(Parser)]
#[command(name = "feedback-operations")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Store file used by the walkthrough (cleared on start)
    #[arg(long, default_value = "feedback_operations_memory.json", value_name = "FILE")]
    memory: PathBuf,

    /// Where the export step writes its copy
    #[arg(long, default_value = "exported_memory.json", value_name = "FILE")]
    export: PathBuf,

    /// Embedding backend: minilm, hashed or openai
    #[arg(long, env = "SELF_LEARNER_EMBEDDING", default_value = "minilm")]
    embedding: String,

    /// Selection backend: none or openai
    #[arg(long, env = "SELF_LEARNER_SELECTION", default_value = "none")]
    selection: String,

    /// Keep the export file instead of removing it at the end
    #[arg(long)]
    keep_export: bool,
}

const MARKETING_EMAIL: &str = "Write a marketing email";
const HEADPHONES: &str = "Write product description for headphones";
const SHIPPING_EMAIL: &str = "Write an email to a customer about delayed shipping";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = LearnerConfig::builder()
        .storage_path(&cli.memory)
        .clear_on_start(true)
        .embedding_backend(cli.embedding.parse::<EmbeddingBackend>()?)
        .selection_backend(cli.selection.parse::<SelectionBackend>()?)
        .verbose_selection(true)
        .build()?;
    let learner = SelfLearner::new(config).context("failed to start the self-learner")?;

    info!("--- Saving sample feedback ---");
    learner.save_feedback(MARKETING_EMAIL, "Keep it short and include a clear call to action")?;
    learner.save_feedback(HEADPHONES, "Highlight noise cancellation and battery life")?;
    learner.save_feedback(SHIPPING_EMAIL, "Apologize clearly and offer compensation")?;

    info!("--- All feedback ---");
    print_records(&learner.list_all_feedback());

    info!("--- Feedback for {MARKETING_EMAIL:?} ---");
    print_records(&learner.list_feedback(MARKETING_EMAIL));

    info!("--- Feedback whose task contains \"email\" ---");
    print_records(&learner.list_feedback_substring("email"));

    info!("--- Exporting to {} ---", cli.export.display());
    learner.export_memory(&cli.export)?;

    info!("--- Removing feedback #1 ---");
    let removed = learner.remove_feedback(1)?;
    info!(task = removed.task(), "removed");
    print_records(&learner.list_all_feedback());

    info!("--- Removing feedback for {SHIPPING_EMAIL:?} ---");
    let count = learner.remove_feedback_for_task(SHIPPING_EMAIL)?;
    info!(count, "removed");
    print_records(&learner.list_all_feedback());

    info!("--- Resetting memory ---");
    learner.reset_memory()?;
    print_records(&learner.list_all_feedback());

    info!("--- Importing from {} ---", cli.export.display());
    let imported = learner.import_memory(&cli.export)?;
    info!(imported, "memory restored");
    print_records(&learner.list_all_feedback());

    info!("--- Applying feedback ---");
    let prompt = learner.apply_feedback(
        "Write a short marketing email",
        "You are a helpful marketing assistant.",
    )?;
    info!("Enhanced prompt:\n{prompt}");

    tokio::runtime::Runtime::new()?.block_on(concurrent_saves(&learner))?;

    if !cli.keep_export {
        remove_export(&cli.export)?;
    }
    info!("Done!");
    Ok(())
}

/// The async API lets independent saves run side by side.
async fn concurrent_saves(learner: &SelfLearner) -> Result<()> {
    info!("--- Saving feedback concurrently ---");
    let pending = [
        ("Write a newsletter intro", "Open with a question"),
        ("Write a newsletter outro", "End with one link only"),
    ]
    .map(|(task, feedback)| learner.save_feedback_async(task, feedback));
    let saved = try_join_all(pending).await?;
    info!(saved = saved.len(), total = learner.len(), "concurrent saves stored");

    let prompt = learner
        .apply_feedback_async("Write a newsletter intro", "You write newsletters.")
        .await?;
    info!("Enhanced prompt:\n{prompt}");
    Ok(())
}

fn print_records(records: &[(usize, self_learner::FeedbackRecord)]) {
    if records.is_empty() {
        info!("(no feedback stored)");
    }
    for (index, record) in records {
        info!("[{index}] {} -> {}", record.task(), record.feedback());
    }
}

fn remove_export(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        info!("Removed {}", path.display());
    }
    Ok(())
}
