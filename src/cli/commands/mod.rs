use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::config;
use crate::facade::StageBoard;
use crate::repository::FileStageRepository;
use crate::verification::{BatchId, BatchStageSet, StageStatus, WorkflowError, WorkflowOrchestrator};

pub mod catalog;
pub mod create;
pub mod decide;
pub mod status;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Open the configured store, load `batch` and hand the board to `f`
pub async fn with_board<F, Fut, R>(batch: &str, f: F) -> Result<R>
where
    F: FnOnce(StageBoard) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let batch_id = BatchId::new(batch).map_err(report)?;
    let config = config()?;
    let catalog = config.stage_catalog()?;
    let repository = Arc::new(FileStageRepository::new(config.store.path.clone()));
    let orchestrator = Arc::new(WorkflowOrchestrator::new(repository, catalog));
    let board = StageBoard::new(orchestrator, batch_id);

    print!("🔄 Loading batch {}... ", board.batch_id());
    std::io::Write::flush(&mut std::io::stdout()).ok();

    match board.refresh().await {
        Ok(_) => {
            println!("✅");
            f(board).await
        }
        Err(e) => {
            println!("❌");
            Err(report(e)).with_context(|| format!("store: {}", config.store.path.display()))
        }
    }
}

/// Print the operator-facing message and keep the full error for the exit status
pub fn report(err: WorkflowError) -> anyhow::Error {
    println!("❌ {}", err.user_message());
    if err.is_retryable() {
        println!("   💡 This may be temporary, try again shortly");
    }
    anyhow::Error::new(err)
}

pub fn status_emoji(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "⏳",
        StageStatus::Approved => "✅",
        StageStatus::Rejected => "❌",
        StageStatus::Flagged => "🚩",
    }
}

pub fn print_stage_set(set: &BatchStageSet) {
    println!("📦 BATCH {}", set.batch_id());
    println!("──────────────────────");
    if set.stages().is_empty() {
        println!("📭 No stages yet");
    }
    for stage in set.stages() {
        println!(
            "{} {:<10} {:<8} {}",
            status_emoji(stage.status),
            stage.stage_type,
            stage.status,
            stage.id
        );
        if let Some(location) = &stage.location {
            println!("   📍 {location}");
        }
        if let Some(notes) = &stage.notes {
            println!("   📝 {notes}");
        }
    }
    println!();
    println!(
        "📊 Progress: {}% ({}/{} approved)",
        set.progress_percent(),
        set.approved_count(),
        set.total_stage_types()
    );
    match set.next_stage_type() {
        Some(next) => println!("➡️  Next stage: {next}"),
        None if set.is_complete() => println!("🎉 All stages approved"),
        None => println!("⏳ Waiting on decisions for the remaining stages"),
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🌾 Stagegate - Sequential Stage Verification");
    println!();
    println!("To get started:");
    println!("  📋 stagegate catalog                    # List stage types in order");
    println!("  📊 stagegate status <batch>             # See a batch's progress");
    println!("  ➕ stagegate create <batch> <stage>     # Open the next stage");
    println!();
    println!("Reviewer commands:");
    println!("  ✅ stagegate approve <batch> <stage-id>");
    println!("  ❌ stagegate reject <batch> <stage-id> --notes <reason>");
    println!("  🚩 stagegate flag <batch> <stage-id> --notes <reason>");
    Ok(())
}
