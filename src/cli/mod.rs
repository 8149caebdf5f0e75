use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(about = "Sequential stage verification for product batches")]
#[command(long_about = "Stagegate walks a product batch through an ordered catalog of verification \
                       stages. Each stage is opened in order and approved, rejected or flagged by a \
                       reviewer. Start with 'stagegate status <batch>' to see where a batch stands.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured stage types in order
    Catalog,
    /// Show a batch's stages, progress and next stage
    Status {
        /// Batch identifier
        batch: String,
    },
    /// Open the next verification stage of a batch
    Create {
        /// Batch identifier
        batch: String,
        /// Stage type to create (must be the batch's next stage)
        #[arg(help = "Stage type: harvest, processing, packaging, shipping, delivery")]
        stage: String,
        /// Where the stage takes place
        #[arg(long, help = "Free-text location of the stage")]
        location: Option<String>,
        /// Notes recorded with the stage
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve a pending stage
    Approve {
        batch: String,
        stage_id: String,
        #[arg(long, help = "Optional reviewer notes")]
        notes: Option<String>,
    },
    /// Reject a pending stage
    Reject {
        batch: String,
        stage_id: String,
        #[arg(long, help = "Reason for the rejection (required)")]
        notes: String,
    },
    /// Flag a pending stage for follow-up
    Flag {
        batch: String,
        stage_id: String,
        #[arg(long, help = "What needs follow-up (required)")]
        notes: String,
    },
}
