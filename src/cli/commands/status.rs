use anyhow::Result;

use super::{print_stage_set, with_board, Command};

pub struct StatusCommand {
    pub batch: String,
}

impl StatusCommand {
    pub fn new(batch: impl Into<String>) -> Self {
        Self {
            batch: batch.into(),
        }
    }
}

impl Command for StatusCommand {
    async fn execute(&self) -> Result<()> {
        with_board(&self.batch, |board| async move {
            println!();
            if let Some(set) = board.state().stage_set {
                print_stage_set(&set);
                let pending = set.pending_stages().count();
                if pending > 0 {
                    println!("   👀 {pending} stage(s) awaiting review");
                }
            }
            Ok(())
        })
        .await
    }
}
