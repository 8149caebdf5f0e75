use anyhow::Result;

use super::{print_stage_set, report, status_emoji, with_board, Command};
use crate::verification::{StageAction, StageId};

/// Approve, reject or flag one stage
pub struct DecideCommand {
    pub batch: String,
    pub stage_id: String,
    pub action: StageAction,
    pub notes: Option<String>,
}

impl DecideCommand {
    pub fn new(batch: impl Into<String>, stage_id: impl Into<String>, action: StageAction) -> Self {
        Self {
            batch: batch.into(),
            stage_id: stage_id.into(),
            action,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

impl Command for DecideCommand {
    async fn execute(&self) -> Result<()> {
        let stage_id = StageId::new(self.stage_id.trim());
        let target = self.action.target_status();

        with_board(&self.batch, |board| async move {
            print!("{} Marking stage {} as {}... ", status_emoji(target), stage_id, target);
            std::io::Write::flush(&mut std::io::stdout()).ok();

            let set = board
                .decide(&stage_id, self.action, self.notes.clone())
                .await
                .map_err(|e| {
                    println!();
                    if e.already_reached(target) {
                        println!("ℹ️  Stage {stage_id} is already {target}");
                    }
                    report(e)
                })?;
            println!("✅");
            println!();
            print_stage_set(&set);
            Ok(())
        })
        .await
    }
}
