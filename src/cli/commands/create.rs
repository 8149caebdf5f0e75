use anyhow::{Context, Result};

use super::{print_stage_set, report, with_board, Command};
use crate::verification::StageType;

pub struct CreateCommand {
    pub batch: String,
    pub stage: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl CreateCommand {
    pub fn new(batch: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            batch: batch.into(),
            stage: stage.into(),
            location: None,
            notes: None,
        }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

impl Command for CreateCommand {
    async fn execute(&self) -> Result<()> {
        let stage_type: StageType = self
            .stage
            .parse()
            .with_context(|| format!("Choose one of: {}", stage_type_names()))?;

        with_board(&self.batch, |board| async move {
            print!("➕ Creating {stage_type} stage... ");
            std::io::Write::flush(&mut std::io::stdout()).ok();

            let set = board
                .create_stage(stage_type, self.location.clone(), self.notes.clone())
                .await
                .map_err(|e| {
                    println!();
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

fn stage_type_names() -> String {
    StageType::ALL
        .iter()
        .map(StageType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
