use anyhow::Result;
use clap::Parser;

use stagegate::cli::commands::{
    catalog::CatalogCommand, create::CreateCommand, decide::DecideCommand,
    show_how_to_get_started, status::StatusCommand, Command,
};
use stagegate::cli::{Cli, Commands};
use stagegate::verification::StageAction;
use stagegate::{config, init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config()?;
    init_telemetry(&config.observability)?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            None => show_how_to_get_started().await,
            Some(Commands::Catalog) => CatalogCommand::new().execute().await,
            Some(Commands::Status { batch }) => StatusCommand::new(batch).execute().await,
            Some(Commands::Create {
                batch,
                stage,
                location,
                notes,
            }) => {
                CreateCommand::new(batch, stage)
                    .with_location(location)
                    .with_notes(notes)
                    .execute()
                    .await
            }
            Some(Commands::Approve {
                batch,
                stage_id,
                notes,
            }) => {
                DecideCommand::new(batch, stage_id, StageAction::Approve)
                    .with_notes(notes)
                    .execute()
                    .await
            }
            Some(Commands::Reject {
                batch,
                stage_id,
                notes,
            }) => {
                DecideCommand::new(batch, stage_id, StageAction::Reject)
                    .with_notes(Some(notes))
                    .execute()
                    .await
            }
            Some(Commands::Flag {
                batch,
                stage_id,
                notes,
            }) => {
                DecideCommand::new(batch, stage_id, StageAction::Flag)
                    .with_notes(Some(notes))
                    .execute()
                    .await
            }
        }
    });

    if config.observability.metrics_enabled {
        shutdown_telemetry();
    }
    result
}
