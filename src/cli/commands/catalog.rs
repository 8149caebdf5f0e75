use anyhow::Result;

use super::Command;
use crate::config::config;

pub struct CatalogCommand;

impl CatalogCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CatalogCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for CatalogCommand {
    async fn execute(&self) -> Result<()> {
        let catalog = config()?.stage_catalog()?;

        println!("📋 STAGE CATALOG");
        println!("────────────────");
        for (index, stage_type) in catalog.all_stage_types().iter().enumerate() {
            println!("  {}. {}", index + 1, stage_type);
        }
        println!();
        println!("💡 Stages are created in this order, one at a time");
        Ok(())
    }
}
