use anyhow::Result;

use super::{print_request_detail, print_request_row, AppContext, Command};
use crate::requests::{RequestId, Stage};

/// Lists one stage tab, or every tab in order
pub struct ListCommand {
    pub stage: Option<Stage>,
}

impl Command for ListCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let stages: Vec<Stage> = match self.stage {
            Some(stage) => vec![stage],
            None => Stage::ALL.to_vec(),
        };

        for stage in stages {
            let requests = ctx.engine.list_by_stage(stage).await?;
            println!("📋 {} ({})", stage, requests.len());
            println!("────────────────────");
            for request in &requests {
                print_request_row(request);
            }
            println!();
        }
        Ok(())
    }
}

pub struct ShowCommand {
    pub id: RequestId,
}

impl Command for ShowCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let request = ctx.engine.get(self.id).await?;
        let viewer = match ctx.user {
            Some(_) => Some(ctx.actor().await?),
            None => None,
        };
        print_request_detail(&request, viewer.as_ref());
        Ok(())
    }
}

pub struct StatusCommand;

impl Command for StatusCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        println!("🛠️  SHOP WORKFLOW STATUS");
        println!("========================");
        println!("   State: {}", ctx.state_dir.display());
        println!();

        let summary = ctx.engine.stage_summary().await?;
        let open: usize = summary
            .iter()
            .filter(|(stage, _)| !stage.is_terminal())
            .map(|(_, count)| count)
            .sum();

        for (stage, count) in &summary {
            let marker = if stage.is_terminal() { "⚪" } else if *count > 0 { "🟡" } else { "🟢" };
            println!("{marker} {:<18} {count}", stage.as_str());
        }
        println!();
        println!("💼 Open requests: {open}");
        Ok(())
    }
}
