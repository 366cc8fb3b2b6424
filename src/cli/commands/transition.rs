use anyhow::{bail, Result};

use super::{print_request_detail, AppContext, Command};
use crate::requests::{Action, ActionKind, RequestId, Stage};

/// Applies one explicit workflow action
pub struct TransitionCommand {
    pub id: RequestId,
    pub action: Action,
}

impl Command for TransitionCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let actor = ctx.actor().await?;
        let before = ctx.engine.get(self.id).await?.status;
        let request = ctx
            .engine
            .apply_action(self.id, self.action.clone(), &actor)
            .await?;

        report(before, request.status);
        print_request_detail(&request, Some(&actor));
        Ok(())
    }
}

/// "Change status": run whatever the current stage's primary action is
pub struct AdvanceCommand {
    pub id: RequestId,
    pub technician: Option<String>,
}

impl AdvanceCommand {
    fn action_for(&self, stage: Stage) -> Result<Action> {
        let Some(kind) = stage.primary_action() else {
            bail!("Request is {stage} and cannot move any further");
        };
        Ok(match kind {
            ActionKind::Assign => match &self.technician {
                Some(technician) => Action::Assign {
                    technician: technician.clone(),
                },
                None => bail!("Request is UNFULFILLED; pass --technician to assign it"),
            },
            ActionKind::Start => Action::Start,
            ActionKind::MarkReady => Action::MarkReady,
            ActionKind::AddToCart => Action::AddToCart,
            ActionKind::Reassign | ActionKind::Cancel => {
                bail!("{} is never a primary action", kind.label())
            }
        })
    }
}

impl Command for AdvanceCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let actor = ctx.actor().await?;
        let before = ctx.engine.get(self.id).await?.status;
        let action = self.action_for(before)?;
        let request = ctx.engine.apply_action(self.id, action, &actor).await?;

        report(before, request.status);
        print_request_detail(&request, Some(&actor));
        Ok(())
    }
}

pub struct NotesCommand {
    pub id: RequestId,
    pub text: Option<String>,
}

impl Command for NotesCommand {
    async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let actor = ctx.actor().await?;
        let request = ctx.engine.amend_notes(self.id, self.text.clone(), &actor).await?;

        println!("📝 Technician notes updated");
        print_request_detail(&request, Some(&actor));
        Ok(())
    }
}

fn report(before: Stage, after: Stage) {
    if before == after {
        println!("ℹ️  Request stays {after}");
    } else {
        println!("✅ {before} → {after}");
    }
}
