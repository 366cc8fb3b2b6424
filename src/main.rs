use anyhow::Result;
use clap::Parser;

use shop_workflow::cli::commands::{
    list::{ListCommand, ShowCommand, StatusCommand},
    show_how_to_get_started,
    submit::SubmitCommand,
    transition::{AdvanceCommand, NotesCommand, TransitionCommand},
    AppContext, Command,
};
use shop_workflow::cli::{Cli, Commands};
use shop_workflow::requests::Action;
use shop_workflow::{config, init_telemetry, shutdown_telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;

    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let Some(command) = cli.command else {
        return show_how_to_get_started();
    };

    let ctx = AppContext::build(config, cli.state_dir, cli.user).await?;
    let result = dispatch(command, &ctx).await;

    shutdown_telemetry();
    result
}

async fn dispatch(command: Commands, ctx: &AppContext) -> Result<()> {
    match command {
        Commands::Submit(args) => {
            SubmitCommand::new(
                args.customer_name,
                args.customer_email,
                args.project_file_name,
                args.comments,
                args.project.into(),
            )
            .execute(ctx)
            .await
        }
        Commands::List { stage } => ListCommand { stage }.execute(ctx).await,
        Commands::Show { id } => ShowCommand { id }.execute(ctx).await,
        Commands::Status => StatusCommand.execute(ctx).await,
        Commands::Assign { id, technician } => {
            TransitionCommand {
                id,
                action: Action::Assign { technician },
            }
            .execute(ctx)
            .await
        }
        Commands::Reassign { id, technician } => {
            TransitionCommand {
                id,
                action: Action::Reassign { technician },
            }
            .execute(ctx)
            .await
        }
        Commands::Start { id } => {
            TransitionCommand {
                id,
                action: Action::Start,
            }
            .execute(ctx)
            .await
        }
        Commands::Ready { id } => {
            TransitionCommand {
                id,
                action: Action::MarkReady,
            }
            .execute(ctx)
            .await
        }
        Commands::AddToCart { id } => {
            TransitionCommand {
                id,
                action: Action::AddToCart,
            }
            .execute(ctx)
            .await
        }
        Commands::Advance { id, technician } => AdvanceCommand { id, technician }.execute(ctx).await,
        Commands::Cancel { id, reason } => {
            TransitionCommand {
                id,
                action: Action::Cancel { reason },
            }
            .execute(ctx)
            .await
        }
        Commands::Notes { id, text } => NotesCommand { id, text }.execute(ctx).await,
    }
}
