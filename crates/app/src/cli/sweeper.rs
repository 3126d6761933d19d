use clap::{Args, Subcommand};
use storefront_app::{
    config::{DatabaseConfig, SweeperConfig},
    shutdown,
    sweeper::UnpaidOrdersSweeper,
};
use tokio_util::sync::CancellationToken;

use super::connect;

#[derive(Debug, Args)]
pub(crate) struct SweeperCommand {
    #[command(subcommand)]
    command: SweeperSubcommand,
}

#[derive(Debug, Subcommand)]
enum SweeperSubcommand {
    /// Delete expired unpaid orders until interrupted
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    sweeper: SweeperConfig,
}

pub(crate) async fn run(command: SweeperCommand) -> Result<(), String> {
    match command.command {
        SweeperSubcommand::Run(args) => run_sweeper(args).await,
    }
}

async fn run_sweeper(args: RunArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;
    let token = CancellationToken::new();

    let signals = tokio::spawn(shutdown::listen(token.clone()));

    UnpaidOrdersSweeper::new(ctx.orders, args.sweeper.settings(), token.clone())
        .run()
        .await;

    // The sweeper only returns once the listener has cancelled the token.
    match signals.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(format!("failed to listen for shutdown signals: {error}")),
        Err(error) => Err(format!("shutdown signal listener stopped: {error}")),
    }
}
