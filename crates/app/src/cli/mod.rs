use clap::{Parser, Subcommand};
use storefront_app::{
    config::{DatabaseConfig, LoggingConfig},
    context::AppContext,
};

mod db;
mod order;
mod product;
mod sweeper;
mod user;

#[derive(Debug, Parser)]
#[command(name = "storefront-app", about = "Storefront CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    User(user::UserCommand),
    Product(product::ProductCommand),
    Order(order::OrderCommand),
    Sweeper(sweeper::SweeperCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::User(command) => user::run(command).await,
            Commands::Product(command) => product::run(command).await,
            Commands::Order(command) => order::run(command).await,
            Commands::Sweeper(command) => sweeper::run(command).await,
            Commands::Db(command) => db::run(command).await,
        }
    }
}

async fn connect(database: &DatabaseConfig) -> Result<AppContext, String> {
    AppContext::from_database_url(&database.database_url)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))
}
