use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use storefront_app::{
    config::DatabaseConfig,
    domain::users::{
        data::NewUser,
        records::{UserRecord, UserUuid},
    },
};

use super::connect;

#[derive(Debug, Args)]
pub(crate) struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Debug, Subcommand)]
enum UserSubcommand {
    /// Register a user with a zero balance
    Create(CreateUserArgs),

    /// Show a single user
    Get(GetUserArgs),

    /// List all users
    List(ListUsersArgs),

    /// Add funds to a user's balance
    Deposit(DepositArgs),
}

#[derive(Debug, Args)]
struct CreateUserArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    /// Unique user name
    #[arg(long)]
    name: String,

    /// Optional user UUID; generated when omitted
    #[arg(long)]
    user_uuid: Option<UserUuid>,
}

#[derive(Debug, Args)]
struct GetUserArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    user_uuid: UserUuid,
}

#[derive(Debug, Args)]
struct ListUsersArgs {
    #[command(flatten)]
    database: DatabaseConfig,
}

#[derive(Debug, Args)]
struct DepositArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    user_uuid: UserUuid,

    /// Amount to add, e.g. 25.00
    #[arg(long)]
    amount: Decimal,
}

pub(crate) async fn run(command: UserCommand) -> Result<(), String> {
    match command.command {
        UserSubcommand::Create(args) => create(args).await,
        UserSubcommand::Get(args) => get(args).await,
        UserSubcommand::List(args) => list(args).await,
        UserSubcommand::Deposit(args) => deposit(args).await,
    }
}

async fn create(args: CreateUserArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let user = ctx
        .users
        .create_user(NewUser {
            uuid: args.user_uuid.unwrap_or_default(),
            name: args.name,
        })
        .await
        .map_err(|error| format!("failed to create user: {error}"))?;

    print_user(&user);

    Ok(())
}

async fn get(args: GetUserArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let user = ctx
        .users
        .get_user(args.user_uuid)
        .await
        .map_err(|error| format!("failed to get user: {error}"))?;

    print_user(&user);

    Ok(())
}

async fn list(args: ListUsersArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let users = ctx
        .users
        .list_users()
        .await
        .map_err(|error| format!("failed to list users: {error}"))?;

    if users.is_empty() {
        println!("no users found");
        return Ok(());
    }

    for user in users {
        print_user(&user);
        println!();
    }

    Ok(())
}

async fn deposit(args: DepositArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let user = ctx
        .users
        .increase_balance(args.user_uuid, args.amount)
        .await
        .map_err(|error| format!("failed to deposit: {error}"))?;

    print_user(&user);

    Ok(())
}

fn print_user(user: &UserRecord) {
    println!("user_uuid: {}", user.uuid);
    println!("name: {}", user.name);
    println!("balance: {}", user.balance);
    println!("created_at: {}", user.created_at);
}
