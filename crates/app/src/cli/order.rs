use std::future::Future;

use clap::{Args, Subcommand};
use storefront_app::{
    config::DatabaseConfig,
    domain::{
        orders::{
            OrdersServiceError,
            data::{NewOrder, OrderUpdate},
            records::{OrderRecord, OrderUuid},
            until_cancelled,
        },
        products::records::ProductUuid,
        users::records::UserUuid,
    },
    shutdown,
};
use tokio_util::sync::CancellationToken;

use super::connect;

#[derive(Debug, Args)]
pub(crate) struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrderSubcommand {
    /// Place an order, reserving stock for each product
    Create(CreateOrderArgs),

    /// Show a single order
    Get(OrderArgs),

    /// List all orders
    List(ListOrdersArgs),

    /// Replace the products on a pending order
    Update(UpdateOrderArgs),

    /// Charge the order total to its owner
    Pay(PayOrderArgs),

    /// Delete an order, refunding it when paid
    Delete(OrderArgs),
}

#[derive(Debug, Args)]
struct CreateOrderArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    user_uuid: UserUuid,

    /// Product to order; repeat to order more than one unit
    #[arg(long = "product", required = true)]
    products: Vec<ProductUuid>,

    /// Optional order UUID; generated when omitted
    #[arg(long)]
    order_uuid: Option<OrderUuid>,
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    order_uuid: OrderUuid,
}

#[derive(Debug, Args)]
struct ListOrdersArgs {
    #[command(flatten)]
    database: DatabaseConfig,
}

#[derive(Debug, Args)]
struct UpdateOrderArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    order_uuid: OrderUuid,

    /// Product the order should contain; repeat for each product
    #[arg(long = "product", required = true)]
    products: Vec<ProductUuid>,
}

#[derive(Debug, Args)]
struct PayOrderArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    /// Paying user; must own the order
    #[arg(long)]
    user_uuid: UserUuid,

    #[arg(long)]
    order_uuid: OrderUuid,
}

pub(crate) async fn run(command: OrderCommand) -> Result<(), String> {
    match command.command {
        OrderSubcommand::Create(args) => create(args).await,
        OrderSubcommand::Get(args) => get(args).await,
        OrderSubcommand::List(args) => list(args).await,
        OrderSubcommand::Update(args) => update(args).await,
        OrderSubcommand::Pay(args) => pay(args).await,
        OrderSubcommand::Delete(args) => delete(args).await,
    }
}

/// Run a mutating operation that Ctrl+C rolls back.
async fn interruptible<T>(
    operation: impl Future<Output = Result<T, OrdersServiceError>>,
) -> Result<T, OrdersServiceError> {
    let token = CancellationToken::new();
    let signals = tokio::spawn(shutdown::listen(token.clone()));

    let result = until_cancelled(&token, operation).await;

    signals.abort();

    result
}

async fn create(args: CreateOrderArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let order = interruptible(ctx.orders.create_order(NewOrder {
        uuid: args.order_uuid.unwrap_or_default(),
        user_uuid: args.user_uuid,
        product_uuids: args.products,
    }))
    .await
    .map_err(|error| format!("failed to create order: {error}"))?;

    print_order(&order);

    Ok(())
}

async fn get(args: OrderArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let order = ctx
        .orders
        .get_order(args.order_uuid)
        .await
        .map_err(|error| format!("failed to get order: {error}"))?;

    print_order(&order);

    Ok(())
}

async fn list(args: ListOrdersArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let orders = ctx
        .orders
        .list_orders()
        .await
        .map_err(|error| format!("failed to list orders: {error}"))?;

    if orders.is_empty() {
        println!("no orders found");
        return Ok(());
    }

    for order in orders {
        print_order(&order);
        println!();
    }

    Ok(())
}

async fn update(args: UpdateOrderArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let order = interruptible(ctx.orders.update_order(
        args.order_uuid,
        OrderUpdate {
            product_uuids: args.products,
        },
    ))
    .await
    .map_err(|error| format!("failed to update order: {error}"))?;

    print_order(&order);

    Ok(())
}

async fn pay(args: PayOrderArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let order = interruptible(ctx.orders.pay_order(args.user_uuid, args.order_uuid))
        .await
        .map_err(|error| format!("failed to pay order: {error}"))?;

    print_order(&order);

    Ok(())
}

async fn delete(args: OrderArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let order = interruptible(ctx.orders.delete_order(args.order_uuid))
        .await
        .map_err(|error| format!("failed to delete order: {error}"))?;

    println!("deleted order {}", order.uuid);

    if order.is_paid() {
        println!("refunded: {}", order.total());
    }

    println!("released_units: {}", order.reserved_units());

    Ok(())
}

fn print_order(order: &OrderRecord) {
    println!("order_uuid: {}", order.uuid);
    println!("user_uuid: {}", order.user_uuid);
    println!("status: {}", order.status);
    println!("created_at: {}", order.created_at);

    if let Some(paid_at) = order.paid_at {
        println!("paid_at: {paid_at}");
    }

    for line in &order.lines {
        println!(
            "line: {} x{} @ {} = {} ({})",
            line.name,
            line.quantity,
            line.unit_price,
            line.subtotal(),
            line.product_uuid
        );
    }

    println!("total: {}", order.total());
}
