use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use storefront_app::{
    config::DatabaseConfig,
    domain::products::{
        data::{NewProduct, ProductUpdate},
        records::{ProductRecord, ProductUuid},
    },
};

use super::connect;

#[derive(Debug, Args)]
pub(crate) struct ProductCommand {
    #[command(subcommand)]
    command: ProductSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProductSubcommand {
    /// Add a product to the catalog
    Create(CreateProductArgs),

    /// Show a single product
    Get(ProductArgs),

    /// List every product
    List(ListProductsArgs),

    /// List products with stock left
    Available(ListProductsArgs),

    /// Change a product's details or stock
    Update(UpdateProductArgs),

    /// Remove a product no order refers to
    Delete(ProductArgs),
}

#[derive(Debug, Args)]
struct CreateProductArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    name: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Unit price, e.g. 10.00
    #[arg(long)]
    price: Decimal,

    /// Units initially available
    #[arg(long)]
    quantity: u32,

    /// Optional product UUID; generated when omitted
    #[arg(long)]
    product_uuid: Option<ProductUuid>,
}

#[derive(Debug, Args)]
struct ProductArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    product_uuid: ProductUuid,
}

#[derive(Debug, Args)]
struct ListProductsArgs {
    #[command(flatten)]
    database: DatabaseConfig,
}

#[derive(Debug, Args)]
struct UpdateProductArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[arg(long)]
    product_uuid: ProductUuid,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    price: Option<Decimal>,

    #[arg(long)]
    quantity: Option<u32>,
}

pub(crate) async fn run(command: ProductCommand) -> Result<(), String> {
    match command.command {
        ProductSubcommand::Create(args) => create(args).await,
        ProductSubcommand::Get(args) => get(args).await,
        ProductSubcommand::List(args) => list(args, false).await,
        ProductSubcommand::Available(args) => list(args, true).await,
        ProductSubcommand::Update(args) => update(args).await,
        ProductSubcommand::Delete(args) => delete(args).await,
    }
}

async fn create(args: CreateProductArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let product = ctx
        .products
        .create_product(NewProduct {
            uuid: args.product_uuid.unwrap_or_default(),
            name: args.name,
            description: args.description,
            price: args.price,
            quantity: args.quantity,
        })
        .await
        .map_err(|error| format!("failed to create product: {error}"))?;

    print_product(&product);

    Ok(())
}

async fn get(args: ProductArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let product = ctx
        .products
        .get_product(args.product_uuid)
        .await
        .map_err(|error| format!("failed to get product: {error}"))?;

    print_product(&product);

    Ok(())
}

async fn list(args: ListProductsArgs, only_available: bool) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let products = if only_available {
        ctx.products.list_available_products().await
    } else {
        ctx.products.list_products().await
    }
    .map_err(|error| format!("failed to list products: {error}"))?;

    if products.is_empty() {
        println!("no products found");
        return Ok(());
    }

    for product in products {
        print_product(&product);
        println!();
    }

    Ok(())
}

async fn update(args: UpdateProductArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    let product = ctx
        .products
        .update_product(
            args.product_uuid,
            ProductUpdate {
                name: args.name,
                description: args.description,
                price: args.price,
                available_quantity: args.quantity,
            },
        )
        .await
        .map_err(|error| format!("failed to update product: {error}"))?;

    print_product(&product);

    Ok(())
}

async fn delete(args: ProductArgs) -> Result<(), String> {
    let ctx = connect(&args.database).await?;

    ctx.products
        .delete_product(args.product_uuid)
        .await
        .map_err(|error| format!("failed to delete product: {error}"))?;

    println!("deleted product {}", args.product_uuid);

    Ok(())
}

fn print_product(product: &ProductRecord) {
    println!("product_uuid: {}", product.uuid);
    println!("name: {}", product.name);

    if !product.description.is_empty() {
        println!("description: {}", product.description);
    }

    println!("price: {}", product.price);
    println!("available_quantity: {}", product.available_quantity);
}
