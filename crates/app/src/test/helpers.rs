//! Test Helpers

use rust_decimal::Decimal;

use crate::{
    domain::{
        products::{
            ProductsService, ProductsServiceError,
            data::NewProduct,
            records::ProductUuid,
        },
        users::{
            UsersService, UsersServiceError,
            data::NewUser,
            records::UserUuid,
        },
    },
    test::TestContext,
};

/// An amount of money given in cents.
pub(crate) fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub(crate) async fn create_product(
    ctx: &TestContext,
    price_cents: i64,
    quantity: u32,
) -> Result<ProductUuid, ProductsServiceError> {
    let uuid = ProductUuid::new();

    ctx.products
        .create_product(NewProduct {
            uuid,
            name: format!("product-{uuid}"),
            description: format!("description of {uuid}"),
            price: money(price_cents),
            quantity,
        })
        .await?;

    Ok(uuid)
}

/// Create a user and credit them with `balance_cents` when non-zero.
pub(crate) async fn create_user(
    ctx: &TestContext,
    balance_cents: i64,
) -> Result<UserUuid, UsersServiceError> {
    let uuid = UserUuid::new();

    ctx.users
        .create_user(NewUser {
            uuid,
            name: format!("user-{uuid}"),
        })
        .await?;

    if balance_cents > 0 {
        ctx.users
            .increase_balance(uuid, money(balance_cents))
            .await?;
    }

    Ok(uuid)
}

pub(crate) async fn available_quantity(
    ctx: &TestContext,
    product: ProductUuid,
) -> Result<u32, ProductsServiceError> {
    Ok(ctx.products.get_product(product).await?.available_quantity)
}

pub(crate) async fn balance(ctx: &TestContext, user: UserUuid) -> Result<Decimal, UsersServiceError> {
    Ok(ctx.users.get_user(user).await?.balance)
}
