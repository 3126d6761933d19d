//! Products service.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    database::Db,
    domain::products::{
        data::{NewProduct, ProductUpdate},
        errors::ProductsServiceError,
        records::{ProductRecord, ProductUuid},
        repository::PgProductsRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgProductsService {
    db: Db,
    repository: PgProductsRepository,
}

impl PgProductsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgProductsRepository::new(),
        }
    }
}

fn validate_name(name: &str) -> Result<(), ProductsServiceError> {
    if name.trim().is_empty() {
        return Err(ProductsServiceError::EmptyName);
    }

    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), ProductsServiceError> {
    if price < Decimal::ZERO {
        return Err(ProductsServiceError::InvalidPrice);
    }

    Ok(())
}

#[async_trait]
impl ProductsService for PgProductsService {
    async fn list_products(&self) -> Result<Vec<ProductRecord>, ProductsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let products = self.repository.list_products(&mut tx).await?;

        tx.commit().await?;

        Ok(products)
    }

    async fn list_available_products(&self) -> Result<Vec<ProductRecord>, ProductsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let products = self.repository.list_available_products(&mut tx).await?;

        tx.commit().await?;

        Ok(products)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, ProductsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let product = self.repository.get_product(&mut tx, product).await?;

        tx.commit().await?;

        Ok(product)
    }

    async fn find_products(
        &self,
        products: &[ProductUuid],
    ) -> Result<Vec<ProductRecord>, ProductsServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.db.begin_transaction().await?;

        let found = self.repository.find_products(&mut tx, products).await?;

        tx.commit().await?;

        Ok(found)
    }

    #[tracing::instrument(
        name = "products.service.create_product",
        skip(self, product),
        fields(product_uuid = %product.uuid),
        err
    )]
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, ProductsServiceError> {
        validate_name(&product.name)?;
        validate_price(product.price)?;

        let mut tx = self.db.begin_transaction().await?;

        let created = self.repository.create_product(&mut tx, product).await?;

        tx.commit().await?;

        info!(product_uuid = %created.uuid, "created product");

        Ok(created)
    }

    #[tracing::instrument(
        name = "products.service.update_product",
        skip(self, update),
        fields(product_uuid = %product),
        err
    )]
    async fn update_product(
        &self,
        product: ProductUuid,
        update: ProductUpdate,
    ) -> Result<ProductRecord, ProductsServiceError> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }

        if let Some(price) = update.price {
            validate_price(price)?;
        }

        let mut tx = self.db.begin_transaction().await?;

        let updated = self
            .repository
            .update_product(&mut tx, product, update)
            .await?;

        tx.commit().await?;

        info!(product_uuid = %product, "updated product");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "products.service.delete_product",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    async fn delete_product(&self, product: ProductUuid) -> Result<(), ProductsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let rows_affected = self.repository.delete_product(&mut tx, product).await?;

        if rows_affected == 0 {
            return Err(ProductsServiceError::NotFound);
        }

        tx.commit().await?;

        info!(product_uuid = %product, "deleted product");

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait ProductsService: Send + Sync {
    /// Retrieves all products.
    async fn list_products(&self) -> Result<Vec<ProductRecord>, ProductsServiceError>;

    /// Retrieves products with at least one unit available.
    async fn list_available_products(&self) -> Result<Vec<ProductRecord>, ProductsServiceError>;

    /// Retrieve a single product.
    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, ProductsServiceError>;

    /// Retrieves the subset of the given products that exist.
    async fn find_products(
        &self,
        products: &[ProductUuid],
    ) -> Result<Vec<ProductRecord>, ProductsServiceError>;

    /// Adds a product to the catalog with its initial stock.
    async fn create_product(&self, product: NewProduct)
    -> Result<ProductRecord, ProductsServiceError>;

    /// Applies an administrative update; absent fields are kept.
    async fn update_product(
        &self,
        product: ProductUuid,
        update: ProductUpdate,
    ) -> Result<ProductRecord, ProductsServiceError>;

    /// Deletes a product that no order references.
    async fn delete_product(&self, product: ProductUuid) -> Result<(), ProductsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::{
        TestContext,
        helpers::{create_product, money},
    };

    use super::*;

    #[tokio::test]
    async fn create_product_returns_all_fields() -> TestResult {
        let ctx = TestContext::new().await;
        let uuid = ProductUuid::new();

        let product = ctx
            .products
            .create_product(NewProduct {
                uuid,
                name: "Teapot".to_string(),
                description: "Short and stout".to_string(),
                price: money(1999),
                quantity: 12,
            })
            .await?;

        assert_eq!(product.uuid, uuid);
        assert_eq!(product.name, "Teapot");
        assert_eq!(product.description, "Short and stout");
        assert_eq!(product.price, money(1999));
        assert_eq!(product.available_quantity, 12);

        Ok(())
    }

    #[tokio::test]
    async fn create_product_rejects_negative_price() {
        let ctx = TestContext::new().await;

        let result = ctx
            .products
            .create_product(NewProduct {
                uuid: ProductUuid::new(),
                name: "Refund".to_string(),
                description: String::new(),
                price: money(-1),
                quantity: 1,
            })
            .await;

        assert!(
            matches!(result, Err(ProductsServiceError::InvalidPrice)),
            "expected InvalidPrice, got {result:?}"
        );
    }

    #[tokio::test]
    async fn get_product_unknown_uuid_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.products.get_product(ProductUuid::new()).await;

        assert!(
            matches!(result, Err(ProductsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn update_product_keeps_absent_fields() -> TestResult {
        let ctx = TestContext::new().await;
        let uuid = create_product(&ctx, 500, 3).await?;

        let updated = ctx
            .products
            .update_product(
                uuid,
                ProductUpdate {
                    price: Some(money(750)),
                    available_quantity: Some(9),
                    ..ProductUpdate::default()
                },
            )
            .await?;

        assert_eq!(updated.price, money(750));
        assert_eq!(updated.available_quantity, 9);
        assert!(updated.name.starts_with("product-"));

        Ok(())
    }

    #[tokio::test]
    async fn update_product_unknown_uuid_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .products
            .update_product(ProductUuid::new(), ProductUpdate::default())
            .await;

        assert!(
            matches!(result, Err(ProductsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn list_available_products_skips_sold_out() -> TestResult {
        let ctx = TestContext::new().await;
        let in_stock = create_product(&ctx, 100, 1).await?;
        let sold_out = create_product(&ctx, 100, 0).await?;

        let available: Vec<ProductUuid> = ctx
            .products
            .list_available_products()
            .await?
            .iter()
            .map(|product| product.uuid)
            .collect();

        assert!(available.contains(&in_stock), "in-stock product should be listed");
        assert!(!available.contains(&sold_out), "sold-out product should be hidden");

        Ok(())
    }

    #[tokio::test]
    async fn find_products_returns_only_existing() -> TestResult {
        let ctx = TestContext::new().await;
        let existing = create_product(&ctx, 100, 1).await?;

        let found = ctx
            .products
            .find_products(&[existing, ProductUuid::new()])
            .await?;

        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|product| product.uuid), Some(existing));

        Ok(())
    }

    #[tokio::test]
    async fn delete_product_makes_it_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let uuid = create_product(&ctx, 300, 1).await?;

        ctx.products.delete_product(uuid).await?;

        let result = ctx.products.get_product(uuid).await;

        assert!(
            matches!(result, Err(ProductsServiceError::NotFound)),
            "expected NotFound after deletion, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn delete_product_unknown_uuid_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.products.delete_product(ProductUuid::new()).await;

        assert!(
            matches!(result, Err(ProductsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }
}
