//! Order planning
//!
//! Pure computations the lifecycle manager runs before touching stock: grouping requested
//! product ids into quantities, classifying availability, and diffing line sets on update.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::domain::{
    orders::{
        data::NewOrderLine,
        records::{OrderLineRecord, ProductAvailability},
    },
    products::records::{ProductRecord, ProductUuid},
};

/// A product and how many units of it were requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedQuantity {
    pub product_uuid: ProductUuid,
    pub quantity: u32,
}

/// Collapse repeated product ids into one entry each, counting occurrences.
///
/// Entries keep the order in which each product first appears.
#[must_use]
pub fn group_quantities(product_uuids: &[ProductUuid]) -> Vec<RequestedQuantity> {
    let mut positions: FxHashMap<ProductUuid, usize> = FxHashMap::default();
    let mut grouped: Vec<RequestedQuantity> = Vec::with_capacity(product_uuids.len());

    for &product_uuid in product_uuids {
        match positions.get(&product_uuid).and_then(|&at| grouped.get_mut(at)) {
            Some(entry) => entry.quantity = entry.quantity.saturating_add(1),
            None => {
                positions.insert(product_uuid, grouped.len());
                grouped.push(RequestedQuantity {
                    product_uuid,
                    quantity: 1,
                });
            }
        }
    }

    grouped
}

/// Index products by id for lookups while planning.
#[must_use]
pub fn index_products(products: &[ProductRecord]) -> FxHashMap<ProductUuid, &ProductRecord> {
    products
        .iter()
        .map(|product| (product.uuid, product))
        .collect()
}

/// Every requested entry whose product is missing or has fewer units available than asked.
#[must_use]
pub fn unavailable_products(
    requested: &[RequestedQuantity],
    products: &FxHashMap<ProductUuid, &ProductRecord>,
) -> Vec<ProductAvailability> {
    requested
        .iter()
        .filter_map(|entry| {
            let product = products.get(&entry.product_uuid);

            let available_quantity = product.map_or(0, |product| product.available_quantity);

            if product.is_some() && available_quantity >= entry.quantity {
                return None;
            }

            Some(ProductAvailability {
                product_uuid: entry.product_uuid,
                name: product.map(|product| product.name.clone()),
                requested_quantity: entry.quantity,
                available_quantity,
            })
        })
        .collect()
}

/// Requested product ids that have no matching product, in request order.
#[must_use]
pub fn missing_products(
    requested: &[ProductUuid],
    products: &FxHashMap<ProductUuid, &ProductRecord>,
) -> Vec<ProductUuid> {
    requested
        .iter()
        .copied()
        .filter(|product_uuid| !products.contains_key(product_uuid))
        .collect()
}

/// Snapshot the product's current price, name and description into a new line.
#[must_use]
pub(crate) fn snapshot_line(product: &ProductRecord, quantity: u32) -> NewOrderLine {
    NewOrderLine {
        product_uuid: product.uuid,
        quantity,
        unit_price: product.price,
        name: product.name.clone(),
        description: product.description.clone(),
    }
}

/// Line additions and removals that turn an order's current lines into a requested set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineChanges {
    /// Lines whose product is no longer requested; their full quantity goes back to stock.
    pub removed: Vec<OrderLineRecord>,

    /// Requested products not yet on the order, deduplicated, in request order.
    pub added: Vec<ProductUuid>,
}

impl LineChanges {
    /// Compute the symmetric difference between the current lines and the requested ids.
    #[must_use]
    pub fn between(current: &[OrderLineRecord], requested: &[ProductUuid]) -> Self {
        let requested_set: FxHashSet<ProductUuid> = requested.iter().copied().collect();
        let current_set: FxHashSet<ProductUuid> =
            current.iter().map(|line| line.product_uuid).collect();

        let removed = current
            .iter()
            .filter(|line| !requested_set.contains(&line.product_uuid))
            .cloned()
            .collect();

        let mut seen = FxHashSet::default();

        let added = requested
            .iter()
            .copied()
            .filter(|product_uuid| !current_set.contains(product_uuid))
            .filter(|product_uuid| seen.insert(*product_uuid))
            .collect();

        Self { removed, added }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    pub fn removed_products(&self) -> Vec<ProductUuid> {
        self.removed.iter().map(|line| line.product_uuid).collect()
    }

    /// Added products as single-unit requests.
    pub fn added_quantities(&self) -> Vec<RequestedQuantity> {
        self.added
            .iter()
            .map(|&product_uuid| RequestedQuantity {
                product_uuid,
                quantity: 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;

    use super::*;

    fn product(available_quantity: u32) -> ProductRecord {
        ProductRecord {
            uuid: ProductUuid::new(),
            name: format!("stocked-{available_quantity}"),
            description: String::new(),
            price: Decimal::new(1000, 2),
            available_quantity,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn line(product_uuid: ProductUuid, quantity: u32) -> OrderLineRecord {
        OrderLineRecord {
            product_uuid,
            quantity,
            unit_price: Decimal::ONE,
            name: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn group_quantities_counts_duplicates_in_first_seen_order() {
        let a = ProductUuid::new();
        let b = ProductUuid::new();

        let grouped = group_quantities(&[b, a, b, b, a]);

        assert_eq!(
            grouped,
            vec![
                RequestedQuantity {
                    product_uuid: b,
                    quantity: 3
                },
                RequestedQuantity {
                    product_uuid: a,
                    quantity: 2
                },
            ]
        );
    }

    #[test]
    fn group_quantities_preserves_total_count() {
        let ids: Vec<ProductUuid> = (0..4).map(|_| ProductUuid::new()).collect();
        let requested: Vec<ProductUuid> = ids.iter().cycle().take(11).copied().collect();

        let total: u32 = group_quantities(&requested)
            .iter()
            .map(|entry| entry.quantity)
            .sum();

        assert_eq!(total, 11);
    }

    #[test]
    fn unavailable_products_reports_missing_and_short_stock() {
        let plenty = product(5);
        let short = product(1);
        let missing = ProductUuid::new();
        let products = vec![plenty.clone(), short.clone()];
        let index = index_products(&products);

        let requested = group_quantities(&[plenty.uuid, short.uuid, short.uuid, missing]);

        let unavailable = unavailable_products(&requested, &index);

        assert_eq!(
            unavailable,
            vec![
                ProductAvailability {
                    product_uuid: short.uuid,
                    name: Some(short.name.clone()),
                    requested_quantity: 2,
                    available_quantity: 1,
                },
                ProductAvailability {
                    product_uuid: missing,
                    name: None,
                    requested_quantity: 1,
                    available_quantity: 0,
                },
            ]
        );
    }

    #[test]
    fn unavailable_products_accepts_exact_stock() {
        let exact = product(3);
        let products = vec![exact.clone()];
        let index = index_products(&products);

        let requested = group_quantities(&[exact.uuid, exact.uuid, exact.uuid]);

        assert!(unavailable_products(&requested, &index).is_empty());
    }

    #[test]
    fn missing_products_keeps_request_order() {
        let known = product(1);
        let first = ProductUuid::new();
        let second = ProductUuid::new();
        let products = vec![known.clone()];

        let missing = missing_products(&[first, known.uuid, second], &index_products(&products));

        assert_eq!(missing, vec![first, second]);
    }

    #[test]
    fn line_changes_is_symmetric_difference() {
        let kept = ProductUuid::new();
        let dropped = ProductUuid::new();
        let new = ProductUuid::new();

        let current = vec![line(kept, 2), line(dropped, 3)];

        let changes = LineChanges::between(&current, &[kept, new, new]);

        assert_eq!(changes.removed, vec![line(dropped, 3)]);
        assert_eq!(changes.added, vec![new]);
        assert_eq!(changes.removed_products(), vec![dropped]);
        assert_eq!(
            changes.added_quantities(),
            vec![RequestedQuantity {
                product_uuid: new,
                quantity: 1
            }]
        );
    }

    #[test]
    fn line_changes_empty_when_sets_match() {
        let a = ProductUuid::new();
        let b = ProductUuid::new();

        let changes = LineChanges::between(&[line(a, 4), line(b, 1)], &[b, a]);

        assert!(changes.is_empty());
    }

    #[test]
    fn snapshot_line_copies_current_product_fields() {
        let source = product(9);

        let snapshot = snapshot_line(&source, 2);

        assert_eq!(snapshot.product_uuid, source.uuid);
        assert_eq!(snapshot.quantity, 2);
        assert_eq!(snapshot.unit_price, source.price);
        assert_eq!(snapshot.name, source.name);
    }
}
