//! Property-based tests for cart pricing.

use std::sync::Arc;

use checkout_api::services::commerce::{
    pricing_service::{surcharge_for, total_with_surcharge, MAX_ORDER_TOTAL},
    CartLine, InMemoryProductCatalog, PricingService,
};
use proptest::prelude::*;

fn cart_strategy() -> impl Strategy<Value = Vec<(u64, i64)>> {
    prop::collection::vec((0u64..1_000_000, 1i64..1_000), 1..12)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn surcharge_is_floor_of_two_percent(subtotal in 0u64..=u64::MAX / 2) {
        let surcharge = surcharge_for(subtotal);
        prop_assert!(surcharge <= subtotal);
        prop_assert!(surcharge as u128 * 100 <= subtotal as u128 * 2);
        prop_assert!((surcharge as u128 + 1) * 100 > subtotal as u128 * 2);
    }

    #[test]
    fn total_never_exceeds_order_row_range(subtotal in any::<u64>()) {
        match total_with_surcharge(subtotal) {
            Some(total) => {
                prop_assert!(total <= MAX_ORDER_TOTAL);
                prop_assert_eq!(total, subtotal + surcharge_for(subtotal));
            }
            None => prop_assert!(subtotal as u128 + surcharge_for(subtotal) as u128 > MAX_ORDER_TOTAL as u128),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn priced_total_matches_catalog_arithmetic(cart in cart_strategy(), concurrency in 1usize..8) {
        let mut catalog = InMemoryProductCatalog::new();
        let mut lines = Vec::with_capacity(cart.len());
        let mut expected_subtotal: u64 = 0;

        for (i, (price, quantity)) in cart.iter().enumerate() {
            let id = format!("p{i}");
            catalog = catalog.with_product(&id, &format!("Product {i}"), *price);
            lines.push(CartLine { product: id, quantity: *quantity });
            expected_subtotal += price * (*quantity as u64);
        }

        let pricing = PricingService::new(Arc::new(catalog), concurrency);
        let priced = runtime().block_on(pricing.price_cart(&lines)).expect("cart prices");

        prop_assert_eq!(priced.subtotal, expected_subtotal);
        prop_assert_eq!(priced.total, expected_subtotal + expected_subtotal * 2 / 100);
        prop_assert_eq!(priced.items.len(), lines.len());
        for (item, line) in priced.items.iter().zip(&lines) {
            prop_assert_eq!(&item.product_id, &line.product);
        }
    }
}
