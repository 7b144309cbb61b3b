//! Startup tasks that run before the server accepts traffic.

use std::sync::Arc;

use tracing::{info, warn};

use orderhub_cache::OrderCache;
use orderhub_storage::DynOrderStorage;

/// Preloads the most recent orders from storage into the cache.
///
/// A failure here is logged and tolerated; the service starts with a cold
/// cache and fills it as traffic arrives.
pub async fn warm_cache(storage: &DynOrderStorage, cache: &Arc<OrderCache>, limit: usize) {
    match storage.get_recent(limit).await {
        Ok(orders) => {
            let count = orders.len();
            cache.bulk_set(orders);
            info!(count, limit, "cache warmed from storage");
        }
        Err(err) => {
            warn!(error = %err, "cache warm-up failed, starting cold");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orderhub_core::{Delivery, Item, Order, Payment};
    use orderhub_storage::{MemoryStorage, OrderStorage};

    fn order(uid: &str, created_unix: i64) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: String::new(),
            },
            payment: Payment {
                transaction: uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "rid".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "cust".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: time::OffsetDateTime::from_unix_timestamp(created_unix).unwrap(),
            oof_shard: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn warms_up_to_the_limit_newest_first() {
        let storage = Arc::new(MemoryStorage::new());
        for (uid, ts) in [
            ("old01", 1_500_000_000),
            ("mid01", 1_600_000_000),
            ("new01", 1_700_000_000),
        ] {
            storage.save(&order(uid, ts)).await.unwrap();
        }
        let storage: DynOrderStorage = storage;
        let cache = OrderCache::new(Duration::from_secs(60), 16);

        warm_cache(&storage, &cache, 2).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get("new01").is_some());
        assert!(cache.get("mid01").is_some());
        assert!(cache.get("old01").is_none());
    }
}
