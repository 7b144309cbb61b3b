//! The order aggregate and its sub-entities.
//!
//! Field names mirror the wire format of inbound queue messages, so the
//! structs deserialize directly from a message body with no renaming layer.
//! An order is never mutated after construction; later writes replace it
//! wholesale.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Aggregate root, uniquely identified by `order_uid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub date_created: OffsetDateTime,
    pub oof_shard: String,
}

impl Order {
    /// Sum of `total_price` across all items, or `None` when the sum does
    /// not fit in an `i64`.
    pub fn items_total(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.total_price))
    }
}

/// Delivery details, 1:1 with the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    #[serde(default)]
    pub email: String,
}

/// Payment details, 1:1 with the order. Monetary values are minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    #[serde(default)]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix timestamp (seconds) of the payment.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// A purchased item, 1:N with the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl Item {
    /// The total price this item must carry: `price` discounted by `sale`
    /// percent, rounded down. A discount that zeroes the price out is clamped
    /// to half the list price.
    ///
    /// Returns `None` when the computation overflows an `i64`; callers treat
    /// that as an invariant violation, not a panic.
    pub fn expected_total_price(&self) -> Option<i64> {
        let factor = 100i64.checked_sub(self.sale)?;
        let discounted = self.price.checked_mul(factor)? / 100;
        if discounted <= 0 {
            Some(self.price / 2)
        } else {
            Some(discounted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MESSAGE: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    #[test]
    fn decodes_canonical_message() {
        let order: Order = serde_json::from_str(SAMPLE_MESSAGE).expect("decode");
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.date_created.year(), 2021);
    }

    #[test]
    fn missing_required_field_fails_decode() {
        let truncated = SAMPLE_MESSAGE.replace("\"order_uid\": \"b563feb7b2b84b6test\",", "");
        assert!(serde_json::from_str::<Order>(&truncated).is_err());
    }

    #[test]
    fn roundtrips_through_json() {
        let order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let encoded = serde_json::to_string(&order).unwrap();
        let decoded: Order = serde_json::from_str(&encoded).unwrap();
        assert_eq!(order, decoded);
    }

    #[test]
    fn expected_total_price_applies_discount() {
        let order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let mut item = order.items[0].clone();
        item.price = 1000;
        item.sale = 25;
        assert_eq!(item.expected_total_price(), Some(750));

        // Discount rounds down.
        item.price = 999;
        item.sale = 10;
        assert_eq!(item.expected_total_price(), Some(899));
    }

    #[test]
    fn expected_total_price_clamps_to_half_price() {
        let order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let mut item = order.items[0].clone();
        item.price = 1;
        item.sale = 100;
        // 1 * 0 / 100 == 0, clamped to price / 2.
        assert_eq!(item.expected_total_price(), Some(0));

        item.price = 5;
        item.sale = 100;
        assert_eq!(item.expected_total_price(), Some(2));
    }

    #[test]
    fn expected_total_price_survives_extreme_prices() {
        let order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let mut item = order.items[0].clone();
        item.price = i64::MAX;
        item.sale = 2;
        assert_eq!(item.expected_total_price(), None);
    }

    #[test]
    fn items_total_sums_all_items() {
        let mut order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let mut second = order.items[0].clone();
        second.total_price = 100;
        order.items.push(second);
        assert_eq!(order.items_total(), Some(417));
    }

    #[test]
    fn items_total_detects_overflowing_sums() {
        let mut order: Order = serde_json::from_str(SAMPLE_MESSAGE).unwrap();
        let mut second = order.items[0].clone();
        order.items[0].total_price = i64::MAX;
        second.total_price = 1;
        order.items.push(second);
        assert_eq!(order.items_total(), None);
    }
}
