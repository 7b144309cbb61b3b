//! Order validation.
//!
//! Validation is pure: it inspects an already-decoded [`Order`] and reports
//! the first violated rule, never mutating the order. The arithmetic
//! invariants (item totals, goods total, overall amount) are checks, not
//! repairs; an order whose totals do not reconcile is rejected.

use std::sync::OnceLock;

use regex::Regex;
use time::{Duration, OffsetDateTime};

use crate::order::{Delivery, Item, Order, Payment};

/// UIDs that external callers may not submit. Queue-ingested orders are
/// exempt; test fixtures flow through the queue with these UIDs.
pub const RESERVED_UIDS: [&str; 2] = ["test", "demo"];

/// How far in the future `date_created` and `payment_dt` may lie, to absorb
/// clock skew between producers and this service.
const FUTURE_GRACE: Duration = Duration::hours(24);

/// Orders older than this are assumed to be corrupt replays.
const MAX_ORDER_AGE: Duration = Duration::days(10 * 365);

/// A violated validation rule, with enough structure for callers to map it
/// to a user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A mandatory field is empty or absent.
    #[error("{field} is required")]
    Required { field: String },

    /// A string field falls outside its length bounds.
    #[error("{field} must be between {min} and {max} characters")]
    Length { field: String, min: usize, max: usize },

    /// A field does not match its expected shape.
    #[error("{field} has invalid format: expected {expected}")]
    Format { field: String, expected: String },

    /// A numeric field violates its bound.
    #[error("{field} {constraint}")]
    Range { field: String, constraint: String },

    /// A cross-field arithmetic invariant does not hold.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    Arithmetic {
        field: String,
        expected: i64,
        actual: i64,
    },

    /// A timestamp lies outside the accepted window.
    #[error("{field} {message}")]
    Temporal { field: String, message: String },

    /// The order UID is reserved for internal use.
    #[error("order_uid '{uid}' is reserved")]
    ReservedUid { uid: String },
}

impl ValidationError {
    fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    fn length(field: impl Into<String>, min: usize, max: usize) -> Self {
        Self::Length {
            field: field.into(),
            min,
            max,
        }
    }

    fn format(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Format {
            field: field.into(),
            expected: expected.into(),
        }
    }

    fn range(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Range {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    fn temporal(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Temporal {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validates an order against the wall clock, for the queue-ingestion path.
pub fn validate_order(order: &Order) -> Result<(), ValidationError> {
    validate_order_at(order, OffsetDateTime::now_utc())
}

/// Validates an order against an explicit `now`, reporting the first
/// violated rule.
pub fn validate_order_at(order: &Order, now: OffsetDateTime) -> Result<(), ValidationError> {
    validate_root_fields(order)?;
    validate_delivery(&order.delivery)?;
    validate_payment(&order.payment)?;
    validate_items(&order.items)?;
    validate_totals(order)?;
    validate_dates(order, now)?;
    Ok(())
}

/// Stricter variant for externally-submitted orders: everything
/// [`validate_order`] checks, plus rejection of [`RESERVED_UIDS`].
///
/// The reserved check runs first so the caller sees the reservation, not
/// an incidental length failure.
pub fn validate_order_external(order: &Order) -> Result<(), ValidationError> {
    if RESERVED_UIDS.contains(&order.order_uid.as_str()) {
        return Err(ValidationError::ReservedUid {
            uid: order.order_uid.clone(),
        });
    }
    validate_order(order)
}

fn validate_root_fields(order: &Order) -> Result<(), ValidationError> {
    required_length("order_uid", &order.order_uid, 5, 50)?;
    required_length("track_number", &order.track_number, 5, 30)?;
    required("entry", &order.entry)?;
    if order.locale.chars().count() != 2 {
        return Err(ValidationError::length("locale", 2, 2));
    }
    required("customer_id", &order.customer_id)?;
    required("delivery_service", &order.delivery_service)?;
    required("shardkey", &order.shardkey)?;
    if order.sm_id <= 0 {
        return Err(ValidationError::range("sm_id", "must be positive"));
    }
    required("oof_shard", &order.oof_shard)?;
    Ok(())
}

fn validate_delivery(delivery: &Delivery) -> Result<(), ValidationError> {
    required("delivery.name", &delivery.name)?;
    if delivery.name.chars().count() > 100 {
        return Err(ValidationError::length("delivery.name", 1, 100));
    }
    required("delivery.phone", &delivery.phone)?;
    if !is_valid_phone(&delivery.phone) {
        return Err(ValidationError::format(
            "delivery.phone",
            "'+' followed by 4-19 digits",
        ));
    }
    required("delivery.zip", &delivery.zip)?;
    required("delivery.city", &delivery.city)?;
    required("delivery.address", &delivery.address)?;
    required("delivery.region", &delivery.region)?;
    if !delivery.email.is_empty() && !is_valid_email(&delivery.email) {
        return Err(ValidationError::format(
            "delivery.email",
            "an RFC-shaped email address",
        ));
    }
    Ok(())
}

fn validate_payment(payment: &Payment) -> Result<(), ValidationError> {
    required("payment.transaction", &payment.transaction)?;
    required("payment.currency", &payment.currency)?;
    if payment.currency.chars().count() != 3
        || !payment.currency.chars().all(|c| c.is_ascii_uppercase())
    {
        return Err(ValidationError::format(
            "payment.currency",
            "a 3-letter uppercase code",
        ));
    }
    required("payment.provider", &payment.provider)?;
    if payment.amount <= 0 {
        return Err(ValidationError::range("payment.amount", "must be positive"));
    }
    if payment.payment_dt <= 0 {
        return Err(ValidationError::range(
            "payment.payment_dt",
            "must be positive",
        ));
    }
    required("payment.bank", &payment.bank)?;
    if payment.delivery_cost < 0 {
        return Err(ValidationError::range(
            "payment.delivery_cost",
            "must not be negative",
        ));
    }
    if payment.goods_total <= 0 {
        return Err(ValidationError::range(
            "payment.goods_total",
            "must be positive",
        ));
    }
    if payment.custom_fee < 0 {
        return Err(ValidationError::range(
            "payment.custom_fee",
            "must not be negative",
        ));
    }
    Ok(())
}

fn validate_items(items: &[Item]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::required("items"));
    }
    for (index, item) in items.iter().enumerate() {
        let field = |name: &str| format!("items[{index}].{name}");
        if item.chrt_id <= 0 {
            return Err(ValidationError::range(field("chrt_id"), "must be positive"));
        }
        if item.price <= 0 {
            return Err(ValidationError::range(field("price"), "must be positive"));
        }
        required(field("name"), &item.name)?;
        if !(0..=100).contains(&item.sale) {
            return Err(ValidationError::range(
                field("sale"),
                "must be between 0 and 100",
            ));
        }
        if item.total_price <= 0 {
            return Err(ValidationError::range(
                field("total_price"),
                "must be positive",
            ));
        }
        if item.nm_id <= 0 {
            return Err(ValidationError::range(field("nm_id"), "must be positive"));
        }
        required(field("brand"), &item.brand)?;
        if item.status < 0 {
            return Err(ValidationError::range(
                field("status"),
                "must not be negative",
            ));
        }
        // Overflow of the discount computation means the price is garbage;
        // reject rather than compare against a wrapped value.
        let Some(expected) = item.expected_total_price() else {
            return Err(ValidationError::range(
                field("total_price"),
                "cannot be derived: price discount computation overflows",
            ));
        };
        if item.total_price != expected {
            return Err(ValidationError::Arithmetic {
                field: field("total_price"),
                expected,
                actual: item.total_price,
            });
        }
    }
    Ok(())
}

fn validate_totals(order: &Order) -> Result<(), ValidationError> {
    let Some(items_total) = order.items_total() else {
        return Err(ValidationError::range(
            "payment.goods_total",
            "cannot be checked: item totals overflow",
        ));
    };
    if order.payment.goods_total != items_total {
        return Err(ValidationError::Arithmetic {
            field: "payment.goods_total".to_string(),
            expected: items_total,
            actual: order.payment.goods_total,
        });
    }
    let expected_amount = order
        .payment
        .goods_total
        .checked_add(order.payment.delivery_cost)
        .and_then(|sum| sum.checked_add(order.payment.custom_fee));
    let Some(expected_amount) = expected_amount else {
        return Err(ValidationError::range(
            "payment.amount",
            "cannot be checked: amount components overflow",
        ));
    };
    if order.payment.amount != expected_amount {
        return Err(ValidationError::Arithmetic {
            field: "payment.amount".to_string(),
            expected: expected_amount,
            actual: order.payment.amount,
        });
    }
    Ok(())
}

fn validate_dates(order: &Order, now: OffsetDateTime) -> Result<(), ValidationError> {
    if order.date_created > now + FUTURE_GRACE {
        return Err(ValidationError::temporal(
            "date_created",
            "must not be in the future",
        ));
    }
    if order.date_created < now - MAX_ORDER_AGE {
        return Err(ValidationError::temporal(
            "date_created",
            "must not be older than 10 years",
        ));
    }
    let payment_time = OffsetDateTime::from_unix_timestamp(order.payment.payment_dt)
        .map_err(|_| ValidationError::temporal("payment.payment_dt", "is not a valid timestamp"))?;
    if payment_time > now + FUTURE_GRACE {
        return Err(ValidationError::temporal(
            "payment.payment_dt",
            "must not be in the future",
        ));
    }
    Ok(())
}

fn required(field: impl Into<String>, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

fn required_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::length(field, min, max));
    }
    Ok(())
}

fn is_valid_phone(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    (4..=19).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
    });
    re.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: "b563feb7b2b84b6test".to_string(),
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
                rid: "ab4219087a764ae0btest".to_string(),
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
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: time::macros::datetime!(2021-11-26 06:22:19 UTC),
            oof_shard: "1".to_string(),
        }
    }

    fn now() -> OffsetDateTime {
        time::macros::datetime!(2022-01-01 00:00:00 UTC)
    }

    #[test]
    fn accepts_valid_order() {
        assert_eq!(validate_order_at(&valid_order(), now()), Ok(()));
    }

    #[test]
    fn rejects_empty_order_uid() {
        let mut order = valid_order();
        order.order_uid = String::new();
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Required { field }) if field == "order_uid"
        ));
    }

    #[test]
    fn rejects_order_uid_out_of_bounds() {
        let mut order = valid_order();
        order.order_uid = "abcd".to_string();
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Length { min: 5, max: 50, .. })
        ));

        order.order_uid = "x".repeat(51);
        assert!(validate_order_at(&order, now()).is_err());
    }

    #[test]
    fn rejects_short_track_number() {
        let mut order = valid_order();
        order.track_number = "WB".to_string();
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Length { min: 5, max: 30, .. })
        ));
    }

    #[test]
    fn rejects_bad_locale() {
        let mut order = valid_order();
        order.locale = "eng".to_string();
        assert!(validate_order_at(&order, now()).is_err());
    }

    #[test]
    fn rejects_bad_phone() {
        let mut order = valid_order();
        for phone in ["9720000000", "+123", "+12a4567890", "+99999999999999999999"] {
            order.delivery.phone = phone.to_string();
            assert!(
                matches!(
                    validate_order_at(&order, now()),
                    Err(ValidationError::Format { ref field, .. }) if field == "delivery.phone"
                ),
                "phone {phone:?} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_minimal_and_maximal_phone() {
        let mut order = valid_order();
        order.delivery.phone = "+1234".to_string();
        assert_eq!(validate_order_at(&order, now()), Ok(()));
        order.delivery.phone = format!("+{}", "9".repeat(19));
        assert_eq!(validate_order_at(&order, now()), Ok(()));
    }

    #[test]
    fn rejects_bad_email_but_allows_empty() {
        let mut order = valid_order();
        order.delivery.email = "not-an-email".to_string();
        assert!(validate_order_at(&order, now()).is_err());
        order.delivery.email = String::new();
        assert_eq!(validate_order_at(&order, now()), Ok(()));
    }

    #[test]
    fn rejects_bad_currency() {
        let mut order = valid_order();
        for currency in ["US", "USDT", "usd", "U5D"] {
            order.payment.currency = currency.to_string();
            assert!(
                validate_order_at(&order, now()).is_err(),
                "currency {currency:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_nonpositive_amounts() {
        let mut order = valid_order();
        order.payment.amount = 0;
        assert!(validate_order_at(&order, now()).is_err());

        let mut order = valid_order();
        order.payment.delivery_cost = -1;
        assert!(validate_order_at(&order, now()).is_err());

        let mut order = valid_order();
        order.payment.custom_fee = -5;
        assert!(validate_order_at(&order, now()).is_err());
    }

    #[test]
    fn rejects_empty_items() {
        let mut order = valid_order();
        order.items.clear();
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Required { field }) if field == "items"
        ));
    }

    #[test]
    fn rejects_sale_out_of_range() {
        let mut order = valid_order();
        order.items[0].sale = 101;
        assert!(validate_order_at(&order, now()).is_err());
        order.items[0].sale = -1;
        assert!(validate_order_at(&order, now()).is_err());
    }

    #[test]
    fn rejects_item_total_price_mismatch() {
        let mut order = valid_order();
        order.items[0].total_price = 316;
        // Keep the downstream sums consistent so the item check fires first.
        order.payment.goods_total = 316;
        order.payment.amount = 316 + 1500;
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Arithmetic { expected: 317, actual: 316, .. })
        ));
    }

    #[test]
    fn rejects_goods_total_mismatch() {
        let mut order = valid_order();
        order.payment.goods_total = 400;
        order.payment.amount = 400 + 1500;
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Arithmetic { ref field, .. }) if field == "payment.goods_total"
        ));
    }

    #[test]
    fn rejects_amount_mismatch() {
        let mut order = valid_order();
        order.payment.amount = 9999;
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Arithmetic { ref field, .. }) if field == "payment.amount"
        ));
    }

    #[test]
    fn accepts_date_created_within_grace_window() {
        let mut order = valid_order();
        order.date_created = now() + Duration::hours(23);
        assert_eq!(validate_order_at(&order, now()), Ok(()));
    }

    #[test]
    fn rejects_date_created_beyond_grace_window() {
        let mut order = valid_order();
        order.date_created = now() + Duration::hours(25);
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Temporal { ref field, .. }) if field == "date_created"
        ));
    }

    #[test]
    fn rejects_ancient_order() {
        let mut order = valid_order();
        order.date_created = now() - Duration::days(10 * 365 + 1);
        assert!(validate_order_at(&order, now()).is_err());
    }

    #[test]
    fn rejects_future_payment_dt() {
        let mut order = valid_order();
        order.payment.payment_dt = (now() + Duration::hours(25)).unix_timestamp();
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Temporal { ref field, .. }) if field == "payment.payment_dt"
        ));
    }

    #[test]
    fn rejects_order_whose_discount_computation_overflows() {
        let mut order = valid_order();
        order.items[0].price = i64::MAX;
        order.items[0].sale = 2;
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Range { ref field, .. }) if field == "items[0].total_price"
        ));
    }

    #[test]
    fn rejects_amount_components_that_overflow() {
        let mut order = valid_order();
        order.payment.delivery_cost = i64::MAX;
        assert!(matches!(
            validate_order_at(&order, now()),
            Err(ValidationError::Range { ref field, .. }) if field == "payment.amount"
        ));
    }

    #[test]
    fn external_variant_rejects_reserved_uids() {
        for uid in RESERVED_UIDS {
            let mut order = valid_order();
            order.order_uid = uid.to_string();
            assert!(
                matches!(
                    validate_order_external(&order),
                    Err(ValidationError::ReservedUid { uid: ref rejected }) if rejected == uid
                ),
                "uid {uid:?} should be rejected as reserved"
            );
        }
    }

    #[test]
    fn queue_path_does_not_reject_reserved_uids_specifically() {
        let mut order = valid_order();
        order.order_uid = "demo1".to_string();
        assert_eq!(validate_order_at(&order, now()), Ok(()));
        assert_eq!(validate_order_external(&order), Ok(()));
    }
}
