//! PostgreSQL implementation of the `OrderStorage` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use orderhub_core::{Delivery, Item, Order, Payment};
use orderhub_storage::{OrderStorage, StorageError};

use crate::config::PostgresConfig;
use crate::error::PostgresError;
use crate::migrations;
use crate::pool;

/// PostgreSQL order store.
///
/// `save` upserts the order row and its delivery/payment rows and replaces
/// the item rows wholesale, all inside one transaction.
#[derive(Clone)]
pub struct PostgresOrderStorage {
    pool: PgPool,
}

impl PostgresOrderStorage {
    /// Creates the storage: builds a connection pool and, if configured,
    /// runs embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or migrations fail.
    pub async fn new(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Creates the storage from an existing connection pool. Migrations are
    /// not run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn db_err(e: sqlx_core::error::Error) -> StorageError {
        PostgresError::Database(e).into()
    }

    fn time_to_chrono(t: OffsetDateTime) -> DateTime<Utc> {
        DateTime::from_timestamp(t.unix_timestamp(), t.nanosecond()).unwrap_or_else(Utc::now)
    }

    fn chrono_to_time(t: DateTime<Utc>) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(t.timestamp())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            .replace_nanosecond(t.timestamp_subsec_nanos())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

#[async_trait]
impl OrderStorage for PostgresOrderStorage {
    #[instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn save(&self, order: &Order) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(Self::db_err)?;

        sqlx_core::query::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                track_number = EXCLUDED.track_number,
                entry = EXCLUDED.entry,
                locale = EXCLUDED.locale,
                internal_signature = EXCLUDED.internal_signature,
                customer_id = EXCLUDED.customer_id,
                delivery_service = EXCLUDED.delivery_service,
                shardkey = EXCLUDED.shardkey,
                sm_id = EXCLUDED.sm_id,
                date_created = EXCLUDED.date_created,
                oof_shard = EXCLUDED.oof_shard
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(Self::time_to_chrono(order.date_created))
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        sqlx_core::query::query(
            r#"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO UPDATE SET
                name = EXCLUDED.name,
                phone = EXCLUDED.phone,
                zip = EXCLUDED.zip,
                city = EXCLUDED.city,
                address = EXCLUDED.address,
                region = EXCLUDED.region,
                email = EXCLUDED.email
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        sqlx_core::query::query(
            r#"
            INSERT INTO payments (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE SET
                transaction = EXCLUDED.transaction,
                request_id = EXCLUDED.request_id,
                currency = EXCLUDED.currency,
                provider = EXCLUDED.provider,
                amount = EXCLUDED.amount,
                payment_dt = EXCLUDED.payment_dt,
                bank = EXCLUDED.bank,
                delivery_cost = EXCLUDED.delivery_cost,
                goods_total = EXCLUDED.goods_total,
                custom_fee = EXCLUDED.custom_fee
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.payment.transaction)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .execute(&mut *tx)
        .await
        .map_err(Self::db_err)?;

        // Items are replaced wholesale; a re-delivered order may carry a
        // different item set.
        sqlx_core::query::query("DELETE FROM items WHERE order_uid = $1")
            .bind(&order.order_uid)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?;

        for item in &order.items {
            sqlx_core::query::query(
                r#"
                INSERT INTO items (
                    chrt_id, order_uid, track_number, price, rid, name, sale,
                    size, total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (chrt_id) DO UPDATE SET
                    order_uid = EXCLUDED.order_uid,
                    track_number = EXCLUDED.track_number,
                    price = EXCLUDED.price,
                    rid = EXCLUDED.rid,
                    name = EXCLUDED.name,
                    sale = EXCLUDED.sale,
                    size = EXCLUDED.size,
                    total_price = EXCLUDED.total_price,
                    nm_id = EXCLUDED.nm_id,
                    brand = EXCLUDED.brand,
                    status = EXCLUDED.status
                "#,
            )
            .bind(item.chrt_id)
            .bind(&order.order_uid)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(Self::db_err)?;
        }

        tx.commit().await.map_err(Self::db_err)?;

        debug!("order saved");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_uid(&self, order_uid: &str) -> Result<Order, StorageError> {
        let order_row: Option<(
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            i64,
            DateTime<Utc>,
            String,
        )> = sqlx_core::query_as::query_as(
            r#"
            SELECT order_uid, track_number, entry, locale, internal_signature,
                   customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            FROM orders WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;

        let Some((
            uid,
            track_number,
            entry,
            locale,
            internal_signature,
            customer_id,
            delivery_service,
            shardkey,
            sm_id,
            date_created,
            oof_shard,
        )) = order_row
        else {
            return Err(StorageError::not_found(order_uid));
        };

        let delivery_row: Option<(String, String, String, String, String, String, String)> =
            sqlx_core::query_as::query_as(
                r#"
                SELECT name, phone, zip, city, address, region, email
                FROM deliveries WHERE order_uid = $1
                "#,
            )
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err)?;
        let Some((name, phone, zip, city, address, region, email)) = delivery_row else {
            return Err(StorageError::internal(format!(
                "order {order_uid} has no delivery row"
            )));
        };

        let payment_row: Option<(
            String,
            String,
            String,
            String,
            i64,
            i64,
            String,
            i64,
            i64,
            i64,
        )> = sqlx_core::query_as::query_as(
            r#"
            SELECT transaction, request_id, currency, provider, amount,
                   payment_dt, bank, delivery_cost, goods_total, custom_fee
            FROM payments WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_err)?;
        let Some((
            transaction,
            request_id,
            currency,
            provider,
            amount,
            payment_dt,
            bank,
            delivery_cost,
            goods_total,
            custom_fee,
        )) = payment_row
        else {
            return Err(StorageError::internal(format!(
                "order {order_uid} has no payment row"
            )));
        };

        let item_rows: Vec<(
            i64,
            String,
            i64,
            String,
            String,
            i64,
            String,
            i64,
            i64,
            String,
            i64,
        )> = sqlx_core::query_as::query_as(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM items WHERE order_uid = $1
            ORDER BY chrt_id
            "#,
        )
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err)?;

        let items = item_rows
            .into_iter()
            .map(
                |(
                    chrt_id,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                )| Item {
                    chrt_id,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                },
            )
            .collect();

        Ok(Order {
            order_uid: uid,
            track_number,
            entry,
            delivery: Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            },
            payment: Payment {
                transaction,
                request_id,
                currency,
                provider,
                amount,
                payment_dt,
                bank,
                delivery_cost,
                goods_total,
                custom_fee,
            },
            items,
            locale,
            internal_signature,
            customer_id,
            delivery_service,
            shardkey,
            sm_id,
            date_created: Self::chrono_to_time(date_created),
            oof_shard,
        })
    }

    #[instrument(skip(self))]
    async fn get_recent(&self, limit: usize) -> Result<HashMap<String, Order>, StorageError> {
        let uids: Vec<(String,)> = sqlx_core::query_as::query_as(
            r#"
            SELECT order_uid FROM orders
            ORDER BY date_created DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_err)?;

        let mut orders = HashMap::with_capacity(uids.len());
        for (uid,) in uids {
            match self.get_by_uid(&uid).await {
                Ok(order) => {
                    orders.insert(uid, order);
                }
                // A partially-written or concurrently-deleted order must not
                // abort the warm-up of everything else.
                Err(e) => warn!(order_uid = %uid, error = %e, "skipping order during recent load"),
            }
        }
        Ok(orders)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx_core::query::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Self::db_err)?;
        Ok(())
    }
}
