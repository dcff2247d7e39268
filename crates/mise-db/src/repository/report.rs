//! # Report Repository
//!
//! Read-only sales reports. Only Paid orders count, and days are UTC days
//! of the order's `created_at`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::ReportSettings;
use crate::error::DbResult;
use mise_core::{DailySales, Money, OrderStatus, PopularItem};

/// Repository for sales reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Paid revenue and paid order count for one day.
    pub async fn daily_sales(
        &self,
        restaurant_id: Option<&str>,
        date: NaiveDate,
    ) -> DbResult<DailySales> {
        let (start, end) = day_bounds(date);

        let (total_cents, order_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM orders
            WHERE status = ?1
              AND created_at >= ?2 AND created_at < ?3
              AND (?4 IS NULL OR restaurant_id = ?4)
            "#,
        )
        .bind(OrderStatus::Paid)
        .bind(start)
        .bind(end)
        .bind(restaurant_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(%date, total_cents, order_count, "Daily sales computed");
        Ok(DailySales {
            date,
            total: Money::from_cents(total_cents),
            order_count,
        })
    }

    /// Menu items ranked by quantity sold on Paid orders created since
    /// `since`, highest first.
    pub async fn popular_items(
        &self,
        restaurant_id: Option<&str>,
        since: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<PopularItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT
                oi.menu_item_id AS menu_item_id,
                mi.name AS name,
                SUM(oi.quantity) AS total_quantity,
                SUM(oi.subtotal_cents) AS revenue_cents
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN menu_items mi ON mi.id = oi.menu_item_id
            WHERE o.status = ?1
              AND o.created_at >= ?2
              AND (?3 IS NULL OR o.restaurant_id = ?3)
            GROUP BY oi.menu_item_id, mi.name
            ORDER BY total_quantity DESC, mi.name
            LIMIT ?4
            "#,
        )
        .bind(OrderStatus::Paid)
        .bind(since)
        .bind(restaurant_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// [`popular_items`](Self::popular_items) over the configured look-back
    /// window and limit.
    pub async fn popular_items_recent(
        &self,
        restaurant_id: Option<&str>,
        settings: &ReportSettings,
    ) -> DbResult<Vec<PopularItem>> {
        let since = Utc::now() - Duration::days(i64::from(settings.popular_items_days));
        self.popular_items(restaurant_id, since, settings.popular_items_limit)
            .await
    }
}

/// `[00:00 UTC of date, 00:00 UTC of the next day)`.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use mise_core::{NewOrder, NewOrderLine};

    fn order(restaurant_id: &str, lines: &[(&str, i64)]) -> NewOrder {
        NewOrder {
            restaurant_id: restaurant_id.to_string(),
            items: lines
                .iter()
                .map(|(id, quantity)| NewOrderLine {
                    menu_item_id: id.to_string(),
                    quantity: *quantity,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_day_bounds() {
        let (start, end) = day_bounds(fixtures::date());
        assert_eq!(start.to_rfc3339(), "2026-10-19T00:00:00+00:00");
        assert_eq!(end - start, Duration::days(1));
    }

    #[tokio::test]
    async fn test_daily_sales_counts_paid_only() {
        let db = fixtures::db().await;
        let r = fixtures::restaurant(&db).await;
        let burger = fixtures::menu_item(&db, &r.id, "Burger", "10.00").await;
        let fries = fixtures::menu_item(&db, &r.id, "Fries", "5.50").await;

        let paid = db
            .orders()
            .create_order(&order(&r.id, &[(burger.id.as_str(), 2), (fries.id.as_str(), 1)]))
            .await
            .unwrap();
        db.orders().pay_order(&paid.id).await.unwrap();

        db.orders()
            .create_order(&order(&r.id, &[(burger.id.as_str(), 5)]))
            .await
            .unwrap();
        let cancelled = db
            .orders()
            .create_order(&order(&r.id, &[(fries.id.as_str(), 1)]))
            .await
            .unwrap();
        db.orders().cancel_order(&cancelled.id).await.unwrap();

        let today = Utc::now().date_naive();
        let sales = db.reports().daily_sales(Some(&r.id), today).await.unwrap();
        assert_eq!(sales.order_count, 1);
        assert_eq!(sales.total, Money::parse("25.50").unwrap());

        let yesterday = today.pred_opt().unwrap();
        let empty = db.reports().daily_sales(None, yesterday).await.unwrap();
        assert_eq!(empty.order_count, 0);
        assert_eq!(empty.total, Money::from_cents(0));
    }

    #[tokio::test]
    async fn test_popular_items_ranked_by_quantity() {
        let db = fixtures::db().await;
        let r = fixtures::restaurant(&db).await;
        let burger = fixtures::menu_item(&db, &r.id, "Burger", "10.00").await;
        let fries = fixtures::menu_item(&db, &r.id, "Fries", "5.50").await;
        let soup = fixtures::menu_item(&db, &r.id, "Soup", "6.00").await;

        for lines in [
            vec![(burger.id.as_str(), 1), (fries.id.as_str(), 2)],
            vec![(fries.id.as_str(), 3)],
            vec![(burger.id.as_str(), 2)],
        ] {
            let o = db.orders().create_order(&order(&r.id, &lines)).await.unwrap();
            db.orders().pay_order(&o.id).await.unwrap();
        }
        // Unpaid soup does not rank.
        db.orders()
            .create_order(&order(&r.id, &[(soup.id.as_str(), 10)]))
            .await
            .unwrap();

        let since = Utc::now() - Duration::days(7);
        let ranked = db.reports().popular_items(Some(&r.id), since, 10).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "Fries");
        assert_eq!(ranked[0].total_quantity, 5);
        assert_eq!(ranked[0].revenue_cents, 2750);
        assert_eq!(ranked[1].name, "Burger");
        assert_eq!(ranked[1].total_quantity, 3);

        let top = db
            .reports()
            .popular_items_recent(
                Some(&r.id),
                &ReportSettings {
                    popular_items_days: 7,
                    popular_items_limit: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].menu_item_id, fries.id);

        let future = db
            .reports()
            .popular_items(None, Utc::now() + Duration::days(1), 10)
            .await
            .unwrap();
        assert!(future.is_empty());
    }
}
