//! # Order Repository
//!
//! The order engine: line items, totals, status changes and payment.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create_order() → Order { status: Pending, total: Σ lines }     │
//! │                                                                         │
//! │  2. EDIT LINES (Pending / Preparing / Served only)                     │
//! │     └── add_item() / update_item_quantity() / remove_item()            │
//! │         each recomputes total = Σ subtotal in the same transaction     │
//! │                                                                         │
//! │  3. PROGRESS                                                           │
//! │     └── set_status(Preparing | Served | Cancelled)                     │
//! │                                                                         │
//! │  4. PAY                                                                │
//! │     └── pay_order() / set_status(Paid)                                 │
//! │         status → Paid AND ingredient deduction in ONE transaction,    │
//! │         exactly once per order                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{inventory, recipe};
use crate::retry::RetryPolicy;
use mise_core::validation::validate_quantity;
use mise_core::{
    new_id, CoreError, MenuItem, NewOrder, Order, OrderItem, OrderStatus, PaymentReceipt,
};

/// Repository for orders and their lines.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        OrderRepository { pool, retry }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets all lines of an order, oldest first.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, order_id).await
    }

    /// Lists orders, optionally filtered by restaurant and status, newest first.
    pub async fn list(
        &self,
        restaurant_id: Option<&str>,
        status: Option<OrderStatus>,
    ) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as(
            r#"
            SELECT * FROM orders
            WHERE (?1 IS NULL OR restaurant_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(restaurant_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    // =========================================================================
    // Creation & Lines
    // =========================================================================

    /// Creates an order with its initial lines in one transaction.
    ///
    /// Every line is validated and priced; if any line fails, nothing is
    /// stored.
    pub async fn create_order(&self, new_order: &NewOrder) -> DbResult<Order> {
        new_order.validate()?;
        self.retry
            .run("create_order", || self.create_once(new_order))
            .await
    }

    async fn create_once(&self, new_order: &NewOrder) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let order: Order = sqlx::query_as(
            r#"
            INSERT INTO orders (
                id, restaurant_id, table_id, reservation_id,
                customer_name, customer_phone, status, total_cents,
                created_at, updated_at, paid_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8, NULL)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&new_order.restaurant_id)
        .bind(&new_order.table_id)
        .bind(&new_order.reservation_id)
        .bind(new_order.customer_name.as_deref().map(str::trim))
        .bind(new_order.customer_phone.as_deref().map(str::trim))
        .bind(OrderStatus::Pending)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        check_links(&mut tx, &order).await?;

        for line in &new_order.items {
            insert_line(&mut tx, &order, &line.menu_item_id, line.quantity).await?;
        }

        let order = recompute_total(&mut tx, &order.id).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            lines = new_order.items.len(),
            total = %order.total(),
            "Order created"
        );
        Ok(order)
    }

    /// Adds a line at the menu item's current price. The order total is
    /// recomputed in the same transaction.
    ///
    /// Adding the same menu item twice creates two lines.
    pub async fn add_item(
        &self,
        order_id: &str,
        menu_item_id: &str,
        quantity: i64,
    ) -> DbResult<OrderItem> {
        validate_quantity(quantity)?;
        self.retry
            .run("add_item", || self.add_item_once(order_id, menu_item_id, quantity))
            .await
    }

    async fn add_item_once(
        &self,
        order_id: &str,
        menu_item_id: &str,
        quantity: i64,
    ) -> DbResult<OrderItem> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        ensure_open(&order)?;
        let item = insert_line(&mut tx, &order, menu_item_id, quantity).await?;
        recompute_total(&mut tx, order_id).await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Changes a line's quantity and re-prices it at the menu item's current
    /// price.
    pub async fn update_item_quantity(&self, item_id: &str, quantity: i64) -> DbResult<OrderItem> {
        validate_quantity(quantity)?;
        self.retry
            .run("update_item_quantity", || self.update_item_once(item_id, quantity))
            .await
    }

    async fn update_item_once(&self, item_id: &str, quantity: i64) -> DbResult<OrderItem> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order_of_item(&mut tx, item_id).await?;
        ensure_open(&order)?;

        let item: OrderItem = sqlx::query_as("SELECT * FROM order_items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("OrderItem", item_id))?;
        let menu_item = fetch_menu_item(&mut tx, &item.menu_item_id).await?;

        let unit_price = menu_item.price();
        let subtotal = OrderItem::price_line(unit_price, quantity)?;

        let updated: OrderItem = sqlx::query_as(
            r#"
            UPDATE order_items
            SET quantity = ?1, unit_price_cents = ?2, subtotal_cents = ?3, updated_at = ?4
            WHERE id = ?5
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(unit_price.cents())
        .bind(subtotal.cents())
        .bind(Utc::now())
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        recompute_total(&mut tx, &order.id).await?;
        tx.commit().await?;

        debug!(item_id, quantity, subtotal = %subtotal, "Order line updated");
        Ok(updated)
    }

    /// Removes a line and returns the updated order.
    pub async fn remove_item(&self, item_id: &str) -> DbResult<Order> {
        self.retry
            .run("remove_item", || self.remove_item_once(item_id))
            .await
    }

    async fn remove_item_once(&self, item_id: &str) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order_of_item(&mut tx, item_id).await?;
        ensure_open(&order)?;

        sqlx::query("DELETE FROM order_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        let order = recompute_total(&mut tx, &order.id).await?;
        tx.commit().await?;

        debug!(item_id, order_id = %order.id, "Order line removed");
        Ok(order)
    }

    // =========================================================================
    // Status & Payment
    // =========================================================================

    /// Parses `status` and applies it. Unknown names are rejected before any
    /// lookup.
    pub async fn set_status_str(&self, order_id: &str, status: &str) -> DbResult<Order> {
        let next: OrderStatus = status.parse()?;
        self.set_status(order_id, next).await
    }

    /// Moves an order to `next`.
    ///
    /// Moving to Paid goes through [`pay_order`](Self::pay_order), so the
    /// inventory deduction happens whichever entry point is used. Repeating
    /// the current status changes nothing.
    pub async fn set_status(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        if next == OrderStatus::Paid {
            return Ok(self.pay_order(order_id).await?.order);
        }
        self.retry
            .run("set_order_status", || self.set_status_once(order_id, next))
            .await
    }

    async fn set_status_once(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        order.status.transition(next)?;
        if order.status.is_noop(next) {
            return Ok(order);
        }

        let updated: Order = sqlx::query_as(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(next)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(order_id, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }

    /// Cancels an open order. No stock is touched.
    pub async fn cancel_order(&self, order_id: &str) -> DbResult<Order> {
        self.set_status(order_id, OrderStatus::Cancelled).await
    }

    /// Marks the order Paid and deducts every ingredient its lines consume.
    ///
    /// ## Transaction
    /// ```text
    /// BEGIN
    ///   lock order row ─── already Paid?  → return it, deduct nothing
    ///                 └─── Cancelled?     → InvalidTransition
    ///   status = paid, paid_at = now
    ///   load lines + recipes (one query)  → aggregate per ingredient
    ///   quantity -= amount  (per ingredient, in-row)
    /// COMMIT
    /// ```
    /// A failure anywhere rolls back both the status change and every
    /// deduction.
    pub async fn pay_order(&self, order_id: &str) -> DbResult<PaymentReceipt> {
        self.retry
            .run("pay_order", || self.pay_once(order_id))
            .await
    }

    async fn pay_once(&self, order_id: &str) -> DbResult<PaymentReceipt> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, order_id).await?;
        if order.status == OrderStatus::Paid {
            debug!(order_id, "Order already paid, nothing to deduct");
            return Ok(PaymentReceipt {
                order,
                stock: Vec::new(),
                already_paid: true,
            });
        }
        order.status.transition(OrderStatus::Paid)?;

        let now = Utc::now();
        let paid: Order = sqlx::query_as(
            r#"
            UPDATE orders SET status = ?1, paid_at = ?2, updated_at = ?2
            WHERE id = ?3
            RETURNING *
            "#,
        )
        .bind(OrderStatus::Paid)
        .bind(now)
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        let items = fetch_items(&mut tx, order_id).await?;
        let mut menu_item_ids: Vec<String> =
            items.iter().map(|item| item.menu_item_id.clone()).collect();
        menu_item_ids.sort();
        menu_item_ids.dedup();

        let recipes = recipe::recipe_map_for(&mut tx, &menu_item_ids).await?;
        let deductions = recipes.deductions_for(&items)?;
        let stock = inventory::apply_deductions(&mut tx, &deductions).await?;

        tx.commit().await?;

        info!(
            order_id,
            total = %paid.total(),
            ingredients = deductions.len(),
            "Order paid"
        );
        Ok(PaymentReceipt {
            order: paid,
            stock,
            already_paid: false,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Writes the order row first so concurrent writers to it queue up behind
/// this transaction, then returns its current state.
async fn lock_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    sqlx::query_as("UPDATE orders SET updated_at = ?1 WHERE id = ?2 RETURNING *")
        .bind(Utc::now())
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

/// [`lock_order`] for the order owning `item_id`.
async fn lock_order_of_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Order> {
    sqlx::query_as(
        r#"
        UPDATE orders SET updated_at = ?1
        WHERE id = (SELECT order_id FROM order_items WHERE id = ?2)
        RETURNING *
        "#,
    )
    .bind(Utc::now())
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("OrderItem", item_id))
}

fn ensure_open(order: &Order) -> DbResult<()> {
    if !order.status.accepts_item_changes() {
        return Err(CoreError::OrderClosed {
            order_id: order.id.clone(),
            status: order.status,
        }
        .into());
    }
    Ok(())
}

/// Checks that the optional table and reservation belong to the order's
/// restaurant.
async fn check_links(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    if let Some(table_id) = &order.table_id {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT restaurant_id FROM dining_tables WHERE id = ?1")
                .bind(table_id)
                .fetch_optional(&mut *conn)
                .await?;
        ensure_same_restaurant("table", table_id, owner, &order.restaurant_id)?;
    }

    if let Some(reservation_id) = &order.reservation_id {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT restaurant_id FROM reservations WHERE id = ?1")
                .bind(reservation_id)
                .fetch_optional(&mut *conn)
                .await?;
        ensure_same_restaurant("reservation", reservation_id, owner, &order.restaurant_id)?;
    }

    Ok(())
}

fn ensure_same_restaurant(
    entity: &'static str,
    id: &str,
    owner: Option<String>,
    restaurant_id: &str,
) -> DbResult<()> {
    match owner {
        None => Err(DbError::not_found(entity, id)),
        Some(owner) if owner != restaurant_id => Err(CoreError::ForeignRestaurant {
            entity,
            id: id.to_string(),
            restaurant_id: restaurant_id.to_string(),
        }
        .into()),
        Some(_) => Ok(()),
    }
}

async fn fetch_menu_item(conn: &mut SqliteConnection, menu_item_id: &str) -> DbResult<MenuItem> {
    sqlx::query_as("SELECT * FROM menu_items WHERE id = ?1")
        .bind(menu_item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("MenuItem", menu_item_id))
}

/// Validates the menu item against the order and inserts a priced line.
async fn insert_line(
    conn: &mut SqliteConnection,
    order: &Order,
    menu_item_id: &str,
    quantity: i64,
) -> DbResult<OrderItem> {
    let menu_item = fetch_menu_item(conn, menu_item_id).await?;

    if menu_item.restaurant_id != order.restaurant_id {
        return Err(CoreError::ForeignRestaurant {
            entity: "menu item",
            id: menu_item.id,
            restaurant_id: order.restaurant_id.clone(),
        }
        .into());
    }
    if !menu_item.is_available {
        return Err(CoreError::MenuItemUnavailable(menu_item.id).into());
    }

    let unit_price = menu_item.price();
    let subtotal = OrderItem::price_line(unit_price, quantity)?;
    let now = Utc::now();

    let item: OrderItem = sqlx::query_as(
        r#"
        INSERT INTO order_items (
            id, order_id, menu_item_id, quantity,
            unit_price_cents, subtotal_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        RETURNING *
        "#,
    )
    .bind(new_id())
    .bind(&order.id)
    .bind(menu_item_id)
    .bind(quantity)
    .bind(unit_price.cents())
    .bind(subtotal.cents())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    debug!(
        order_id = %order.id,
        menu_item = %menu_item.name,
        quantity,
        subtotal = %subtotal,
        "Order line added"
    );
    Ok(item)
}

/// Sets `total_cents` to the sum of the order's subtotals.
async fn recompute_total(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    sqlx::query_as(
        r#"
        UPDATE orders
        SET total_cents = (
                SELECT COALESCE(SUM(subtotal_cents), 0) FROM order_items WHERE order_id = ?1
            ),
            updated_at = ?2
        WHERE id = ?1
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Order", order_id))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as(
        "SELECT * FROM order_items WHERE order_id = ?1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::fixtures;
    use mise_core::{ErrorKind, MenuCategory, Money, NewMenuItem, NewOrderLine, Quantity};

    struct Kitchen {
        db: Database,
        restaurant_id: String,
        burger: MenuItem,
        fries: MenuItem,
        beef_id: String,
    }

    async fn kitchen() -> Kitchen {
        let db = fixtures::db().await;
        let r = fixtures::restaurant(&db).await;
        let burger = fixtures::menu_item(&db, &r.id, "Burger", "10.00").await;
        let fries = fixtures::menu_item(&db, &r.id, "Fries", "5.50").await;
        let beef = fixtures::ingredient(&db, &r.id, "Beef", "10", "2").await;
        fixtures::recipe(&db, &burger.id, &beef.id, "0.2").await;

        Kitchen {
            db,
            restaurant_id: r.id,
            burger,
            fries,
            beef_id: beef.id,
        }
    }

    async fn total_of(k: &Kitchen, order_id: &str) -> i64 {
        k.db.orders().get(order_id).await.unwrap().unwrap().total_cents
    }

    fn new_order(k: &Kitchen, lines: &[(&MenuItem, i64)]) -> NewOrder {
        NewOrder {
            restaurant_id: k.restaurant_id.clone(),
            items: lines
                .iter()
                .map(|(item, quantity)| NewOrderLine {
                    menu_item_id: item.id.clone(),
                    quantity: *quantity,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_order_totals_lines() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 2), (&k.fries, 1)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total(), Money::parse("25.50").unwrap());

        let items = k.db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(mise_core::order_total(&items), order.total());
    }

    #[tokio::test]
    async fn test_create_order_is_all_or_nothing() {
        let k = kitchen().await;
        k.db
            .catalog()
            .set_menu_item_available(&k.fries.id, false)
            .await
            .unwrap();

        let result = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1), (&k.fries, 1)]))
            .await;
        assert!(matches!(
            result,
            Err(DbError::Core(CoreError::MenuItemUnavailable(_)))
        ));
        assert!(k.db.orders().list(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_menu_change() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();

        k.db
            .catalog()
            .update_menu_price(&k.burger.id, Money::parse("12.00").unwrap())
            .await
            .unwrap();

        let items = k.db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 1000);
        assert_eq!(k.db.orders().get(&order.id).await.unwrap().unwrap().total_cents, 1000);

        // New lines and re-saved lines use the new price.
        let added = k.db.orders().add_item(&order.id, &k.burger.id, 1).await.unwrap();
        assert_eq!(added.unit_price_cents, 1200);
        assert_eq!(total_of(&k, &order.id).await, 2200);

        let resaved = k
            .db
            .orders()
            .update_item_quantity(&items[0].id, 2)
            .await
            .unwrap();
        assert_eq!(resaved.subtotal_cents, 2400);
        assert_eq!(total_of(&k, &order.id).await, 3600);
    }

    #[tokio::test]
    async fn test_line_edits_keep_total_in_sync() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[]))
            .await
            .unwrap();
        assert_eq!(order.total_cents, 0);

        let first = k.db.orders().add_item(&order.id, &k.burger.id, 2).await.unwrap();
        assert_eq!(first.subtotal_cents, 2000);
        assert_eq!(total_of(&k, &order.id).await, 2000);
        k.db.orders().add_item(&order.id, &k.burger.id, 1).await.unwrap();
        assert_eq!(total_of(&k, &order.id).await, 3000);

        let items = k.db.orders().get_items(&order.id).await.unwrap();
        assert_eq!(items.len(), 2);

        let order = k.db.orders().remove_item(&items[0].id).await.unwrap();
        assert_eq!(order.total_cents, 1000);

        assert!(k.db.orders().update_item_quantity(&items[1].id, 0).await.is_err());
        assert!(matches!(
            k.db.orders().remove_item(&items[0].id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_pay_deducts_inventory_once() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 3), (&k.fries, 2)]))
            .await
            .unwrap();

        let receipt = k.db.orders().pay_order(&order.id).await.unwrap();
        assert!(!receipt.already_paid);
        assert_eq!(receipt.order.status, OrderStatus::Paid);
        assert!(receipt.order.paid_at.is_some());
        assert_eq!(receipt.stock.len(), 1);
        assert_eq!(receipt.stock[0].quantity(), Quantity::parse("9.4").unwrap());

        let again = k.db.orders().pay_order(&order.id).await.unwrap();
        assert!(again.already_paid);
        assert!(again.stock.is_empty());

        let order = k.db.orders().set_status(&order.id, OrderStatus::Paid).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::parse("9.4").unwrap());
    }

    #[tokio::test]
    async fn test_failed_deduction_rolls_back_payment() {
        let k = kitchen().await;
        let bun = fixtures::ingredient(&k.db, &k.restaurant_id, "Bun", "50", "5").await;
        fixtures::recipe(&k.db, &k.burger.id, &bun.id, "1").await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 2)]))
            .await
            .unwrap();

        // Deductions run in ingredient id order. Jam the later ingredient so
        // the earlier one is already written when the payment aborts.
        let jammed = std::cmp::max(k.beef_id.clone(), bun.id.clone());
        sqlx::query(&format!(
            "CREATE TRIGGER jammed_shelf BEFORE UPDATE OF quantity_milli ON inventory_items \
             WHEN OLD.id = '{jammed}' BEGIN SELECT RAISE(ABORT, 'shelf jammed'); END"
        ))
        .execute(k.db.pool())
        .await
        .unwrap();

        let err = k.db.orders().pay_order(&order.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);

        let unpaid = k.db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(unpaid.status, OrderStatus::Pending);
        assert!(unpaid.paid_at.is_none());
        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::from_units(10));
        let buns = k.db.inventory().get(&bun.id).await.unwrap().unwrap();
        assert_eq!(buns.quantity(), Quantity::from_units(50));

        sqlx::query("DROP TRIGGER jammed_shelf")
            .execute(k.db.pool())
            .await
            .unwrap();
        let receipt = k.db.orders().pay_order(&order.id).await.unwrap();
        assert!(!receipt.already_paid);
        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::parse("9.6").unwrap());
        let buns = k.db.inventory().get(&bun.id).await.unwrap().unwrap();
        assert_eq!(buns.quantity(), Quantity::from_units(48));
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected_not_wrapped() {
        let k = kitchen().await;
        let rejected = k
            .db
            .catalog()
            .create_menu_item(&NewMenuItem {
                restaurant_id: k.restaurant_id.clone(),
                name: "Gold Leaf Steak".to_string(),
                description: None,
                category: MenuCategory::MainCourse,
                price: Money::parse("50000000000000000.00").unwrap(),
                is_available: true,
            })
            .await;
        assert_eq!(rejected.unwrap_err().kind(), ErrorKind::Validation);

        // A stored price past the limit still cannot wrap a subtotal.
        sqlx::query("UPDATE menu_items SET price_cents = ?1 WHERE id = ?2")
            .bind(i64::MAX / 2)
            .bind(&k.fries.id)
            .execute(k.db.pool())
            .await
            .unwrap();
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();
        let err = k.db.orders().add_item(&order.id, &k.fries.id, 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(total_of(&k, &order.id).await, 1000);
        assert_eq!(k.db.orders().get_items(&order.id).await.unwrap().len(), 1);

        // Same for recipe amounts at payment time.
        sqlx::query("UPDATE recipes SET quantity_used_milli = ?1")
            .bind(i64::MAX / 2)
            .execute(k.db.pool())
            .await
            .unwrap();
        let big = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 3)]))
            .await
            .unwrap();
        let err = k.db.orders().pay_order(&big.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let unpaid = k.db.orders().get(&big.id).await.unwrap().unwrap();
        assert_eq!(unpaid.status, OrderStatus::Pending);
        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_set_status_paid_deducts() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();

        k.db.orders().set_status_str(&order.id, "Preparing").await.unwrap();
        k.db.orders().set_status_str(&order.id, "served").await.unwrap();
        let paid = k.db.orders().set_status_str(&order.id, "Paid").await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);

        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::parse("9.8").unwrap());
    }

    #[tokio::test]
    async fn test_terminal_orders_are_frozen() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();
        k.db.orders().cancel_order(&order.id).await.unwrap();

        let paid = k.db.orders().pay_order(&order.id).await;
        assert!(matches!(
            paid,
            Err(DbError::Core(CoreError::InvalidTransition { .. }))
        ));

        let added = k.db.orders().add_item(&order.id, &k.fries.id, 1).await;
        assert!(matches!(added, Err(DbError::Core(CoreError::OrderClosed { .. }))));

        let beef = k.db.inventory().get(&k.beef_id).await.unwrap().unwrap();
        assert_eq!(beef.quantity(), Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_status_validation() {
        let k = kitchen().await;
        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();

        let unknown = k.db.orders().set_status_str(&order.id, "Refunded").await;
        assert_eq!(unknown.unwrap_err().kind(), ErrorKind::InvalidTransition);

        k.db.orders().set_status(&order.id, OrderStatus::Served).await.unwrap();
        let backwards = k.db.orders().set_status(&order.id, OrderStatus::Preparing).await;
        assert!(backwards.is_err());

        let same = k.db.orders().set_status(&order.id, OrderStatus::Served).await.unwrap();
        assert_eq!(same.status, OrderStatus::Served);

        let missing = k.db.orders().set_status("missing", OrderStatus::Served).await;
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_foreign_menu_item_and_table() {
        let k = kitchen().await;
        let other = fixtures::restaurant(&k.db).await;
        let foreign = fixtures::menu_item(&k.db, &other.id, "Pho", "9.00").await;
        let foreign_table = k.db.catalog().create_table(&other.id, 1, 4).await.unwrap();

        let order = k
            .db
            .orders()
            .create_order(&new_order(&k, &[]))
            .await
            .unwrap();
        let result = k.db.orders().add_item(&order.id, &foreign.id, 1).await;
        assert!(matches!(
            result,
            Err(DbError::Core(CoreError::ForeignRestaurant { .. }))
        ));

        let mut at_table = new_order(&k, &[(&k.burger, 1)]);
        at_table.table_id = Some(foreign_table.id);
        assert!(matches!(
            k.db.orders().create_order(&at_table).await,
            Err(DbError::Core(CoreError::ForeignRestaurant { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let k = kitchen().await;
        let a = k
            .db
            .orders()
            .create_order(&new_order(&k, &[(&k.burger, 1)]))
            .await
            .unwrap();
        k.db
            .orders()
            .create_order(&new_order(&k, &[(&k.fries, 1)]))
            .await
            .unwrap();
        k.db.orders().pay_order(&a.id).await.unwrap();

        let paid = k
            .db
            .orders()
            .list(Some(&k.restaurant_id), Some(OrderStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].id, a.id);

        let all = k.db.orders().list(Some(&k.restaurant_id), None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
