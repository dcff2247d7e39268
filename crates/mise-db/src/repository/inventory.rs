//! # Inventory Repository
//!
//! Ingredient stock levels.
//!
//! ## Deduction
//! ```text
//! UPDATE inventory_items
//!    SET quantity_milli = quantity_milli - :amount      ← read-modify-write in
//!  WHERE id = :ingredient                                 one statement, so two
//! RETURNING *                                             payments never lose
//!                                                         each other's update
//! ```
//!
//! Stock has no floor. A deduction that takes it below zero is applied and
//! logged; [`InventoryItem::is_overdrawn`] reports it.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use mise_core::validation::validate_recipe_quantity;
use mise_core::{new_id, InventoryItem, NewIngredient, Quantity, StockDeduction};

/// Repository for ingredient stock.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        InventoryRepository { pool, retry }
    }

    pub async fn create_ingredient(&self, ingredient: &NewIngredient) -> DbResult<InventoryItem> {
        ingredient.validate()?;
        self.retry
            .run("create_ingredient", || self.insert_ingredient(ingredient))
            .await
    }

    async fn insert_ingredient(&self, ingredient: &NewIngredient) -> DbResult<InventoryItem> {
        let now = Utc::now();

        let item: InventoryItem = sqlx::query_as(
            r#"
            INSERT INTO inventory_items (
                id, restaurant_id, name, unit, quantity_milli, alert_threshold_milli,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&ingredient.restaurant_id)
        .bind(ingredient.name.trim())
        .bind(ingredient.unit)
        .bind(ingredient.quantity.milli())
        .bind(ingredient.alert_threshold.milli())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = %item.id, name = %item.name, quantity = %item.quantity(), "Ingredient created");
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let item = sqlx::query_as("SELECT * FROM inventory_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Lists stock for one restaurant, or all when `restaurant_id` is `None`.
    pub async fn list(&self, restaurant_id: Option<&str>) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as(
            "SELECT * FROM inventory_items WHERE (?1 IS NULL OR restaurant_id = ?1) ORDER BY name",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Returns true if the ingredient's stock is below its alert threshold.
    pub async fn is_low_stock(&self, id: &str) -> DbResult<bool> {
        let item = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", id))?;
        Ok(item.is_low_stock())
    }

    /// Ingredients whose stock is below their alert threshold, in insertion
    /// order.
    pub async fn list_low_stock(&self, restaurant_id: Option<&str>) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT * FROM inventory_items
            WHERE quantity_milli < alert_threshold_milli
              AND (?1 IS NULL OR restaurant_id = ?1)
            ORDER BY rowid
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Ingredients deducted past zero.
    pub async fn list_overdrawn(&self, restaurant_id: Option<&str>) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT * FROM inventory_items
            WHERE quantity_milli < 0
              AND (?1 IS NULL OR restaurant_id = ?1)
            ORDER BY quantity_milli
            "#,
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Adds `delta` to the stock (negative to write off). Used for deliveries
    /// and stock counts.
    pub async fn adjust(&self, id: &str, delta: Quantity) -> DbResult<InventoryItem> {
        self.retry
            .run("adjust_stock", || self.adjust_once(id, delta))
            .await
    }

    async fn adjust_once(&self, id: &str, delta: Quantity) -> DbResult<InventoryItem> {
        let item: InventoryItem = sqlx::query_as(
            r#"
            UPDATE inventory_items
            SET quantity_milli = quantity_milli + ?1, updated_at = ?2
            WHERE id = ?3
            RETURNING *
            "#,
        )
        .bind(delta.milli())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("InventoryItem", id))?;

        debug!(id, delta = %delta, quantity = %item.quantity(), "Stock adjusted");
        Ok(item)
    }

    /// Takes `amount` out of stock and returns the new level. The amount must
    /// be positive; the result may be negative.
    pub async fn deduct(&self, id: &str, amount: Quantity) -> DbResult<InventoryItem> {
        validate_recipe_quantity(amount)?;
        self.retry
            .run("deduct_stock", || self.deduct_once(id, amount))
            .await
    }

    async fn deduct_once(&self, id: &str, amount: Quantity) -> DbResult<InventoryItem> {
        let mut conn = self.pool.acquire().await?;
        deduct_on(&mut conn, id, amount).await
    }

    pub async fn set_alert_threshold(&self, id: &str, threshold: Quantity) -> DbResult<InventoryItem> {
        self.retry
            .run("set_alert_threshold", || self.set_threshold_once(id, threshold))
            .await
    }

    async fn set_threshold_once(&self, id: &str, threshold: Quantity) -> DbResult<InventoryItem> {
        sqlx::query_as(
            "UPDATE inventory_items SET alert_threshold_milli = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(threshold.milli())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("InventoryItem", id))
    }
}

/// Applies every deduction on `conn` (inside the caller's transaction).
///
/// Returns the resulting stock levels in the order given.
pub(crate) async fn apply_deductions(
    conn: &mut SqliteConnection,
    deductions: &[StockDeduction],
) -> DbResult<Vec<InventoryItem>> {
    let mut levels = Vec::with_capacity(deductions.len());
    for deduction in deductions {
        levels.push(deduct_on(&mut *conn, &deduction.ingredient_id, deduction.amount).await?);
    }
    Ok(levels)
}

async fn deduct_on(
    conn: &mut SqliteConnection,
    ingredient_id: &str,
    amount: Quantity,
) -> DbResult<InventoryItem> {
    let item: InventoryItem = sqlx::query_as(
        r#"
        UPDATE inventory_items
        SET quantity_milli = quantity_milli - ?1, updated_at = ?2
        WHERE id = ?3
        RETURNING *
        "#,
    )
    .bind(amount.milli())
    .bind(Utc::now())
    .bind(ingredient_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("InventoryItem", ingredient_id))?;

    if item.is_overdrawn() {
        warn!(
            ingredient = %item.name,
            id = %item.id,
            quantity = %item.quantity(),
            "Stock overdrawn"
        );
    } else if item.is_low_stock() {
        warn!(
            ingredient = %item.name,
            id = %item.id,
            quantity = %item.quantity(),
            threshold = %item.alert_threshold(),
            "Stock below alert threshold"
        );
    } else {
        debug!(ingredient = %item.name, deducted = %amount, quantity = %item.quantity(), "Stock deducted");
    }

    Ok(item)
}
