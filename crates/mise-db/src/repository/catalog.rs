//! # Catalog Repository
//!
//! Restaurants, their dining tables and their menu.
//!
//! Menu price changes never touch existing order lines: lines carry their own
//! `unit_price_cents` snapshot.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use mise_core::validation::{validate_name, validate_price, validate_table};
use mise_core::{new_id, DiningTable, MenuItem, Money, NewMenuItem, Restaurant};

/// Repository for restaurants, tables and menu items.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        CatalogRepository { pool, retry }
    }

    // =========================================================================
    // Restaurants
    // =========================================================================

    pub async fn create_restaurant(
        &self,
        name: &str,
        address: &str,
        phone_number: Option<&str>,
    ) -> DbResult<Restaurant> {
        validate_name("name", name)?;
        validate_name("address", address)?;
        self.retry
            .run("create_restaurant", || {
                self.insert_restaurant(name, address, phone_number)
            })
            .await
    }

    async fn insert_restaurant(
        &self,
        name: &str,
        address: &str,
        phone_number: Option<&str>,
    ) -> DbResult<Restaurant> {
        let restaurant: Restaurant = sqlx::query_as(
            r#"
            INSERT INTO restaurants (id, name, address, phone_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(name.trim())
        .bind(address.trim())
        .bind(phone_number)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(id = %restaurant.id, name = %restaurant.name, "Restaurant created");
        Ok(restaurant)
    }

    pub async fn get_restaurant(&self, id: &str) -> DbResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as("SELECT * FROM restaurants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(restaurant)
    }

    pub async fn list_restaurants(&self) -> DbResult<Vec<Restaurant>> {
        let restaurants = sqlx::query_as("SELECT * FROM restaurants ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(restaurants)
    }

    // =========================================================================
    // Dining Tables
    // =========================================================================

    /// Adds a table. Table numbers are unique per restaurant.
    pub async fn create_table(
        &self,
        restaurant_id: &str,
        table_number: i64,
        capacity: i64,
    ) -> DbResult<DiningTable> {
        validate_table(table_number, capacity)?;
        self.retry
            .run("create_table", || {
                self.insert_table(restaurant_id, table_number, capacity)
            })
            .await
    }

    async fn insert_table(
        &self,
        restaurant_id: &str,
        table_number: i64,
        capacity: i64,
    ) -> DbResult<DiningTable> {
        let now = Utc::now();

        let result: Result<DiningTable, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO dining_tables (
                id, restaurant_id, table_number, capacity, is_occupied,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(restaurant_id)
        .bind(table_number)
        .bind(capacity)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(table) => {
                debug!(restaurant_id, table_number, "Table created");
                Ok(table)
            }
            Err(err) => match DbError::from(err) {
                DbError::UniqueViolation { .. } => {
                    Err(DbError::duplicate("table_number", table_number.to_string()))
                }
                other => Err(other),
            },
        }
    }

    pub async fn get_table(&self, id: &str) -> DbResult<Option<DiningTable>> {
        let table = sqlx::query_as("SELECT * FROM dining_tables WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(table)
    }

    pub async fn list_tables(&self, restaurant_id: &str) -> DbResult<Vec<DiningTable>> {
        let tables = sqlx::query_as(
            "SELECT * FROM dining_tables WHERE restaurant_id = ?1 ORDER BY table_number",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    /// Flags a table as occupied or free. Reservations do not consult this.
    pub async fn set_table_occupied(&self, id: &str, occupied: bool) -> DbResult<DiningTable> {
        self.retry
            .run("set_table_occupied", || self.set_occupied_once(id, occupied))
            .await
    }

    async fn set_occupied_once(&self, id: &str, occupied: bool) -> DbResult<DiningTable> {
        sqlx::query_as(
            "UPDATE dining_tables SET is_occupied = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(occupied)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Table", id))
    }

    // =========================================================================
    // Menu
    // =========================================================================

    pub async fn create_menu_item(&self, item: &NewMenuItem) -> DbResult<MenuItem> {
        item.validate()?;
        self.retry
            .run("create_menu_item", || self.insert_menu_item(item))
            .await
    }

    async fn insert_menu_item(&self, item: &NewMenuItem) -> DbResult<MenuItem> {
        let now = Utc::now();

        let menu_item: MenuItem = sqlx::query_as(
            r#"
            INSERT INTO menu_items (
                id, restaurant_id, name, description, category,
                price_cents, is_available, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&item.restaurant_id)
        .bind(item.name.trim())
        .bind(&item.description)
        .bind(item.category)
        .bind(item.price.cents())
        .bind(item.is_available)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = %menu_item.id, name = %menu_item.name, price = %menu_item.price(), "Menu item created");
        Ok(menu_item)
    }

    pub async fn get_menu_item(&self, id: &str) -> DbResult<Option<MenuItem>> {
        let item = sqlx::query_as("SELECT * FROM menu_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Lists a restaurant's menu, or every restaurant's when `restaurant_id`
    /// is `None`.
    pub async fn list_menu(
        &self,
        restaurant_id: Option<&str>,
        available_only: bool,
    ) -> DbResult<Vec<MenuItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT * FROM menu_items
            WHERE (?1 IS NULL OR restaurant_id = ?1)
              AND (?2 = 0 OR is_available = 1)
            ORDER BY category, name
            "#,
        )
        .bind(restaurant_id)
        .bind(available_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Changes the current price. Existing order lines keep their snapshot.
    pub async fn update_menu_price(&self, id: &str, price: Money) -> DbResult<MenuItem> {
        validate_price(price)?;
        self.retry
            .run("update_menu_price", || self.update_price_once(id, price))
            .await
    }

    async fn update_price_once(&self, id: &str, price: Money) -> DbResult<MenuItem> {
        let item: MenuItem = sqlx::query_as(
            "UPDATE menu_items SET price_cents = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(price.cents())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("MenuItem", id))?;

        info!(id, price = %price, "Menu price updated");
        Ok(item)
    }

    pub async fn set_menu_item_available(&self, id: &str, available: bool) -> DbResult<MenuItem> {
        self.retry
            .run("set_menu_item_available", || self.set_available_once(id, available))
            .await
    }

    async fn set_available_once(&self, id: &str, available: bool) -> DbResult<MenuItem> {
        sqlx::query_as(
            "UPDATE menu_items SET is_available = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(available)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("MenuItem", id))
    }
}
