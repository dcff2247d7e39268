//! # Recipe Repository
//!
//! Bill of materials rows: how much of which ingredient one portion of a
//! menu item consumes.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use mise_core::{new_id, CoreError, NewRecipe, Recipe, RecipeMap};

/// Repository for recipes.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl RecipeRepository {
    /// Creates a new RecipeRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        RecipeRepository { pool, retry }
    }

    /// Links an ingredient to a menu item. Both must belong to the same
    /// restaurant.
    pub async fn add(&self, recipe: &NewRecipe) -> DbResult<Recipe> {
        recipe.validate()?;
        self.retry.run("add_recipe", || self.add_once(recipe)).await
    }

    async fn add_once(&self, recipe: &NewRecipe) -> DbResult<Recipe> {

        let menu_restaurant: Option<String> =
            sqlx::query_scalar("SELECT restaurant_id FROM menu_items WHERE id = ?1")
                .bind(&recipe.menu_item_id)
                .fetch_optional(&self.pool)
                .await?;
        let menu_restaurant =
            menu_restaurant.ok_or_else(|| DbError::not_found("MenuItem", &recipe.menu_item_id))?;

        let ingredient_restaurant: Option<String> =
            sqlx::query_scalar("SELECT restaurant_id FROM inventory_items WHERE id = ?1")
                .bind(&recipe.ingredient_id)
                .fetch_optional(&self.pool)
                .await?;
        let ingredient_restaurant = ingredient_restaurant
            .ok_or_else(|| DbError::not_found("InventoryItem", &recipe.ingredient_id))?;

        if menu_restaurant != ingredient_restaurant {
            return Err(CoreError::ForeignRestaurant {
                entity: "ingredient",
                id: recipe.ingredient_id.clone(),
                restaurant_id: menu_restaurant,
            }
            .into());
        }

        let row: Recipe = sqlx::query_as(
            r#"
            INSERT INTO recipes (id, menu_item_id, ingredient_id, quantity_used_milli, unit, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&recipe.menu_item_id)
        .bind(&recipe.ingredient_id)
        .bind(recipe.quantity_used.milli())
        .bind(recipe.unit.trim())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(
            menu_item_id = %row.menu_item_id,
            ingredient_id = %row.ingredient_id,
            quantity_used = %row.quantity_used(),
            "Recipe added"
        );
        Ok(row)
    }

    pub async fn list_for_menu_item(&self, menu_item_id: &str) -> DbResult<Vec<Recipe>> {
        let recipes = sqlx::query_as(
            "SELECT * FROM recipes WHERE menu_item_id = ?1 ORDER BY ingredient_id",
        )
        .bind(menu_item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(recipes)
    }

    /// Deletes one recipe row. Returns false if it did not exist.
    pub async fn remove(&self, id: &str) -> DbResult<bool> {
        self.retry.run("remove_recipe", || self.remove_once(id)).await
    }

    async fn remove_once(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Loads the recipes of every listed menu item in one query.
pub(crate) async fn recipe_map_for(
    conn: &mut SqliteConnection,
    menu_item_ids: &[String],
) -> DbResult<RecipeMap> {
    if menu_item_ids.is_empty() {
        return Ok(RecipeMap::new());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM recipes WHERE menu_item_id IN (");
    let mut separated = query.separated(", ");
    for id in menu_item_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let recipes: Vec<Recipe> = query.build_query_as().fetch_all(&mut *conn).await?;
    Ok(RecipeMap::from_recipes(recipes))
}
