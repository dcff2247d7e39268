//! # Recipe Map
//!
//! Bill of materials per menu item and the aggregation that turns a paid
//! order into one stock deduction per ingredient.
//!
//! ```text
//! Order items                 Recipes                       Deductions
//! ───────────                 ───────                       ──────────
//! Burger × 3  ──────────────► beef 0.2 per burger ─────┐
//!                             bun  1   per burger ──┐  ├──► beef 0.6 + 0.2 = 0.8
//! Sliders × 1 ──────────────► beef 0.2 per slider ──┼──┘
//!                                                   └─────► bun  3
//! Soda × 2    ──────────────► (no recipe)                   (nothing)
//! ```
//!
//! Each ingredient appears exactly once in the output, so the ledger writes
//! every ingredient row once per payment.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::quantity::Quantity;
use crate::types::{OrderItem, Recipe};

/// Amount to take out of one ingredient's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDeduction {
    pub ingredient_id: String,
    pub amount: Quantity,
}

/// Recipes grouped by menu item.
#[derive(Debug, Clone, Default)]
pub struct RecipeMap {
    by_menu_item: HashMap<String, Vec<Recipe>>,
}

impl RecipeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups recipe rows by their menu item.
    pub fn from_recipes<I>(recipes: I) -> Self
    where
        I: IntoIterator<Item = Recipe>,
    {
        let mut by_menu_item: HashMap<String, Vec<Recipe>> = HashMap::new();
        for recipe in recipes {
            by_menu_item
                .entry(recipe.menu_item_id.clone())
                .or_default()
                .push(recipe);
        }
        RecipeMap { by_menu_item }
    }

    /// Recipes for one menu item; empty if it consumes nothing.
    pub fn recipes_for(&self, menu_item_id: &str) -> &[Recipe] {
        self.by_menu_item
            .get(menu_item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_menu_item.is_empty()
    }

    /// Sums `quantity_used × line quantity` per ingredient over `items`.
    ///
    /// Output is ordered by ingredient id so concurrent payments touch rows
    /// in the same order. An amount that overflows is an error, never a
    /// wrapped deduction.
    pub fn deductions_for(
        &self,
        items: &[OrderItem],
    ) -> Result<Vec<StockDeduction>, ValidationError> {
        let mut totals: BTreeMap<&str, Quantity> = BTreeMap::new();

        for item in items {
            for recipe in self.recipes_for(&item.menu_item_id) {
                let used = recipe.quantity_used().times(item.quantity)?;
                let total = totals.entry(recipe.ingredient_id.as_str()).or_default();
                *total = total.checked_add(used)?;
            }
        }

        Ok(totals
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(ingredient_id, amount)| StockDeduction {
                ingredient_id: ingredient_id.to_string(),
                amount,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recipe(menu_item: &str, ingredient: &str, per_portion: &str) -> Recipe {
        Recipe {
            id: crate::new_id(),
            menu_item_id: menu_item.to_string(),
            ingredient_id: ingredient.to_string(),
            quantity_used_milli: Quantity::parse(per_portion).unwrap().milli(),
            unit: "kg".to_string(),
            created_at: Utc::now(),
        }
    }

    fn line(menu_item: &str, quantity: i64) -> OrderItem {
        OrderItem {
            id: crate::new_id(),
            order_id: "order".to_string(),
            menu_item_id: menu_item.to_string(),
            quantity,
            unit_price_cents: 1000,
            subtotal_cents: 1000 * quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_burger_example() {
        let map = RecipeMap::from_recipes([recipe("burger", "beef", "0.2")]);
        let deductions = map.deductions_for(&[line("burger", 3)]).unwrap();

        assert_eq!(
            deductions,
            vec![StockDeduction {
                ingredient_id: "beef".to_string(),
                amount: Quantity::parse("0.6").unwrap(),
            }]
        );
    }

    #[test]
    fn test_shared_ingredient_is_aggregated() {
        let map = RecipeMap::from_recipes([
            recipe("burger", "beef", "0.2"),
            recipe("burger", "bun", "1"),
            recipe("sliders", "beef", "0.2"),
        ]);
        let deductions = map.deductions_for(&[line("burger", 3), line("sliders", 1)]).unwrap();

        assert_eq!(deductions.len(), 2);
        assert_eq!(deductions[0].ingredient_id, "beef");
        assert_eq!(deductions[0].amount, Quantity::parse("0.8").unwrap());
        assert_eq!(deductions[1].ingredient_id, "bun");
        assert_eq!(deductions[1].amount, Quantity::from_units(3));
    }

    #[test]
    fn test_items_without_recipes_deduct_nothing() {
        let map = RecipeMap::from_recipes([recipe("burger", "beef", "0.2")]);
        assert!(map.deductions_for(&[line("soda", 2)]).unwrap().is_empty());
        assert!(map.recipes_for("soda").is_empty());
        assert!(RecipeMap::new().deductions_for(&[line("burger", 1)]).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_lines_add_up() {
        let map = RecipeMap::from_recipes([recipe("burger", "beef", "0.2")]);
        let deductions = map.deductions_for(&[line("burger", 1), line("burger", 2)]).unwrap();
        assert_eq!(deductions[0].amount, Quantity::parse("0.6").unwrap());
    }

    #[test]
    fn test_overflowing_amount_is_rejected() {
        let mut huge = recipe("burger", "beef", "1");
        huge.quantity_used_milli = i64::MAX / 2;
        let map = RecipeMap::from_recipes([huge]);

        assert!(matches!(
            map.deductions_for(&[line("burger", 3)]),
            Err(ValidationError::OutOfRange { .. })
        ));
        // Each line fits, their sum does not.
        assert!(map
            .deductions_for(&[line("burger", 1), line("burger", 1), line("burger", 1)])
            .is_err());
    }
}
