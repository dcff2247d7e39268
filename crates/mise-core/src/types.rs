//! # Domain Types
//!
//! Records stored by the engine and the inputs that create them.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Restaurant ─┬── DiningTable ──── Reservation                          │
//! │              │                        │ (optional link)                 │
//! │              ├── MenuItem ─┬──────── Order ──── OrderItem              │
//! │              │             │                       │ menu_item_id       │
//! │              │             └── Recipe ──┐                               │
//! │              └── InventoryItem ◄────────┘ ingredient_id                 │
//! │                                                                         │
//! │  Event ──── Registration (user_id, status)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Scalars
//! Money is stored as `*_cents: i64` and ingredient amounts as `*_milli: i64`.
//! Accessors (`price()`, `quantity()`, ...) wrap them in [`Money`] and
//! [`Quantity`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::schedule::TimeSlot;
use crate::status::{OrderStatus, RegistrationStatus, ReservationStatus};
use crate::validation;

// =============================================================================
// Restaurant & Tables
// =============================================================================

/// Scope key for tables, menu, inventory, orders and reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A physical table. `table_number` is unique within a restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: String,
    pub restaurant_id: String,
    pub table_number: i64,
    /// Seats.
    pub capacity: i64,
    /// Informational only; reservations do not consult it.
    pub is_occupied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Menu
// =============================================================================

/// Menu section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MenuCategory {
    Appetizer,
    MainCourse,
    Dessert,
    Drink,
}

impl MenuCategory {
    /// Human label ("Main Course").
    pub fn label(&self) -> &'static str {
        match self {
            MenuCategory::Appetizer => "Appetizer",
            MenuCategory::MainCourse => "Main Course",
            MenuCategory::Dessert => "Dessert",
            MenuCategory::Drink => "Drink",
        }
    }
}

impl fmt::Display for MenuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the label ("Main Course") or the stored name ("main_course").
impl FromStr for MenuCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "_");
        match normalized.as_str() {
            "appetizer" => Ok(MenuCategory::Appetizer),
            "main_course" => Ok(MenuCategory::MainCourse),
            "dessert" => Ok(MenuCategory::Dessert),
            "drink" => Ok(MenuCategory::Drink),
            _ => Err(ValidationError::NotAllowed {
                field: "category".to_string(),
                allowed: ["Appetizer", "Main Course", "Dessert", "Drink"]
                    .map(String::from)
                    .to_vec(),
            }),
        }
    }
}

/// A sellable dish or drink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MenuItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: MenuCategory,
    /// Current price. Order lines snapshot it; changing it never rewrites them.
    pub price_cents: i64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for a new menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub restaurant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: MenuCategory,
    pub price: Money,
    pub is_available: bool,
}

impl NewMenuItem {
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_name("name", &self.name)?;
        validation::validate_price(self.price)?;
        Ok(())
    }
}

// =============================================================================
// Inventory & Recipes
// =============================================================================

/// Unit an ingredient is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum InventoryUnit {
    Kg,
    G,
    L,
    Ml,
    Unit,
}

impl InventoryUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryUnit::Kg => "kg",
            InventoryUnit::G => "g",
            InventoryUnit::L => "l",
            InventoryUnit::Ml => "ml",
            InventoryUnit::Unit => "unit",
        }
    }
}

impl fmt::Display for InventoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ingredient and its stock level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub unit: InventoryUnit,
    /// Stock on hand. May be negative: deduction has no floor.
    pub quantity_milli: i64,
    pub alert_threshold_milli: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    #[inline]
    pub fn alert_threshold(&self) -> Quantity {
        Quantity::from_milli(self.alert_threshold_milli)
    }

    /// `quantity < alert_threshold`, whatever the sign of either.
    pub fn is_low_stock(&self) -> bool {
        self.quantity() < self.alert_threshold()
    }

    /// More has been deducted than was on hand.
    pub fn is_overdrawn(&self) -> bool {
        self.quantity().is_negative()
    }
}

/// Input for a new ingredient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIngredient {
    pub restaurant_id: String,
    pub name: String,
    pub unit: InventoryUnit,
    pub quantity: Quantity,
    pub alert_threshold: Quantity,
}

impl NewIngredient {
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_name("name", &self.name)?;
        Ok(())
    }
}

/// One edge of a menu item's bill of materials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Recipe {
    pub id: String,
    pub menu_item_id: String,
    pub ingredient_id: String,
    /// Consumed per portion sold; always > 0.
    pub quantity_used_milli: i64,
    /// Free-form label kept for display ("kg", "slices").
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    #[inline]
    pub fn quantity_used(&self) -> Quantity {
        Quantity::from_milli(self.quantity_used_milli)
    }
}

/// Input for a new recipe edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipe {
    pub menu_item_id: String,
    pub ingredient_id: String,
    pub quantity_used: Quantity,
    pub unit: String,
}

impl NewRecipe {
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_recipe_quantity(self.quantity_used)?;
        validation::validate_name("unit", &self.unit)?;
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// An order and its derived total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: Option<String>,
    pub reservation_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub status: OrderStatus,
    /// Always the sum of the item subtotals; only the engine writes it.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line on an order.
/// Uses snapshot pattern to freeze the menu price at save time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    pub quantity: i64,
    /// Menu price when the line was last saved (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity (frozen).
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    /// Prices a line: `price × quantity`.
    #[inline]
    pub fn price_line(unit_price: Money, quantity: i64) -> Result<Money, ValidationError> {
        unit_price.multiply_quantity(quantity)
    }
}

/// Sum of the subtotals of `items`; the only way an order total is produced.
pub fn order_total(items: &[OrderItem]) -> Money {
    items.iter().map(OrderItem::subtotal).sum()
}

/// One requested line when creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub menu_item_id: String,
    pub quantity: i64,
}

/// Input for a new order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
    pub restaurant_id: String,
    pub table_id: Option<String>,
    pub reservation_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub items: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Checks every field before anything is written.
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_uuid("restaurant_id", &self.restaurant_id)?;
        validation::validate_order_size(self.items.len())?;
        if let Some(name) = &self.customer_name {
            validation::validate_customer_name(name)?;
        }
        if let Some(phone) = &self.customer_phone {
            validation::validate_phone(phone)?;
        }
        for line in &self.items {
            validation::validate_quantity(line.quantity)?;
        }
        Ok(())
    }
}

/// Outcome of paying an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub order: Order,
    /// Stock levels of every ingredient touched, after deduction.
    pub stock: Vec<InventoryItem>,
    /// The order was already Paid; nothing was deducted this time.
    pub already_paid: bool,
}

// =============================================================================
// Reservations
// =============================================================================

/// A table booked for a time window on a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub special_requests: Option<String>,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// The booked window.
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::from_stored(self.start_time, self.end_time)
    }
}

/// Input for a reservation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub restaurant_id: String,
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub special_requests: Option<String>,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl NewReservation {
    /// Validates the request and returns its slot.
    pub fn validate(&self) -> CoreResult<TimeSlot> {
        validation::validate_customer_name(&self.customer_name)?;
        validation::validate_phone(&self.customer_phone)?;
        Ok(TimeSlot::new(self.start_time, self.end_time)?)
    }
}

// =============================================================================
// Events & Registrations
// =============================================================================

/// An event with a bounded number of seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub capacity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Rejects one more registration when `active` already fills capacity.
    pub fn ensure_room(&self, active: i64) -> CoreResult<()> {
        if active >= self.capacity {
            return Err(CoreError::CapacityExceeded {
                event_id: self.id.clone(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

/// Input for a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub capacity: i64,
}

impl NewEvent {
    pub fn validate(&self) -> CoreResult<()> {
        validation::validate_name("title", &self.title)?;
        validation::validate_capacity(self.capacity)?;
        Ok(())
    }
}

/// A user's seat at an event. One record per (user, event).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Reports
// =============================================================================

/// Paid sales for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Money,
    pub order_count: i64,
}

/// A menu item ranked by quantity sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PopularItem {
    pub menu_item_id: String,
    pub name: String,
    pub total_quantity: i64,
    pub revenue_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_price_cents: i64, quantity: i64) -> OrderItem {
        OrderItem {
            id: crate::new_id(),
            order_id: "o".to_string(),
            menu_item_id: "m".to_string(),
            quantity,
            unit_price_cents,
            subtotal_cents: OrderItem::price_line(Money::from_cents(unit_price_cents), quantity)
                .unwrap()
                .cents(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ingredient(quantity: &str, threshold: &str) -> InventoryItem {
        InventoryItem {
            id: "beef".to_string(),
            restaurant_id: "r".to_string(),
            name: "Beef".to_string(),
            unit: InventoryUnit::Kg,
            quantity_milli: Quantity::parse(quantity).unwrap().milli(),
            alert_threshold_milli: Quantity::parse(threshold).unwrap().milli(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_total_is_sum_of_subtotals() {
        let items = vec![item(1000, 2), item(550, 1)];
        assert_eq!(order_total(&items), Money::from_cents(2550));
        assert_eq!(order_total(&[]), Money::zero());
    }

    #[test]
    fn test_low_stock_and_overdrawn() {
        assert!(!ingredient("10", "2").is_low_stock());
        assert!(ingredient("1.5", "2").is_low_stock());
        assert!(!ingredient("2", "2").is_low_stock());

        let overdrawn = ingredient("-0.4", "2");
        assert!(overdrawn.is_low_stock());
        assert!(overdrawn.is_overdrawn());
    }

    #[test]
    fn test_event_room() {
        let event = Event {
            id: "e".to_string(),
            title: "Wine tasting".to_string(),
            description: String::new(),
            starts_at: Utc::now(),
            location: "Cellar".to_string(),
            capacity: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(event.ensure_room(0).is_ok());
        assert!(matches!(
            event.ensure_room(1),
            Err(CoreError::CapacityExceeded { capacity: 1, .. })
        ));
    }

    #[test]
    fn test_menu_category_parsing() {
        assert_eq!("Main Course".parse::<MenuCategory>().unwrap(), MenuCategory::MainCourse);
        assert_eq!("drink".parse::<MenuCategory>().unwrap(), MenuCategory::Drink);
        assert!("Side".parse::<MenuCategory>().is_err());
    }

    #[test]
    fn test_new_reservation_validation() {
        let request = NewReservation {
            restaurant_id: crate::new_id(),
            table_id: crate::new_id(),
            customer_name: "Grace".to_string(),
            customer_phone: "555-0199".to_string(),
            special_requests: None,
            reservation_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        };
        assert!(matches!(
            request.validate(),
            Err(CoreError::Validation(ValidationError::EmptyTimeSlot { .. }))
        ));

        let blank_name = NewReservation {
            customer_name: "  ".to_string(),
            end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            ..request
        };
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn test_new_order_rejects_non_positive_quantity() {
        let order = NewOrder {
            restaurant_id: crate::new_id(),
            items: vec![NewOrderLine {
                menu_item_id: crate::new_id(),
                quantity: 0,
            }],
            ..Default::default()
        };
        assert!(order.validate().is_err());
    }
}
