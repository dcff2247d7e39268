//! # mise-core: Restaurant Rules Without Storage
//!
//! Everything the Mise engines decide that can be decided without a
//! database: what a record looks like, which status moves are legal, when
//! two bookings collide, how much stock an order consumes, and which input
//! is acceptable. Nothing here does I/O.
//!
//! ```text
//!   caller (HTTP, CLI, jobs)          not in this repo
//!        │
//!   mise-db   SQLite + transactional engines
//!        │         uses
//!   mise-core types · money · quantity · status · schedule · recipe · validation
//! ```
//!
//! - [`types`]: stored records and request inputs
//! - [`money`] / [`quantity`]: exact fixed-point amounts
//! - [`status`]: order, reservation and registration state machines
//! - [`schedule`]: half-open time slots and conflict search
//! - [`recipe`]: per-order stock deductions
//! - [`validation`] and [`error`]
//!
//! ```rust
//! use mise_core::money::Money;
//!
//! let total = Money::from_cents(1000).multiply_quantity(2).unwrap() + Money::from_cents(550);
//! assert_eq!(total.to_string(), "25.50");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod quantity;
pub mod recipe;
pub mod schedule;
pub mod status;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use recipe::{RecipeMap, StockDeduction};
pub use schedule::TimeSlot;
pub use status::{OrderStatus, RegistrationStatus, ReservationStatus};
pub use types::*;

// =============================================================================
// Limits and ids
// =============================================================================

/// Largest quantity a single order line may carry.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest menu price, in cents (1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Largest per-portion recipe amount or single stock deduction, in
/// thousandths (1,000,000 units).
pub const MAX_RECIPE_MILLI: i64 = 1_000_000_000;

/// Maximum number of lines accepted when an order is created in one call.
pub const MAX_ORDER_LINES: usize = 100;

/// Generates a new entity ID (UUID v4, hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
