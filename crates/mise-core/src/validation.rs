//! # Field Validation
//!
//! Checks on caller input, run before any mutation touches the store.
//! SQLite repeats the structural ones (NOT NULL, CHECK, UNIQUE, foreign
//! keys) so a row that slips past here still cannot land.
//!
//! ```rust
//! use mise_core::validation::{validate_customer_name, validate_quantity};
//!
//! validate_customer_name("Ada Lovelace").unwrap();
//! validate_quantity(2).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_CENTS, MAX_RECIPE_MILLI};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest customer name a reservation accepts.
pub const MAX_CUSTOMER_NAME_LEN: usize = 100;

/// Longest phone number a reservation accepts.
pub const MAX_PHONE_LEN: usize = 15;

const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

fn required_within<'a>(field: &str, value: &'a str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value)
}

/// Menu item, ingredient and event names: non-blank, at most 200 chars.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    required_within(field, name, MAX_NAME_LEN).map(|_| ())
}

/// Validates the name on a reservation or order.
///
/// ## Example
/// ```rust
/// use mise_core::validation::validate_customer_name;
///
/// assert!(validate_customer_name("Grace Hopper").is_ok());
/// assert!(validate_customer_name("   ").is_err());
/// assert!(validate_customer_name(&"x".repeat(101)).is_err());
/// ```
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required_within("customer_name", name, MAX_CUSTOMER_NAME_LEN).map(|_| ())
}

/// Validates a contact phone number.
///
/// ## Rules
/// - Must not be blank, at most 15 characters
/// - Digits plus `+`, `-`, spaces and parentheses
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = required_within("customer_phone", phone, MAX_PHONE_LEN)?;

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "customer_phone".to_string(),
            reason: "must contain only digits, spaces, '+', '-' and parentheses".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// An order line quantity: `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// A menu price in `0..=MAX_PRICE_CENTS`. Zero is allowed.
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.cents() > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// A per-portion recipe amount or a deduction: positive and at most
/// `MAX_RECIPE_MILLI` thousandths.
pub fn validate_recipe_quantity(amount: Quantity) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity_used".to_string(),
        });
    }
    if amount.milli() > MAX_RECIPE_MILLI {
        return Err(ValidationError::OutOfRange {
            field: "quantity_used".to_string(),
            min: 1,
            max: MAX_RECIPE_MILLI,
        });
    }

    Ok(())
}

/// Validates event capacity. Zero means registration is closed.
pub fn validate_capacity(capacity: i64) -> ValidationResult<()> {
    if capacity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "capacity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates table seats and table number; both must be positive.
pub fn validate_table(table_number: i64, seats: i64) -> ValidationResult<()> {
    if table_number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "table_number".to_string(),
        });
    }
    if seats <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "capacity".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on an order.
pub fn validate_order_size(lines: usize) -> ValidationResult<()> {
    if lines > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "order lines".to_string(),
            min: 0,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates an id reference.
///
/// ## Example
/// ```rust
/// use mise_core::validation::validate_uuid;
///
/// assert!(validate_uuid("table_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("table_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
