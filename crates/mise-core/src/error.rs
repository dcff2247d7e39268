//! # Domain Errors
//!
//! [`ValidationError`] rejects malformed input, [`CoreError`] rejects a
//! request that breaks a business rule, and mise-db's `DbError` wraps both
//! alongside storage failures. Each of them reduces to one [`ErrorKind`],
//! which is all a transport needs to choose a response.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::TimeSlot;
use crate::status::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of every error the engine can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input or unknown foreign reference.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// Reservation overlaps an existing one.
    SlotConflict,
    /// Event is at capacity.
    CapacityExceeded,
    /// Status change not allowed, or status value not recognized.
    InvalidTransition,
    /// Concurrent writers kept colliding; safe to retry later.
    ConcurrencyConflict,
    /// Storage failure unrelated to the request content.
    Storage,
}

impl ErrorKind {
    /// Returns the snake_case name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::SlotConflict => "slot_conflict",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::InvalidTransition => "invalid_transition",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::Storage => "storage",
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// These represent business rule violations. None of them is compensated
/// inside the engine; the caller decides what to offer the user next.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Menu item exists but is not currently sold.
    #[error("Menu item {0} is not available")]
    MenuItemUnavailable(String),

    /// An entity belongs to a different restaurant than the one in scope.
    #[error("{entity} {id} does not belong to restaurant {restaurant_id}")]
    ForeignRestaurant {
        entity: &'static str,
        id: String,
        restaurant_id: String,
    },

    /// Requested reservation overlaps a confirmed or completed one, e.g.
    /// `[18:30, 19:30)` against an existing `[18:00, 19:00)` on the same
    /// table and date. Suggesting another time is up to the caller.
    #[error("Table {table_id} is not available on {date} at {requested}: overlaps reservation {conflicting_reservation_id} ({existing})")]
    SlotConflict {
        table_id: String,
        date: NaiveDate,
        requested: TimeSlot,
        conflicting_reservation_id: String,
        existing: TimeSlot,
    },

    /// Event has no free capacity left.
    #[error("Event {event_id} is full (capacity {capacity})")]
    CapacityExceeded { event_id: String, capacity: i64 },

    /// User already holds an active registration for the event.
    #[error("User {user_id} is already registered for event {event_id}")]
    AlreadyRegistered { user_id: String, event_id: String },

    /// Status change is not in the transition table.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Status value is not one of the recognized names.
    #[error("Unrecognized {entity} status: '{value}'")]
    UnrecognizedStatus { entity: &'static str, value: String },

    /// Order is in a terminal state and its items can no longer change.
    #[error("Order {order_id} is {status}, items cannot be changed")]
    OrderClosed {
        order_id: String,
        status: OrderStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::MenuItemUnavailable(_)
            | CoreError::ForeignRestaurant { .. }
            | CoreError::AlreadyRegistered { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::SlotConflict { .. } => ErrorKind::SlotConflict,
            CoreError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            CoreError::InvalidTransition { .. }
            | CoreError::UnrecognizedStatus { .. }
            | CoreError::OrderClosed { .. } => ErrorKind::InvalidTransition,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rejected input, raised before any mutation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    /// Counted in characters, not bytes.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Bad UUID, too many decimal places, stray characters in a phone.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Time window is empty or inverted.
    #[error("start time {start} must be before end time {end}")]
    EmptyTimeSlot { start: String, end: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
