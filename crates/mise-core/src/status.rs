//! # Status State Machines
//!
//! Order, reservation and registration statuses as closed enums with explicit
//! transition tables. A status string from the outside world is parsed first
//! (unknown values are rejected), then the move is checked against the table.
//!
//! ## Order
//! ```text
//! Pending ──► Preparing ──► Served ──► Paid
//!    │  │         │  │        │
//!    │  └─────────┼──┴────────┴──► (forward skips allowed, e.g. Pending ──► Paid)
//!    │            │
//!    └────────────┴──────────────► Cancelled      Paid, Cancelled: terminal
//! ```
//!
//! ## Reservation
//! ```text
//! Confirmed ──► Completed
//!     │
//!     └──────► Cancelled                          Completed, Cancelled: terminal
//! ```
//!
//! ## Registration
//! ```text
//! Active ◄──► Cancelled     (reactivation re-checks capacity in the allocator)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order taken, nothing started.
    #[default]
    Pending,
    /// Kitchen is working on it.
    Preparing,
    /// Food is on the table.
    Served,
    /// Settled; inventory has been deducted (terminal).
    Paid,
    /// Abandoned (terminal).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Served,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    /// Stored/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Served => "served",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true for Paid and Cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Items can be added, changed or removed only on open orders.
    pub fn accepts_item_changes(&self) -> bool {
        !self.is_terminal()
    }

    /// The transition table.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Preparing, Served, Paid, Cancelled],
            Preparing => &[Served, Paid, Cancelled],
            Served => &[Paid, Cancelled],
            Paid | Cancelled => &[],
        }
    }

    /// Returns true if `next` is reachable in one step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Checks a move against the table.
    ///
    /// Moving to the current status is accepted and changes nothing; callers
    /// use [`OrderStatus::is_noop`] to skip side effects in that case.
    pub fn transition(self, next: OrderStatus) -> CoreResult<OrderStatus> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: "order",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Returns true if moving to `next` is a repeat of the current status.
    pub fn is_noop(&self, next: OrderStatus) -> bool {
        *self == next
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: accepts both "Paid" and "paid".
impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnrecognizedStatus {
                entity: "order",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Reservation Status
// =============================================================================

/// Status of a table reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 3] = [
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
    ];

    /// Statuses that hold the table for their time window.
    pub const BLOCKING: [ReservationStatus; 2] =
        [ReservationStatus::Confirmed, ReservationStatus::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }

    /// Returns true if this reservation occupies its slot for conflict checks.
    pub fn blocks_slot(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn allowed_transitions(&self) -> &'static [ReservationStatus] {
        match self {
            ReservationStatus::Confirmed => {
                &[ReservationStatus::Completed, ReservationStatus::Cancelled]
            }
            ReservationStatus::Cancelled | ReservationStatus::Completed => &[],
        }
    }

    /// Checks a move against the table; repeating the current status is accepted.
    pub fn transition(self, next: ReservationStatus) -> CoreResult<ReservationStatus> {
        if self == next || self.allowed_transitions().contains(&next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition {
                entity: "reservation",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnrecognizedStatus {
                entity: "reservation",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Registration Status
// =============================================================================

/// Status of an event registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Counts against event capacity.
    #[default]
    Active,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Active => "active",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RegistrationStatus::Active)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(RegistrationStatus::Active),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            _ => Err(CoreError::UnrecognizedStatus {
                entity: "registration",
                value: s.to_string(),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
