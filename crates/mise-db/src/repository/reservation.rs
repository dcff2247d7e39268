//! # Reservation Repository
//!
//! The table scheduler. A table can hold at most one confirmed or completed
//! reservation for any instant of a day; cancelled reservations free their
//! window.
//!
//! ## Booking Flow
//! ```text
//! create(request)
//!   │
//!   ├── validate: name, phone, start < end          (no storage touched)
//!   │
//!   ▼
//! BEGIN
//!   lock table row ──── missing?            → NotFound
//!                  └─── other restaurant?   → ForeignRestaurant
//!   load the table's reservations for that date
//!   find_conflict(slot, day) ── overlap?    → SlotConflict { existing }
//!   INSERT reservation (confirmed)
//! COMMIT
//! ```
//!
//! Windows are half-open, so 18:00-19:00 and 19:00-20:00 fit back to back.

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use mise_core::schedule::find_conflict;
use mise_core::{
    new_id, CoreError, DiningTable, NewReservation, Reservation, ReservationStatus, TimeSlot,
};

/// Repository for table reservations.
#[derive(Debug, Clone)]
pub struct ReservationRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl ReservationRepository {
    /// Creates a new ReservationRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        ReservationRepository { pool, retry }
    }

    // =========================================================================
    // Booking
    // =========================================================================

    /// Books a table for a window, rejecting overlaps with live reservations.
    pub async fn create(&self, request: &NewReservation) -> DbResult<Reservation> {
        let slot = request.validate()?;
        self.retry
            .run("create_reservation", || self.create_once(request, slot))
            .await
    }

    async fn create_once(&self, request: &NewReservation, slot: TimeSlot) -> DbResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let table = lock_table(&mut tx, &request.table_id).await?;
        if table.restaurant_id != request.restaurant_id {
            return Err(CoreError::ForeignRestaurant {
                entity: "table",
                id: table.id,
                restaurant_id: request.restaurant_id.clone(),
            }
            .into());
        }

        ensure_free(&mut tx, &table.id, request.reservation_date, &slot, None).await?;

        let now = Utc::now();
        let reservation: Reservation = sqlx::query_as(
            r#"
            INSERT INTO reservations (
                id, restaurant_id, table_id, customer_name, customer_phone,
                special_requests, reservation_date, start_time, end_time,
                status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(&request.restaurant_id)
        .bind(&table.id)
        .bind(request.customer_name.trim())
        .bind(request.customer_phone.trim())
        .bind(&request.special_requests)
        .bind(request.reservation_date)
        .bind(slot.start())
        .bind(slot.end())
        .bind(ReservationStatus::Confirmed)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            reservation_id = %reservation.id,
            table = table.table_number,
            date = %reservation.reservation_date,
            slot = %slot,
            "Reservation confirmed"
        );
        Ok(reservation)
    }

    /// Moves a confirmed reservation to a new date and window on the same
    /// table. The reservation's own current window does not count as a
    /// conflict.
    pub async fn reschedule(
        &self,
        id: &str,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> DbResult<Reservation> {
        let slot = TimeSlot::new(start, end)?;
        self.retry
            .run("reschedule_reservation", || self.reschedule_once(id, date, slot))
            .await
    }

    async fn reschedule_once(&self, id: &str, date: NaiveDate, slot: TimeSlot) -> DbResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let table: DiningTable = sqlx::query_as(
            r#"
            UPDATE dining_tables SET updated_at = ?1
            WHERE id = (SELECT table_id FROM reservations WHERE id = ?2)
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Reservation", id))?;

        let current = fetch_reservation(&mut tx, id).await?;
        if current.status != ReservationStatus::Confirmed {
            return Err(CoreError::InvalidTransition {
                entity: "reservation",
                from: current.status.to_string(),
                to: ReservationStatus::Confirmed.to_string(),
            }
            .into());
        }

        ensure_free(&mut tx, &table.id, date, &slot, Some(id)).await?;

        let moved: Reservation = sqlx::query_as(
            r#"
            UPDATE reservations
            SET reservation_date = ?1, start_time = ?2, end_time = ?3, updated_at = ?4
            WHERE id = ?5
            RETURNING *
            "#,
        )
        .bind(date)
        .bind(slot.start())
        .bind(slot.end())
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            reservation_id = id,
            from = %format!("{} {}", current.reservation_date, current.slot()),
            to = %format!("{} {}", date, slot),
            "Reservation rescheduled"
        );
        Ok(moved)
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn set_status_str(&self, id: &str, status: &str) -> DbResult<Reservation> {
        let next: ReservationStatus = status.parse()?;
        self.set_status(id, next).await
    }

    /// Moves a reservation through Confirmed → Completed | Cancelled.
    /// Repeating the current status changes nothing.
    pub async fn set_status(&self, id: &str, next: ReservationStatus) -> DbResult<Reservation> {
        self.retry
            .run("set_reservation_status", || self.set_status_once(id, next))
            .await
    }

    async fn set_status_once(&self, id: &str, next: ReservationStatus) -> DbResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let current: Reservation = sqlx::query_as(
            "UPDATE reservations SET updated_at = ?1 WHERE id = ?2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Reservation", id))?;

        current.status.transition(next)?;
        if current.status == next {
            return Ok(current);
        }

        let updated: Reservation =
            sqlx::query_as("UPDATE reservations SET status = ?1 WHERE id = ?2 RETURNING *")
                .bind(next)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        info!(reservation_id = id, from = %current.status, to = %next, "Reservation status changed");
        Ok(updated)
    }

    /// Cancels a reservation, freeing its window.
    pub async fn cancel(&self, id: &str) -> DbResult<Reservation> {
        self.set_status(id, ReservationStatus::Cancelled).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Option<Reservation>> {
        let reservation = sqlx::query_as("SELECT * FROM reservations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reservation)
    }

    /// Lists reservations by date and start time, optionally filtered.
    pub async fn list(
        &self,
        restaurant_id: Option<&str>,
        date: Option<NaiveDate>,
    ) -> DbResult<Vec<Reservation>> {
        let reservations = sqlx::query_as(
            r#"
            SELECT * FROM reservations
            WHERE (?1 IS NULL OR restaurant_id = ?1)
              AND (?2 IS NULL OR reservation_date = ?2)
            ORDER BY reservation_date, start_time
            "#,
        )
        .bind(restaurant_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(reservations)
    }

    /// All reservations of one table on one date, any status.
    pub async fn list_for_table(&self, table_id: &str, date: NaiveDate) -> DbResult<Vec<Reservation>> {
        let mut conn = self.pool.acquire().await?;
        reservations_on(&mut conn, table_id, date).await
    }

    /// Returns true if the window is free on that table and date.
    ///
    /// This is a snapshot; only [`create`](Self::create) holds the table
    /// while checking.
    pub async fn is_table_available(
        &self,
        table_id: &str,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> DbResult<bool> {
        let slot = TimeSlot::new(start, end)?;
        let day = self.list_for_table(table_id, date).await?;
        Ok(find_conflict(&slot, &day, None).is_none())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn lock_table(conn: &mut SqliteConnection, table_id: &str) -> DbResult<DiningTable> {
    sqlx::query_as("UPDATE dining_tables SET updated_at = ?1 WHERE id = ?2 RETURNING *")
        .bind(Utc::now())
        .bind(table_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Table", table_id))
}

async fn fetch_reservation(conn: &mut SqliteConnection, id: &str) -> DbResult<Reservation> {
    sqlx::query_as("SELECT * FROM reservations WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Reservation", id))
}

async fn reservations_on(
    conn: &mut SqliteConnection,
    table_id: &str,
    date: NaiveDate,
) -> DbResult<Vec<Reservation>> {
    let day = sqlx::query_as(
        r#"
        SELECT * FROM reservations
        WHERE table_id = ?1 AND reservation_date = ?2
        ORDER BY start_time
        "#,
    )
    .bind(table_id)
    .bind(date)
    .fetch_all(&mut *conn)
    .await?;
    Ok(day)
}

async fn ensure_free(
    conn: &mut SqliteConnection,
    table_id: &str,
    date: NaiveDate,
    slot: &TimeSlot,
    ignore_id: Option<&str>,
) -> DbResult<()> {
    let day = reservations_on(conn, table_id, date).await?;

    if let Some(existing) = find_conflict(slot, &day, ignore_id) {
        debug!(
            table_id,
            %date,
            requested = %slot,
            conflicting = %existing.id,
            "Slot taken"
        );
        return Err(CoreError::SlotConflict {
            table_id: table_id.to_string(),
            date,
            requested: *slot,
            conflicting_reservation_id: existing.id.clone(),
            existing: existing.slot(),
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
