//! # Registration Repository
//!
//! Events and the capacity allocator. The number of active registrations for
//! an event never exceeds its capacity, however many users register at once.
//!
//! ## Register
//! ```text
//! BEGIN
//!   lock event row ─────────── missing?          → NotFound
//!   existing registration ──── active?            → AlreadyRegistered
//!   count active ───────────── count >= capacity? → CapacityExceeded
//!   cancelled row?  → reactivate it
//!   otherwise       → insert a new one
//! COMMIT
//! ```
//!
//! A user has at most one registration row per event; cancelling flips its
//! status and registering again reuses it. Cancelling by registration id
//! locks the owning event through the registration row, so it serializes
//! with `register` the same way.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::retry::RetryPolicy;
use mise_core::validation::{validate_capacity, validate_name};
use mise_core::{new_id, CoreError, Event, NewEvent, Registration, RegistrationStatus};

/// Repository for events and registrations.
#[derive(Debug, Clone)]
pub struct RegistrationRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        RegistrationRepository { pool, retry }
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub async fn create_event(&self, event: &NewEvent) -> DbResult<Event> {
        event.validate()?;
        self.retry
            .run("create_event", || self.insert_event(event))
            .await
    }

    async fn insert_event(&self, event: &NewEvent) -> DbResult<Event> {
        let now = Utc::now();

        let created: Event = sqlx::query_as(
            r#"
            INSERT INTO events (
                id, title, description, starts_at, location, capacity,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(event.title.trim())
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(event.location.trim())
        .bind(event.capacity)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!(event_id = %created.id, title = %created.title, capacity = created.capacity, "Event created");
        Ok(created)
    }

    pub async fn get_event(&self, id: &str) -> DbResult<Option<Event>> {
        let event = sqlx::query_as("SELECT * FROM events WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn list_events(&self) -> DbResult<Vec<Event>> {
        let events = sqlx::query_as("SELECT * FROM events ORDER BY starts_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    /// Changes an event's capacity.
    ///
    /// Lowering it below the current active count keeps every existing
    /// registration; only new ones are refused until enough cancel.
    pub async fn set_capacity(&self, event_id: &str, capacity: i64) -> DbResult<Event> {
        validate_capacity(capacity)?;
        self.retry
            .run("set_capacity", || self.set_capacity_once(event_id, capacity))
            .await
    }

    async fn set_capacity_once(&self, event_id: &str, capacity: i64) -> DbResult<Event> {
        let event: Event = sqlx::query_as(
            "UPDATE events SET capacity = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(capacity)
        .bind(Utc::now())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Event", event_id))?;

        info!(event_id, capacity, "Event capacity changed");
        Ok(event)
    }

    // =========================================================================
    // Registrations
    // =========================================================================

    /// Registers a user for an event, or reactivates their cancelled
    /// registration, if a seat is free.
    pub async fn register(&self, event_id: &str, user_id: &str) -> DbResult<Registration> {
        validate_name("user_id", user_id)?;
        self.retry
            .run("register", || self.register_once(event_id, user_id))
            .await
    }

    async fn register_once(&self, event_id: &str, user_id: &str) -> DbResult<Registration> {
        let mut tx = self.pool.begin().await?;

        let event = lock_event(&mut tx, event_id).await?;
        let existing = find_registration(&mut tx, event_id, user_id).await?;

        if let Some(registration) = &existing {
            if registration.status.is_active() {
                return Err(CoreError::AlreadyRegistered {
                    user_id: user_id.to_string(),
                    event_id: event_id.to_string(),
                }
                .into());
            }
        }

        let active = count_active(&mut tx, event_id).await?;
        event.ensure_room(active)?;

        let now = Utc::now();
        let registration: Registration = match existing {
            Some(cancelled) => {
                sqlx::query_as(
                    r#"
                    UPDATE registrations
                    SET status = ?1, registered_at = ?2, updated_at = ?2
                    WHERE id = ?3
                    RETURNING *
                    "#,
                )
                .bind(RegistrationStatus::Active)
                .bind(now)
                .bind(&cancelled.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    INSERT INTO registrations (id, event_id, user_id, status, registered_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                    RETURNING *
                    "#,
                )
                .bind(new_id())
                .bind(event_id)
                .bind(user_id)
                .bind(RegistrationStatus::Active)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        info!(
            event_id,
            user_id,
            seats_taken = active + 1,
            capacity = event.capacity,
            "Registered"
        );
        Ok(registration)
    }

    /// Cancels a registration. Cancelling twice returns the same cancelled
    /// record.
    pub async fn cancel(&self, registration_id: &str) -> DbResult<Registration> {
        self.retry
            .run("cancel_registration", || self.cancel_once(registration_id))
            .await
    }

    async fn cancel_once(&self, registration_id: &str) -> DbResult<Registration> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events SET updated_at = ?1
            WHERE id = (SELECT event_id FROM registrations WHERE id = ?2)
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(registration_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Registration", registration_id))?;

        let registration: Registration =
            sqlx::query_as("SELECT * FROM registrations WHERE id = ?1")
                .bind(registration_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Registration", registration_id))?;

        let cancelled = mark_cancelled(&mut tx, registration).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// [`cancel`](Self::cancel) keyed by the `(event, user)` pair.
    pub async fn cancel_for_user(&self, event_id: &str, user_id: &str) -> DbResult<Registration> {
        self.retry
            .run("cancel_registration", || self.cancel_for_user_once(event_id, user_id))
            .await
    }

    async fn cancel_for_user_once(&self, event_id: &str, user_id: &str) -> DbResult<Registration> {
        let mut tx = self.pool.begin().await?;

        lock_event(&mut tx, event_id).await?;
        let registration = find_registration(&mut tx, event_id, user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Registration", format!("{event_id}/{user_id}")))?;

        let cancelled = mark_cancelled(&mut tx, registration).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_registration(&self, id: &str) -> DbResult<Option<Registration>> {
        let registration = sqlx::query_as("SELECT * FROM registrations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(registration)
    }

    pub async fn active_count(&self, event_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        count_active(&mut conn, event_id).await
    }

    /// Events the user currently holds a seat at.
    pub async fn list_active_for_user(&self, user_id: &str) -> DbResult<Vec<Registration>> {
        let registrations = sqlx::query_as(
            r#"
            SELECT * FROM registrations
            WHERE user_id = ?1 AND status = ?2
            ORDER BY registered_at
            "#,
        )
        .bind(user_id)
        .bind(RegistrationStatus::Active)
        .fetch_all(&self.pool)
        .await?;
        Ok(registrations)
    }

    /// Every registration of an event, cancelled ones included.
    pub async fn list_for_event(&self, event_id: &str) -> DbResult<Vec<Registration>> {
        let registrations = sqlx::query_as(
            "SELECT * FROM registrations WHERE event_id = ?1 ORDER BY registered_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(registrations)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn lock_event(conn: &mut SqliteConnection, event_id: &str) -> DbResult<Event> {
    sqlx::query_as("UPDATE events SET updated_at = ?1 WHERE id = ?2 RETURNING *")
        .bind(Utc::now())
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Event", event_id))
}

async fn find_registration(
    conn: &mut SqliteConnection,
    event_id: &str,
    user_id: &str,
) -> DbResult<Option<Registration>> {
    let registration =
        sqlx::query_as("SELECT * FROM registrations WHERE event_id = ?1 AND user_id = ?2")
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(registration)
}

/// Flips an active registration to cancelled; a cancelled one is returned
/// unchanged.
async fn mark_cancelled(
    conn: &mut SqliteConnection,
    registration: Registration,
) -> DbResult<Registration> {
    if !registration.status.is_active() {
        debug!(registration_id = %registration.id, "Registration already cancelled");
        return Ok(registration);
    }

    let cancelled: Registration = sqlx::query_as(
        "UPDATE registrations SET status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(RegistrationStatus::Cancelled)
    .bind(Utc::now())
    .bind(&registration.id)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        registration_id = %cancelled.id,
        event_id = %cancelled.event_id,
        user_id = %cancelled.user_id,
        "Registration cancelled"
    );
    Ok(cancelled)
}

async fn count_active(conn: &mut SqliteConnection, event_id: &str) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND status = ?2")
            .bind(event_id)
            .bind(RegistrationStatus::Active)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

// =============================================================================
// Unit Tests
// =============================================================================
