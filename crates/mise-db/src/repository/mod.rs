//! # Repository Module
//!
//! Storage access and the transactional engines for Mise.
//!
//! ## Write Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │         Every mutating transaction writes its owning row first          │
//! │                                                                         │
//! │  Engine            Owning row (written first)    Then reads / checks    │
//! │  ──────            ──────────────────────────    ──────────────────     │
//! │  orders            orders.updated_at             status, items, recipe  │
//! │  reservations      dining_tables.updated_at      same-day reservations  │
//! │  registrations     events.updated_at             active count           │
//! │                                                                         │
//! │  BEGIN ──► UPDATE owner ... RETURNING * ──► checks ──► writes ──► COMMIT│
//! │               │                                                         │
//! │               └─ a second writer waits here (busy_timeout) and then    │
//! │                  sees the committed state; past the timeout the whole  │
//! │                  transaction is retried (see retry.rs)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A dropped transaction rolls back, so an early `return Err(..)` or `?`
//! inside an engine leaves no partial writes.
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Restaurants, tables, menu
//! - [`InventoryRepository`](inventory::InventoryRepository) - Ingredient stock
//! - [`RecipeRepository`](recipe::RecipeRepository) - Bills of materials
//! - [`OrderRepository`](order::OrderRepository) - Order engine and payment
//! - [`ReservationRepository`](reservation::ReservationRepository) - Table scheduler
//! - [`RegistrationRepository`](registration::RegistrationRepository) - Event capacity
//! - [`ReportRepository`](report::ReportRepository) - Sales reports

pub mod catalog;
pub mod inventory;
pub mod order;
pub mod recipe;
pub mod registration;
pub mod report;
pub mod reservation;
