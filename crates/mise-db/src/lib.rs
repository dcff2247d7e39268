//! # mise-db: Storage and Engines for Mise
//!
//! SQLite storage (via sqlx) plus the engines that keep a restaurant's books
//! consistent when requests arrive at the same time:
//!
//! | Engine | Serializes on | Guarantees |
//! |---|---|---|
//! | [`OrderRepository`] | the order row | total = Σ lines, stock deducted once per payment |
//! | [`ReservationRepository`] | the table row | no overlapping confirmed slots |
//! | [`RegistrationRepository`] | the event row | active registrations ≤ capacity |
//!
//! Each engine opens its transaction with a write to the row it serializes
//! on, so SQLite hands the write lock to one request at a time. Losers wait
//! `busy_timeout` and then go through [`RetryPolicy`].
//!
//! [`config`] loads TOML plus `MISE_*` overrides, [`migrations`] embeds the
//! schema, and [`pool`] opens the database and hands out repositories.
//!
//! ```rust,ignore
//! use mise_db::{Database, EngineConfig};
//!
//! let config = EngineConfig::load(Some(Path::new("mise.toml")))?;
//! config.logging.init();
//! let db = Database::new(config.db_config()).await?;
//!
//! let order = db.orders().create_order(&new_order).await?;
//! let receipt = db.orders().pay_order(&order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, EngineConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

pub use repository::catalog::CatalogRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::order::OrderRepository;
pub use repository::recipe::RecipeRepository;
pub use repository::registration::RegistrationRepository;
pub use repository::report::ReportRepository;
pub use repository::reservation::ReservationRepository;
