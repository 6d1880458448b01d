//! # filtra-db: Database Layer for the filtra Storefront
//!
//! This crate provides storage for the pricing engine's shared state:
//! the product catalog, discount rules, gift cards, exchange rates, and
//! the write-once order-totals snapshot. SQLite via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        filtra Data Flow                                 │
//! │                                                                         │
//! │  PricingEngine::compute (filtra-pricing)                               │
//! │       │            reads through trait seams                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     filtra-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ catalog, rule │    │  (embedded)  │  │   │
//! │  │   │               │    │ gift card,    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ checkout,     │    │ 001_init.sql │  │   │
//! │  │   │ WAL mode      │    │ rates         │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutRepository::commit - the ONLY writer of shared pricing        │
//! │  state: rule consumption, gift-card debits and the totals snapshot     │
//! │  land in one transaction or not at all                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filtra_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/filtra.db")).await?;
//!
//! // Wire the engine against the repositories
//! let engine = PricingEngine::new(
//!     db.products(),
//!     db.discounts(),
//!     db.gift_cards(),
//!     TaxCalculator::new(provider, TaxFallbackPolicy::default()),
//!     db.rates().load().await?,
//!     PricingConfig::default(),
//! );
//!
//! let priced = engine.compute(&request).await?;
//! let snapshot = db.checkout().commit(&priced).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::ProductRepository;
pub use repository::discount::DiscountRuleRepository;
pub use repository::gift_card::{GiftCardRepository, Redemption};
pub use repository::order::{CheckoutRepository, OrderSnapshot};
pub use repository::rates::ExchangeRateRepository;
