//! # filtra-core: Pure Pricing Logic for the filtra Storefront
//!
//! This crate is the **heart** of order pricing. It contains all pricing
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        filtra Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront / Admin (out of scope)               │   │
//! │  │    cart forms ──► checkout preview ──► payment capture          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    filtra-pricing                               │   │
//! │  │    PricingEngine, store traits, TaxCalculator + fallback        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ filtra-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   cart    │  │ discount  │  │ currency  │  │   │
//! │  │   │   Money   │  │   Cart    │  │ candidates│  │  display  │  │   │
//! │  │   │  TaxRate  │  │ CartItem  │  │ selection │  │   rates   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    filtra-db (Storage Layer)                    │   │
//! │  │         SQLite repositories, CAS commit, migrations             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`currency`] - Display-currency conversion over a rate table
//! - [`types`] - Domain types (rules, gift cards, request, totals)
//! - [`cart`] - Authoritative cart built from catalog rows
//! - [`discount`] - Candidate evaluation and winner selection
//! - [`validation`] - Code normalization and request-shape checks
//! - [`error`] - The pricing error taxonomy
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic - same input =
//!    same output, so preview and capture always agree
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64), no float drift
//! 4. **Trust Nothing Declared**: client amounts are compared, never used

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod currency;
pub mod discount;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use filtra_core::Money` instead of
// `use filtra_core::money::Money`

pub use cart::{Cart, CartItem};
pub use currency::{Currency, DisplayAmount, ExchangeRateTable};
pub use error::{PricingError, PricingResult, PricingWarning};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps one pricing computation bounded.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
