//! # filtra-pricing: Pricing Orchestration for the filtra Storefront
//!
//! The [`engine::PricingEngine`] turns a `PricingRequest` into an
//! authoritative `OrderTotals`, talking to its collaborators only through
//! traits.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One compute() Call                               │
//! │                                                                         │
//! │  PricingRequest                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 PricingEngine (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   CatalogSource ──► authoritative prices                       │   │
//! │  │   DiscountStore ──► rules + verification programs              │   │
//! │  │   GiftCardStore ──► balances (read-only planning)              │   │
//! │  │   TaxProvider   ──► rate/amount, behind TaxCalculator          │   │
//! │  │                                                                 │   │
//! │  │   filtra-core does every cent of math                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PricedOrder { OrderTotals, warnings, consumption plan }               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  filtra-db CheckoutRepository::commit (one transaction)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - The stage-ordered pricing computation
//! - [`stores`] - Catalog/discount/gift-card trait seams
//! - [`tax`] - TaxProvider trait, short-circuits, timeout and fallback

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod stores;
pub mod tax;

// =============================================================================
// Re-exports
// =============================================================================

pub use engine::{PricedOrder, PricingEngine};
pub use stores::{CatalogSource, DiscountStore, GiftCardStore, StoreError};
pub use tax::{
    TaxCalculator, TaxFallbackPolicy, TaxOutcome, TaxProvider, TaxProviderError,
    NO_SALES_TAX_STATES,
};
