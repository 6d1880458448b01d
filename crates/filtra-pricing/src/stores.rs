//! # Store Traits
//!
//! The seams between the engine and persistent state.
//!
//! ## Why Traits Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PricingEngine ──► CatalogSource   ──┐                                  │
//! │                ──► DiscountStore   ──┼── filtra-db (production)        │
//! │                ──► GiftCardStore   ──┘                                  │
//! │                                    └──── in-memory fakes (tests)        │
//! │                                                                         │
//! │  The engine never sees SQL. It sees rows, or StoreError.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount and gift-card state must never be resolved on stale data, so a
//! store failure rejects the whole computation instead of degrading.

use thiserror::Error;

use filtra_core::{
    CatalogProduct, DiscountRule, GiftCard, PricingError, VerificationDiscount, VerificationType,
};

/// A store read failed.
///
/// Internal detail (driver messages, SQL) stays in the `String`s and is
/// logged, never rendered to shoppers.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Connection or pool problems; the store may come back.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but the data could not be used.
    #[error("store error: {0}")]
    Internal(String),
}

impl From<StoreError> for PricingError {
    fn from(err: StoreError) -> Self {
        PricingError::StoreUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Authoritative product lookup by id.
#[allow(async_fn_in_trait)]
pub trait CatalogSource {
    /// Returns the active catalog rows for the requested ids. Missing ids
    /// are simply absent; the cart build decides what that means.
    async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<CatalogProduct>, StoreError>;
}

/// Read-only view over the three discount sources.
#[allow(async_fn_in_trait)]
pub trait DiscountStore {
    /// Every active rule that applies without a code.
    async fn active_automatic_rules(&self) -> Result<Vec<DiscountRule>, StoreError>;

    /// Looks up one rule by its normalized (uppercase) code, any status.
    async fn rule_by_code(&self, code: &str) -> Result<Option<DiscountRule>, StoreError>;

    /// The configured discount for a verification program, if any.
    async fn verification_discount(
        &self,
        verification_type: VerificationType,
    ) -> Result<Option<VerificationDiscount>, StoreError>;
}

/// Gift-card balance reads for application planning.
///
/// Debits are not here: they happen inside the checkout commit
/// transaction, which belongs to the storage layer.
#[allow(async_fn_in_trait)]
pub trait GiftCardStore {
    /// Returns the cards that exist among `codes` (normalized uppercase).
    /// Unknown codes are simply absent.
    async fn cards_by_codes(&self, codes: &[String]) -> Result<Vec<GiftCard>, StoreError>;
}
