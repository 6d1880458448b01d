//! # Error Types
//!
//! The pricing error taxonomy.
//!
//! ## Three Kinds of Failure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Error Taxonomy                                    │
//! │                                                                         │
//! │  Fatal / Rejection  (PricingError)                                     │
//! │  ├── EmptyCart, InvalidQuantity, UnknownProduct, InvalidDonation       │
//! │  ├── TotalMismatch          ← client and server disagree on subtotal   │
//! │  ├── ConcurrentModification ← lost an optimistic-concurrency race      │
//! │  └── StoreUnavailable       ← discount/gift-card state unreadable      │
//! │      → no totals are returned; checkout must not reach capture         │
//! │                                                                         │
//! │  Soft  (PricingWarning, returned BESIDE a valid OrderTotals)           │
//! │  ├── InvalidPromoCode       ← checkout proceeds without the discount   │
//! │  ├── GiftCardUnusable       ← that card is skipped                     │
//! │  ├── GiftCardPartial        ← remainder goes to payment capture        │
//! │  ├── TaxFallback            ← zero tax assumed, order flagged          │
//! │  └── DisplayRateUnavailable ← base-currency display only               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal detail (SQL errors, provider stack traces) is mapped away at the
//! crate boundary; callers only ever see these variants and their messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Pricing Error (fatal / rejection)
// =============================================================================

/// Errors that abort the computation and block progression to capture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Carts with no lines cannot be priced.
    #[error("cart is empty")]
    EmptyCart,

    /// Quantity outside 1..=MAX_ITEM_QUANTITY.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: i64 },

    /// Cart has more distinct lines than allowed.
    #[error("cart cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// The catalog has no active row for a requested product id.
    #[error("unknown product: {product_id}")]
    UnknownProduct { product_id: String },

    /// Donations cannot be negative.
    #[error("invalid donation amount: {cents} cents")]
    InvalidDonation { cents: i64 },

    /// Client-declared subtotal diverges from the recomputed one beyond
    /// tolerance. The client must refresh and re-submit.
    #[error("declared subtotal {declared_cents} does not match computed {computed_cents}")]
    TotalMismatch {
        declared_cents: i64,
        computed_cents: i64,
    },

    /// A concurrent checkout won the race for a once-only rule or a
    /// gift-card balance. Retry the whole pricing request.
    #[error("concurrent modification of {entity} {id}")]
    ConcurrentModification { entity: &'static str, id: String },

    /// Discount/gift-card state could not be read or written. Pricing on
    /// stale state is worse than failing, so the whole computation fails.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

/// Convenience type alias for Results with PricingError.
pub type PricingResult<T> = Result<T, PricingError>;

// =============================================================================
// Pricing Warning (soft-fail)
// =============================================================================

/// Degradations reported beside a valid result.
///
/// The UI shows these as messages; checkout proceeds. Serializable so the
/// checkout preview response can carry them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingWarning {
    /// Promo code not found, inactive, expired, already used, or the cart
    /// amount is outside its range.
    #[error("promo code {code} not applied: {reason}")]
    InvalidPromoCode { code: String, reason: String },

    /// A submitted gift-card code does not exist or has a zero balance.
    #[error("gift card {code} not applied: {reason}")]
    GiftCardUnusable { code: String, reason: String },

    /// Gift cards covered only part of the total.
    #[error("gift cards cover {applied_cents} of {total_cents} cents")]
    GiftCardPartial {
        applied_cents: i64,
        total_cents: i64,
    },

    /// The tax provider was unavailable; zero tax was assumed and the
    /// order was flagged for back-office review.
    #[error("tax provider unavailable, zero-tax fallback applied")]
    TaxFallback,

    /// The requested display currency has no loaded rate.
    #[error("no exchange rate loaded for {currency}")]
    DisplayRateUnavailable { currency: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PricingError::TotalMismatch {
            declared_cents: 5_000,
            computed_cents: 5_500,
        };
        assert_eq!(
            err.to_string(),
            "declared subtotal 5000 does not match computed 5500"
        );
    }

    #[test]
    fn test_warning_messages() {
        let warn = PricingWarning::InvalidPromoCode {
            code: "SPRING".to_string(),
            reason: "expired".to_string(),
        };
        assert_eq!(warn.to_string(), "promo code SPRING not applied: expired");
    }
}
