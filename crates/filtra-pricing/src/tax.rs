//! # Tax Calculation
//!
//! Wraps the external tax-rate provider behind a deterministic policy.
//!
//! ## Decision Tree
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      TaxCalculator::calculate                           │
//! │                                                                         │
//! │  destination outside the US? ──────────► zero tax (out of scope)       │
//! │  state with no sales tax? ─────────────► zero tax (no provider call)   │
//! │                                                                         │
//! │  otherwise: call provider with a bounded timeout                       │
//! │       │                                                                 │
//! │       ├── Ok(quote)      ──► use it                                    │
//! │       ├── Err(provider)  ──► zero tax + review flag + warn! log        │
//! │       └── timed out      ──► zero tax + review flag + warn! log        │
//! │                                                                         │
//! │  Checkout is never blocked on tax. Availability wins; the flagged      │
//! │  order gets a human look instead.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The short-circuits run before any network I/O: a Montana order costs no
//! provider call and cannot be wrong about it.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use filtra_core::{Destination, Money, TaxQuote};

/// US states that levy no state sales tax.
pub const NO_SALES_TAX_STATES: [&str; 5] = ["AK", "DE", "MT", "NH", "OR"];

/// The external tax-rate provider, e.g. an HTTP tax API client.
#[allow(async_fn_in_trait)]
pub trait TaxProvider {
    /// Quotes tax for one order. `taxable` is subtotal minus discount;
    /// `shipping` lets the provider include shipping tax where the
    /// jurisdiction taxes it.
    async fn tax_for_order(
        &self,
        destination: &Destination,
        taxable: Money,
        shipping: Money,
    ) -> Result<TaxQuote, TaxProviderError>;
}

/// Provider-side failure. Detail is logged, not surfaced.
#[derive(Debug, Clone, Error)]
pub enum TaxProviderError {
    #[error("tax provider error: {0}")]
    Provider(String),
}

/// What to do when the provider cannot answer.
///
/// One policy value instead of try/catch scattered through the engine.
#[derive(Debug, Clone)]
pub struct TaxFallbackPolicy {
    /// Bound on the provider call. Past this, zero-tax fallback applies.
    pub call_timeout: Duration,

    /// Whether a timed-out call flags the order for back-office review the
    /// way a hard provider error does.
    pub flag_timeouts: bool,
}

impl Default for TaxFallbackPolicy {
    fn default() -> Self {
        TaxFallbackPolicy {
            call_timeout: Duration::from_secs(2),
            flag_timeouts: true,
        }
    }
}

/// The calculator's answer: always usable, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxOutcome {
    pub quote: TaxQuote,
    /// True when the provider failed and zero tax was assumed.
    pub fallback_applied: bool,
    /// True when the order should be reviewed by a human.
    pub review_required: bool,
}

impl TaxOutcome {
    const fn exempt() -> Self {
        TaxOutcome {
            quote: TaxQuote::zero(),
            fallback_applied: false,
            review_required: false,
        }
    }
}

/// Deterministic wrapper over a [`TaxProvider`].
#[derive(Debug, Clone)]
pub struct TaxCalculator<P> {
    provider: P,
    policy: TaxFallbackPolicy,
}

impl<P: TaxProvider> TaxCalculator<P> {
    pub fn new(provider: P, policy: TaxFallbackPolicy) -> Self {
        TaxCalculator { provider, policy }
    }

    /// Computes tax for a taxable amount and destination.
    ///
    /// Exempt jurisdictions short-circuit to zero without touching the
    /// provider; provider failure degrades to zero tax plus a review flag.
    pub async fn calculate(
        &self,
        destination: &Destination,
        taxable: Money,
        shipping: Money,
    ) -> TaxOutcome {
        if !destination.is_domestic() {
            debug!(country = %destination.country, "non-domestic destination, no tax");
            return TaxOutcome::exempt();
        }

        let state = destination.state.to_ascii_uppercase();
        if NO_SALES_TAX_STATES.contains(&state.as_str()) {
            debug!(state = %state, "no-sales-tax state, provider skipped");
            return TaxOutcome::exempt();
        }

        let call = self.provider.tax_for_order(destination, taxable, shipping);
        match tokio::time::timeout(self.policy.call_timeout, call).await {
            Ok(Ok(quote)) => TaxOutcome {
                quote,
                fallback_applied: false,
                review_required: false,
            },
            Ok(Err(err)) => {
                warn!(error = %err, state = %state, "tax provider failed, zero-tax fallback");
                TaxOutcome {
                    quote: TaxQuote::zero(),
                    fallback_applied: true,
                    review_required: true,
                }
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.policy.call_timeout.as_millis() as u64,
                    state = %state,
                    "tax provider timed out, zero-tax fallback"
                );
                TaxOutcome {
                    quote: TaxQuote::zero(),
                    fallback_applied: true,
                    review_required: self.policy.flag_timeouts,
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
