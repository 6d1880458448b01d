//! # Discount Resolution
//!
//! Candidate evaluation and winner selection for all discount sources.
//!
//! ## Resolution Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Discount Resolution                                  │
//! │                                                                         │
//! │  automatic rules ──► automatic_candidates() ──┐                        │
//! │  submitted code  ──► promo_candidate()     ───┤                        │
//! │  verified identity ► verification_candidate() ┤                        │
//! │                                               ▼                        │
//! │                                      select_discount()                 │
//! │                                               │                        │
//! │   compoundable candidates sum together        │                        │
//! │   + at most ONE non-compoundable winner       │                        │
//! │   (largest amount; ties: product-scoped >     │                        │
//! │    order-threshold > promo)                   │                        │
//! │                                               │                        │
//! │   verification NEVER stacks: it beats the     │                        │
//! │   whole rule selection or loses to it         │                        │
//! │                                               ▼                        │
//! │                                      DiscountSelection                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is pure: same cart, rules and date in, same
//! selection out. The winner a shopper saw on the preview is the winner
//! the capture re-derives.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::money::Money;
use crate::types::{
    DiscountKind, DiscountRule, DiscountSource, DiscountStatus, DiscountTarget, ProductType,
    VerificationDiscount, VerificationType,
};

// =============================================================================
// Candidates
// =============================================================================

/// Where a rule candidate came from; breaks amount ties, most specific wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOrigin {
    ProductScoped,
    OrderThreshold,
    Promo,
}

impl RuleOrigin {
    /// Higher beats lower when candidate amounts tie.
    const fn precedence(self) -> u8 {
        match self {
            RuleOrigin::ProductScoped => 3,
            RuleOrigin::OrderThreshold => 2,
            RuleOrigin::Promo => 1,
        }
    }
}

/// A rule that matched the cart, with its computed discount amount.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCandidate {
    pub rule: DiscountRule,
    pub origin: RuleOrigin,
    pub amount: Money,
}

/// The identity-verification discount, already capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCandidate {
    pub verification_type: VerificationType,
    pub amount: Money,
}

/// The outcome of winner selection.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountSelection {
    pub amount: Money,
    pub source: DiscountSource,
    /// Whether an applied rule grants free shipping.
    pub free_shipping: bool,
    /// Once-only rules among the applied set; the checkout commit flips
    /// these to `used` atomically with the order.
    pub consumed_rule_ids: Vec<String>,
}

impl DiscountSelection {
    /// No discount applied.
    pub fn none() -> Self {
        DiscountSelection {
            amount: Money::zero(),
            source: DiscountSource::None,
            free_shipping: false,
            consumed_rule_ids: Vec::new(),
        }
    }
}

/// Why a submitted promo code produced no candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoRejection {
    NotFound,
    NotActive,
    AlreadyUsed,
    OutsideWindow,
    CartAmountOutOfRange,
    NoEligibleItems,
}

impl PromoRejection {
    /// Stable, shopper-safe message text.
    pub const fn reason(self) -> &'static str {
        match self {
            PromoRejection::NotFound => "code not found",
            PromoRejection::NotActive => "code is not active",
            PromoRejection::AlreadyUsed => "code has already been used",
            PromoRejection::OutsideWindow => "code is outside its validity dates",
            PromoRejection::CartAmountOutOfRange => "cart amount is outside the code's range",
            PromoRejection::NoEligibleItems => "no items in the cart are eligible",
        }
    }
}

// =============================================================================
// Candidate Evaluation
// =============================================================================

/// Whether a rule's target matches one cart line.
///
/// A rule that requires a target id but has none never matches; the same
/// goes for a product-type target that names an unknown type. Misconfigured
/// rules are "no match", never a runtime error.
fn target_matches(rule: &DiscountRule, item: &crate::cart::CartItem) -> bool {
    match rule.target {
        DiscountTarget::Global => true,
        DiscountTarget::Product => rule
            .target_id
            .as_deref()
            .is_some_and(|id| id == item.product_id),
        DiscountTarget::Category => rule
            .target_id
            .as_deref()
            .is_some_and(|id| item.category_ids.iter().any(|c| c == id)),
        DiscountTarget::ProductType => rule
            .target_id
            .as_deref()
            .and_then(ProductType::parse)
            .is_some_and(|t| t == item.product_type),
    }
}

/// Computes a rule's discount amount against the eligible subset of lines.
///
/// Returns zero when nothing matches. Amounts are capped so a rule can
/// never discount more than the lines it touched are worth.
fn candidate_amount(rule: &DiscountRule, cart: &Cart) -> Money {
    let matched: Vec<_> = cart
        .items()
        .iter()
        .filter(|i| i.discountable() && target_matches(rule, i))
        .collect();

    let matched_total: Money = matched.iter().map(|i| i.line_total()).sum();
    if matched_total.is_zero() {
        return Money::zero();
    }

    match rule.kind {
        DiscountKind::Percentage => matched_total.percent_bps(rule.value_bps()),
        DiscountKind::FixedAmount => {
            let value = Money::from_cents(rule.value);
            if rule.target == DiscountTarget::Global {
                // Order-threshold rules take the amount off once.
                value.min(matched_total)
            } else {
                // Targeted fixed rules apply per line, capped at what the
                // line is worth; multiply_by_qty applies per unit instead.
                matched
                    .iter()
                    .map(|i| {
                        let per_line = if rule.multiply_by_qty {
                            value.multiply_quantity(i.quantity)
                        } else {
                            value
                        };
                        per_line.min(i.line_total())
                    })
                    .sum()
            }
        }
    }
}

/// Evaluates one rule as an automatic (no-code) candidate.
///
/// `subtotal` is the full recomputed cart subtotal; the cart-amount range
/// is always checked against it, not the eligible subset.
pub fn rule_candidate(
    rule: &DiscountRule,
    cart: &Cart,
    subtotal: Money,
    today: NaiveDate,
) -> Option<RuleCandidate> {
    if rule.status != DiscountStatus::Active {
        return None;
    }
    if !rule.valid_on(today) || !rule.in_cart_range(subtotal) {
        return None;
    }
    if rule.target.requires_target_id() && rule.target_id.is_none() {
        return None;
    }

    let amount = candidate_amount(rule, cart);
    if !amount.is_positive() {
        return None;
    }

    let origin = if rule.target == DiscountTarget::Global {
        RuleOrigin::OrderThreshold
    } else {
        RuleOrigin::ProductScoped
    };

    Some(RuleCandidate {
        rule: rule.clone(),
        origin,
        amount,
    })
}

/// Evaluates every automatic rule against the cart.
pub fn automatic_candidates(
    rules: &[DiscountRule],
    cart: &Cart,
    subtotal: Money,
    today: NaiveDate,
) -> Vec<RuleCandidate> {
    rules
        .iter()
        .filter(|r| r.automatic)
        .filter_map(|r| rule_candidate(r, cart, subtotal, today))
        .collect()
}

/// Evaluates the submitted promo code, explaining any rejection.
///
/// `rule` is the store's lookup result for the normalized code. Rejections
/// are soft: the caller surfaces them as a message and prices the order
/// without the code.
pub fn promo_candidate(
    rule: Option<&DiscountRule>,
    cart: &Cart,
    subtotal: Money,
    today: NaiveDate,
) -> Result<RuleCandidate, PromoRejection> {
    let rule = rule.ok_or(PromoRejection::NotFound)?;

    match rule.status {
        DiscountStatus::Active => {}
        DiscountStatus::Inactive => return Err(PromoRejection::NotActive),
        DiscountStatus::Used => return Err(PromoRejection::AlreadyUsed),
    }
    if !rule.valid_on(today) {
        return Err(PromoRejection::OutsideWindow);
    }
    if !rule.in_cart_range(subtotal) {
        return Err(PromoRejection::CartAmountOutOfRange);
    }
    if rule.target.requires_target_id() && rule.target_id.is_none() {
        // Misconfigured rule; same shopper-facing outcome as no match.
        return Err(PromoRejection::NoEligibleItems);
    }

    let amount = candidate_amount(rule, cart);
    if !amount.is_positive() {
        return Err(PromoRejection::NoEligibleItems);
    }

    Ok(RuleCandidate {
        rule: rule.clone(),
        origin: RuleOrigin::Promo,
        amount,
    })
}

/// Evaluates the identity-verification discount.
///
/// The percentage applies to the full subtotal and is capped at the
/// program's maximum.
pub fn verification_candidate(
    vd: &VerificationDiscount,
    subtotal: Money,
    today: NaiveDate,
) -> Option<VerificationCandidate> {
    if !vd.is_active || !vd.valid_on(today) {
        return None;
    }
    if subtotal.cents() < vd.min_order_cents {
        return None;
    }

    let amount = subtotal
        .percent_bps(vd.value_bps())
        .min(Money::from_cents(vd.max_discount_cents));
    if !amount.is_positive() {
        return None;
    }

    Some(VerificationCandidate {
        verification_type: vd.verification_type,
        amount,
    })
}

// =============================================================================
// Winner Selection
// =============================================================================

/// Picks the discount the order actually gets.
///
/// ## Stacking Rules
/// - compoundable rule candidates sum together
/// - at most one non-compoundable candidate joins them: the largest
///   amount, ties broken by origin specificity
/// - the verification discount competes against the entire rule selection
///   and wins only when strictly larger; it never stacks with anything
/// - the total is capped at `cap` (the discountable subtotal) so stacked
///   rules cannot discount items they were never allowed to touch
pub fn select_discount(
    candidates: &[RuleCandidate],
    verification: Option<&VerificationCandidate>,
    cap: Money,
) -> DiscountSelection {
    let best_exclusive = candidates
        .iter()
        .filter(|c| !c.rule.compoundable)
        .max_by_key(|c| (c.amount, c.origin.precedence()));

    let mut applied: Vec<&RuleCandidate> = candidates
        .iter()
        .filter(|c| c.rule.compoundable)
        .collect();
    // Winner first, then stacked rules largest-first; code as the final
    // key keeps the order stable for identical amounts.
    applied.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.rule.code.cmp(&b.rule.code))
    });
    if let Some(winner) = best_exclusive {
        applied.insert(0, winner);
    }

    let rule_amount: Money = applied.iter().map(|c| c.amount).sum();
    let rule_amount = rule_amount.min(cap);

    // Verification is all-or-nothing against the whole rule selection;
    // on a tie the more specific rule side keeps the win.
    if let Some(v) = verification {
        if v.amount > rule_amount {
            return DiscountSelection {
                amount: v.amount,
                source: DiscountSource::Verification {
                    verification_type: v.verification_type,
                },
                free_shipping: false,
                consumed_rule_ids: Vec::new(),
            };
        }
    }

    if !rule_amount.is_positive() {
        return DiscountSelection::none();
    }

    let primary = applied[0];
    DiscountSelection {
        amount: rule_amount,
        source: DiscountSource::Rule {
            code: primary.rule.code.clone(),
            stacked: applied.iter().map(|c| c.rule.code.clone()).collect(),
        },
        free_shipping: applied.iter().any(|c| c.rule.free_shipping),
        consumed_rule_ids: applied
            .iter()
            .filter(|c| c.rule.once_only)
            .map(|c| c.rule.id.clone())
            .collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
