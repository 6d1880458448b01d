//! # Domain Types
//!
//! Core domain types for the pricing engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CatalogProduct  │   │  DiscountRule   │   │    GiftCard     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  code (unique)  │   │  code           │       │
//! │  │  price (Money)  │   │  kind / target  │   │  balance        │       │
//! │  │  product_type   │   │  validity range │   │  version (CAS)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  PricingRequest (ephemeral, one computation)                           │
//! │       │  declared values are checked, never computed with              │
//! │       ▼                                                                 │
//! │  OrderTotals (result, persisted once, never mutated)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Value Identity Pattern
//! The request carries *declared* amounts (what the client screen showed);
//! every amount that matters is recomputed server-side from catalog rows
//! keyed by stable ids. Declared values exist only to detect divergence.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 825 bps = 8.25% (e.g., Texas sales tax)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Product Types
// =============================================================================

/// What kind of product a catalog row is.
///
/// Gift-card products get special treatment in pricing: they are never
/// discountable, no matter what the catalog row's flag says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductType {
    AirFilter,
    WaterFilter,
    RefrigeratorFilter,
    HumidifierFilter,
    PoolFilter,
    GiftCard,
    Accessory,
    Other,
}

impl ProductType {
    /// Stable string form, used for persistence and rule targeting.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductType::AirFilter => "air-filter",
            ProductType::WaterFilter => "water-filter",
            ProductType::RefrigeratorFilter => "refrigerator-filter",
            ProductType::HumidifierFilter => "humidifier-filter",
            ProductType::PoolFilter => "pool-filter",
            ProductType::GiftCard => "gift-card",
            ProductType::Accessory => "accessory",
            ProductType::Other => "other",
        }
    }

    /// Parses the stable string form. Unknown strings parse as `None`.
    pub fn parse(s: &str) -> Option<ProductType> {
        match s {
            "air-filter" => Some(ProductType::AirFilter),
            "water-filter" => Some(ProductType::WaterFilter),
            "refrigerator-filter" => Some(ProductType::RefrigeratorFilter),
            "humidifier-filter" => Some(ProductType::HumidifierFilter),
            "pool-filter" => Some(ProductType::PoolFilter),
            "gift-card" => Some(ProductType::GiftCard),
            "accessory" => Some(ProductType::Accessory),
            "other" => Some(ProductType::Other),
            _ => None,
        }
    }
}

/// A product as the catalog knows it: the authoritative price source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown on receipts.
    pub name: String,

    /// Authoritative price in cents. Client-declared prices are never used.
    pub price_cents: i64,

    pub product_type: ProductType,

    /// Categories this product belongs to (category ids).
    pub category_ids: Vec<String>,

    /// Admin-set exclusion (custom items, clearance). Gift cards are
    /// excluded regardless of this flag.
    pub excluded_from_discount: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogProduct {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Whether discounts may ever touch this product.
    pub fn discountable(&self) -> bool {
        !self.excluded_from_discount && self.product_type != ProductType::GiftCard
    }
}

// =============================================================================
// Destination / Shipping
// =============================================================================

/// A checkout destination, already validated by the address service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// ISO 3166-1 alpha-2 country code, e.g. "US".
    pub country: String,
    /// State / province code, e.g. "TX". Empty outside the US.
    pub state: String,
    pub city: String,
    pub postal_code: String,
}

impl Destination {
    /// Whether the destination is in the served (domestic) country.
    pub fn is_domestic(&self) -> bool {
        self.country.eq_ignore_ascii_case("US")
    }
}

/// A shipping rate already selected by the rate-shopping component.
///
/// The engine does not rank carriers; it prices the one the caller picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub carrier: String,
    pub service_code: String,
    pub rate_cents: i64,
}

impl ShippingQuote {
    #[inline]
    pub fn rate(&self) -> Money {
        Money::from_cents(self.rate_cents)
    }
}

/// What the tax provider (or its fallback) answered for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxQuote {
    pub rate: TaxRate,
    /// Total tax in cents, including shipping tax when `shipping_taxable`.
    pub tax_cents: i64,
    pub shipping_taxable: bool,
    /// Whether the store has nexus in the destination jurisdiction.
    pub has_nexus: bool,
}

impl TaxQuote {
    /// The deterministic zero-tax quote used for exempt jurisdictions and
    /// provider fallback.
    pub const fn zero() -> Self {
        TaxQuote {
            rate: TaxRate::zero(),
            tax_cents: 0,
            shipping_taxable: false,
            has_nexus: false,
        }
    }
}

// =============================================================================
// Discount Rules
// =============================================================================

/// How a discount rule's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is whole percent, 1..=100.
    Percentage,
    /// `value` is cents off.
    FixedAmount,
}

impl DiscountKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::FixedAmount => "fixed_amount",
        }
    }

    pub fn parse(s: &str) -> Option<DiscountKind> {
        match s {
            "percentage" => Some(DiscountKind::Percentage),
            "fixed_amount" => Some(DiscountKind::FixedAmount),
            _ => None,
        }
    }
}

/// What part of the cart a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountTarget {
    /// The whole discountable cart (order-threshold rules).
    Global,
    /// One product; `target_id` is the product id.
    Product,
    /// One category; `target_id` is the category id.
    Category,
    /// One product type; `target_id` is the `ProductType` string form.
    ProductType,
}

impl DiscountTarget {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountTarget::Global => "global",
            DiscountTarget::Product => "product",
            DiscountTarget::Category => "category",
            DiscountTarget::ProductType => "product_type",
        }
    }

    pub fn parse(s: &str) -> Option<DiscountTarget> {
        match s {
            "global" => Some(DiscountTarget::Global),
            "product" => Some(DiscountTarget::Product),
            "category" => Some(DiscountTarget::Category),
            "product_type" => Some(DiscountTarget::ProductType),
            _ => None,
        }
    }

    /// Non-global targets are meaningless without a target id.
    pub const fn requires_target_id(&self) -> bool {
        !matches!(self, DiscountTarget::Global)
    }
}

/// Lifecycle state of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountStatus {
    Active,
    Inactive,
    /// A `once_only` rule that an order has already consumed.
    Used,
}

impl DiscountStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountStatus::Active => "active",
            DiscountStatus::Inactive => "inactive",
            DiscountStatus::Used => "used",
        }
    }

    pub fn parse(s: &str) -> Option<DiscountStatus> {
        match s {
            "active" => Some(DiscountStatus::Active),
            "inactive" => Some(DiscountStatus::Inactive),
            "used" => Some(DiscountStatus::Used),
            _ => None,
        }
    }
}

/// An admin-authored discount rule.
///
/// ## Invariants (enforced on write, see [`DiscountRule::validate`])
/// - `cart_min_cents` ≤ `cart_max_cents`
/// - percentage: 0 < value ≤ 100
/// - fixed amount: value > 0; for global (order-threshold) rules the value
///   may not exceed the range maximum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: String,

    /// Unique, stored uppercase, matched case-insensitively.
    pub code: String,

    pub kind: DiscountKind,

    /// Whole percent for `Percentage`, cents for `FixedAmount`.
    pub value: i64,

    pub target: DiscountTarget,
    pub target_id: Option<String>,

    /// Inclusive cart-subtotal range the rule is valid for.
    pub cart_min_cents: i64,
    pub cart_max_cents: i64,

    /// Inclusive date-only validity window, store-timezone calendar days.
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,

    pub status: DiscountStatus,

    /// Automatic rules apply without a code; the rest are promo codes the
    /// shopper must submit.
    pub automatic: bool,

    /// Usable at most once, globally.
    pub once_only: bool,

    /// May stack on top of other discounts instead of competing.
    pub compoundable: bool,

    /// Winning this rule zeroes the shipping cost.
    pub free_shipping: bool,

    /// Fixed-amount only: apply per unit rather than once per line.
    pub multiply_by_qty: bool,

    /// Optimistic-concurrency counter; bumped on every write.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountRule {
    /// Percentage rules expressed in basis points for money math.
    pub fn value_bps(&self) -> u32 {
        debug_assert!(matches!(self.kind, DiscountKind::Percentage));
        (self.value.clamp(0, 100) as u32) * 100
    }

    /// Checks whether `day` falls inside the inclusive validity window.
    pub fn valid_on(&self, day: NaiveDate) -> bool {
        if let Some(from) = self.valid_from {
            if day < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if day > to {
                return false;
            }
        }
        true
    }

    /// Checks whether `subtotal` falls inside the inclusive cart range.
    pub fn in_cart_range(&self, subtotal: Money) -> bool {
        subtotal.cents() >= self.cart_min_cents && subtotal.cents() <= self.cart_max_cents
    }

    /// Admin-side invariant check, run before a rule is written.
    pub fn validate(&self) -> Result<(), RuleViolation> {
        if self.cart_min_cents > self.cart_max_cents {
            return Err(RuleViolation::InvertedCartRange);
        }
        match self.kind {
            DiscountKind::Percentage => {
                if self.value <= 0 || self.value > 100 {
                    return Err(RuleViolation::PercentOutOfRange { value: self.value });
                }
            }
            DiscountKind::FixedAmount => {
                if self.value <= 0 {
                    return Err(RuleViolation::NonPositiveAmount { value: self.value });
                }
                if self.target == DiscountTarget::Global && self.value > self.cart_max_cents {
                    return Err(RuleViolation::AmountExceedsRange { value: self.value });
                }
            }
        }
        if self.target.requires_target_id() && self.target_id.is_none() {
            return Err(RuleViolation::MissingTargetId);
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if from > to {
                return Err(RuleViolation::InvertedDateWindow);
            }
        }
        Ok(())
    }
}

/// Why an admin write of a rule was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("cart range minimum exceeds maximum")]
    InvertedCartRange,
    #[error("percentage must be in (0, 100], got {value}")]
    PercentOutOfRange { value: i64 },
    #[error("fixed amount must be positive, got {value}")]
    NonPositiveAmount { value: i64 },
    #[error("fixed amount {value} exceeds the cart range maximum")]
    AmountExceedsRange { value: i64 },
    #[error("product, category and product-type rules require a target id")]
    MissingTargetId,
    #[error("validity window start is after its end")]
    InvertedDateWindow,
}

// =============================================================================
// Verification Discounts
// =============================================================================

/// Identity-verification programs with their own discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Military,
    FirstResponder,
    Teacher,
    Employee,
}

impl VerificationType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            VerificationType::Military => "military",
            VerificationType::FirstResponder => "first_responder",
            VerificationType::Teacher => "teacher",
            VerificationType::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Option<VerificationType> {
        match s {
            "military" => Some(VerificationType::Military),
            "first_responder" => Some(VerificationType::FirstResponder),
            "teacher" => Some(VerificationType::Teacher),
            "employee" => Some(VerificationType::Employee),
            _ => None,
        }
    }
}

/// The capped percentage discount granted to a verified identity.
///
/// One active row per `verification_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationDiscount {
    pub id: String,
    pub verification_type: VerificationType,
    /// Whole percent, 1..=100.
    pub discount_percent: i64,
    /// Orders below this subtotal get nothing.
    pub min_order_cents: i64,
    /// Hard cap on the discount amount.
    pub max_discount_cents: i64,
    pub is_active: bool,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationDiscount {
    pub fn value_bps(&self) -> u32 {
        (self.discount_percent.clamp(0, 100) as u32) * 100
    }

    pub fn valid_on(&self, day: NaiveDate) -> bool {
        if let Some(from) = self.valid_from {
            if day < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if day > to {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Gift Cards
// =============================================================================

/// A stored-value gift card. Base currency only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftCard {
    pub code: String,
    /// Never negative; decreases only through redemption.
    pub balance_cents: i64,
    /// Optimistic-concurrency counter; bumped on every debit.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GiftCard {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// One planned or executed debit against a gift card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCardApplication {
    pub code: String,
    pub applied_cents: i64,
}

// =============================================================================
// Pricing Request
// =============================================================================

/// One line as submitted by the client: a product reference and a count.
///
/// No price. The catalog is the only price source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything one pricing computation needs. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub lines: Vec<RequestLine>,

    /// What the client screen showed as subtotal, for tamper detection
    /// only (±1 cent tolerance). Never an input to computation.
    pub declared_subtotal_cents: Option<i64>,

    pub destination: Destination,

    /// Promo code as typed; normalized before lookup.
    pub promo_code: Option<String>,

    /// Set when the identity service has already verified the shopper.
    pub verification: Option<VerificationType>,

    pub gift_card_codes: Vec<String>,

    pub donation_cents: i64,

    /// The carrier rate the caller already selected, if the order ships.
    pub shipping: Option<ShippingQuote>,

    /// Currency to render amounts in; settlement stays in base currency.
    pub display_currency: Option<Currency>,
}

// =============================================================================
// Order Totals
// =============================================================================

/// Which discount won the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountSource {
    None,
    /// A catalog rule won (possibly with compoundable rules stacked on it).
    Rule {
        code: String,
        /// All stacked rule codes, winner first.
        stacked: Vec<String>,
    },
    Verification { verification_type: VerificationType },
}

/// Display-currency rendering of the chargeable total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTotals {
    pub currency: Currency,
    pub rate_micros: i64,
    pub total_minor: i64,
}

/// The authoritative result of one pricing computation.
///
/// Persisted once, atomically, when the order is committed; corrections are
/// separate adjustment records, never edits to this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub discount_source: DiscountSource,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub tax_rate_bps: u32,
    /// Set when the provider was unavailable and zero tax was assumed;
    /// back office reviews these orders by hand.
    pub tax_review_required: bool,
    pub donation_cents: i64,
    pub gift_card_applied_cents: i64,
    /// Amount to capture, after gift cards. Never negative.
    pub total_cents: i64,
    /// Always the base currency.
    pub currency: Currency,
    /// Present when a display currency was requested and a rate was loaded.
    pub display: Option<DisplayTotals>,
}

// =============================================================================
// Pricing Config
// =============================================================================

/// Store-level pricing knobs, plumbed explicitly into the engine.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// The store's timezone, used to resolve "today" for date-only
    /// discount windows. Calendar days, not UTC instants.
    pub store_timezone: FixedOffset,

    /// Orders at or above this subtotal ship free even without a
    /// free-shipping rule. `None` disables the threshold.
    pub free_shipping_threshold_cents: Option<i64>,

    /// Allowed client/server subtotal divergence, in cents.
    pub subtotal_tolerance_cents: i64,

    /// Bound on optimistic-concurrency retries before giving up.
    pub max_cas_retries: u32,
}

impl PricingConfig {
    /// The store's calendar date at a given instant.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.store_timezone).date_naive()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            // US Central; the offset is part of store configuration, the
            // default just has to be a real one.
            store_timezone: FixedOffset::west_opt(6 * 3600).expect("static offset in range"),
            free_shipping_threshold_cents: None,
            subtotal_tolerance_cents: 1,
            max_cas_retries: 3,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rule_base() -> DiscountRule {
        DiscountRule {
            id: "r1".to_string(),
            code: "SAVE10".to_string(),
            kind: DiscountKind::Percentage,
            value: 10,
            target: DiscountTarget::Global,
            target_id: None,
            cart_min_cents: 0,
            cart_max_cents: i64::MAX,
            valid_from: None,
            valid_to: None,
            status: DiscountStatus::Active,
            automatic: true,
            once_only: false,
            compoundable: false,
            free_shipping: false,
            multiply_by_qty: false,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_product_type_round_trip() {
        for t in [
            ProductType::AirFilter,
            ProductType::WaterFilter,
            ProductType::RefrigeratorFilter,
            ProductType::HumidifierFilter,
            ProductType::PoolFilter,
            ProductType::GiftCard,
            ProductType::Accessory,
            ProductType::Other,
        ] {
            assert_eq!(ProductType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ProductType::parse("furnace"), None);
    }

    #[test]
    fn test_validity_window_is_inclusive() {
        let mut rule = rule_base();
        rule.valid_from = Some(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        rule.valid_to = Some(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());

        assert!(rule.valid_on(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
        assert!(rule.valid_on(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!rule.valid_on(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()));
        assert!(!rule.valid_on(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
    }

    #[test]
    fn test_cart_range_is_inclusive() {
        let mut rule = rule_base();
        rule.cart_min_cents = 10_000;
        rule.cart_max_cents = 50_000;

        assert!(rule.in_cart_range(Money::from_cents(10_000)));
        assert!(rule.in_cart_range(Money::from_cents(50_000)));
        assert!(!rule.in_cart_range(Money::from_cents(9_999)));
        assert!(!rule.in_cart_range(Money::from_cents(50_001)));
    }

    #[test]
    fn test_rule_validate_percent_bounds() {
        let mut rule = rule_base();
        rule.value = 0;
        assert!(matches!(
            rule.validate(),
            Err(RuleViolation::PercentOutOfRange { .. })
        ));
        rule.value = 101;
        assert!(rule.validate().is_err());
        rule.value = 100;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_rule_validate_fixed_against_range() {
        let mut rule = rule_base();
        rule.kind = DiscountKind::FixedAmount;
        rule.value = 2_000;
        rule.cart_min_cents = 1_000;
        rule.cart_max_cents = 1_500;
        assert!(matches!(
            rule.validate(),
            Err(RuleViolation::AmountExceedsRange { .. })
        ));
    }

    #[test]
    fn test_rule_validate_missing_target_id() {
        let mut rule = rule_base();
        rule.target = DiscountTarget::Category;
        rule.target_id = None;
        assert_eq!(rule.validate(), Err(RuleViolation::MissingTargetId));
    }

    #[test]
    fn test_gift_card_product_never_discountable() {
        let product = CatalogProduct {
            id: "p1".to_string(),
            sku: "GC-50".to_string(),
            name: "Gift Card $50".to_string(),
            price_cents: 5_000,
            product_type: ProductType::GiftCard,
            category_ids: vec![],
            excluded_from_discount: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!product.discountable());
    }

    #[test]
    fn test_business_date_uses_store_timezone() {
        let config = PricingConfig::default();
        // 03:00 UTC on June 2 is still June 1 in US Central (UTC-6).
        let at = Utc.with_ymd_and_hms(2026, 6, 2, 3, 0, 0).unwrap();
        assert_eq!(
            config.business_date(at),
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_non_domestic_destination() {
        let dest = Destination {
            country: "CA".to_string(),
            state: "ON".to_string(),
            city: "Toronto".to_string(),
            postal_code: "M5V 2T6".to_string(),
        };
        assert!(!dest.is_domestic());
    }
}
