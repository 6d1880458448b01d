//! # Pricing Engine
//!
//! The authoritative, stage-ordered pricing computation.
//!
//! ## Stage Order (fixed; each stage feeds the next)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PricingEngine::compute                            │
//! │                                                                         │
//! │   1. validate request shape (fatal errors stop everything)             │
//! │   2. recompute subtotal from catalog prices                            │
//! │      └── declared subtotal compared ±1¢ → TotalMismatch on divergence  │
//! │   3. collect rule candidates (automatic + submitted promo code)        │
//! │   4. collect the verification-discount candidate                       │
//! │   5. select the winner per stacking rules                              │
//! │   6. taxable = subtotal − discount                                     │
//! │   7. tax via TaxCalculator (short-circuits, timeout, fallback)         │
//! │   8. total = taxable + shipping + tax + donation  (floor at zero)      │
//! │   9. plan gift cards, largest balance first, until total reaches zero  │
//! │  10. display conversion (presentation only, never settlement)          │
//! │                                                                         │
//! │  Called twice per order: once for the checkout preview and once        │
//! │  right before capture. Same inputs, same store state ⇒ identical       │
//! │  base-currency totals, byte for byte.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `compute` never mutates anything. The consumption plan it returns
//! (once-only rules, gift-card debits) is executed by the storage layer's
//! checkout commit in one transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use filtra_core::discount::{
    automatic_candidates, promo_candidate, select_discount, verification_candidate,
};
use filtra_core::validation::{normalize_code, validate_request};
use filtra_core::{
    Cart, Currency, DisplayTotals, ExchangeRateTable, GiftCard, GiftCardApplication, Money,
    OrderTotals, PricingConfig, PricingError, PricingRequest, PricingResult, PricingWarning,
};

use crate::stores::{CatalogSource, DiscountStore, GiftCardStore};
use crate::tax::{TaxCalculator, TaxProvider};

// =============================================================================
// Priced Order
// =============================================================================

/// A computed order: totals, degradation warnings, and the consumption
/// plan the checkout commit executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub totals: OrderTotals,

    /// Soft failures, surfaced to the UI without blocking checkout.
    pub warnings: Vec<PricingWarning>,

    /// Once-only rules the commit must flip to `used`.
    pub consumed_rule_ids: Vec<String>,

    /// Gift-card debits the commit must execute.
    pub gift_card_plan: Vec<GiftCardApplication>,
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Orchestrates one pricing computation over its collaborator seams.
#[derive(Debug, Clone)]
pub struct PricingEngine<C, D, G, P> {
    catalog: C,
    discounts: D,
    gift_cards: G,
    tax: TaxCalculator<P>,
    rates: ExchangeRateTable,
    config: PricingConfig,
}

impl<C, D, G, P> PricingEngine<C, D, G, P>
where
    C: CatalogSource,
    D: DiscountStore,
    G: GiftCardStore,
    P: TaxProvider,
{
    pub fn new(
        catalog: C,
        discounts: D,
        gift_cards: G,
        tax: TaxCalculator<P>,
        rates: ExchangeRateTable,
        config: PricingConfig,
    ) -> Self {
        PricingEngine {
            catalog,
            discounts,
            gift_cards,
            tax,
            rates,
            config,
        }
    }

    /// Prices one request. Read-only; see [`PricedOrder`] for what the
    /// commit executes afterwards.
    pub async fn compute(&self, request: &PricingRequest) -> PricingResult<PricedOrder> {
        validate_request(request)?;

        let mut warnings: Vec<PricingWarning> = Vec::new();

        // Stage 1: authoritative subtotal from catalog prices.
        let ids: Vec<String> = request
            .lines
            .iter()
            .map(|l| l.product_id.clone())
            .collect();
        let products = self.catalog.products_by_ids(&ids).await?;
        let cart = Cart::build(&request.lines, &products)?;
        let subtotal = cart.subtotal();

        if let Some(declared) = request.declared_subtotal_cents {
            let drift = (declared - subtotal.cents()).abs();
            if drift > self.config.subtotal_tolerance_cents {
                return Err(PricingError::TotalMismatch {
                    declared_cents: declared,
                    computed_cents: subtotal.cents(),
                });
            }
        }

        let today = self.config.business_date(Utc::now());
        debug!(subtotal = subtotal.cents(), lines = cart.line_count(), "subtotal recomputed");

        // Stages 2-3: discount candidates from all sources.
        let rules = self.discounts.active_automatic_rules().await?;
        let mut candidates = automatic_candidates(&rules, &cart, subtotal, today);

        if let Some(raw_code) = request.promo_code.as_deref() {
            let code = normalize_code(raw_code);
            if !code.is_empty() {
                let rule = self.discounts.rule_by_code(&code).await?;
                if rule.as_ref().is_some_and(|r| r.automatic) {
                    // Already in the candidate set; nothing to add and
                    // nothing to reject.
                    debug!(code = %code, "promo code names an automatic rule");
                } else {
                    match promo_candidate(rule.as_ref(), &cart, subtotal, today) {
                        Ok(candidate) => candidates.push(candidate),
                        Err(rejection) => {
                            debug!(code = %code, reason = rejection.reason(), "promo code rejected");
                            warnings.push(PricingWarning::InvalidPromoCode {
                                code,
                                reason: rejection.reason().to_string(),
                            });
                        }
                    }
                }
            }
        }

        let verification = match request.verification {
            Some(vtype) => self
                .discounts
                .verification_discount(vtype)
                .await?
                .and_then(|vd| verification_candidate(&vd, subtotal, today)),
            None => None,
        };

        // Stage 4: winner selection.
        let selection = select_discount(
            &candidates,
            verification.as_ref(),
            cart.discountable_subtotal(),
        );
        debug!(
            discount = selection.amount.cents(),
            source = ?selection.source,
            "discount selected"
        );

        // Stage 6: taxable amount. Donation and shipping are never in it.
        let taxable = (subtotal - selection.amount).floor_zero();

        // Shipping: the caller-selected rate, zeroed by a free-shipping
        // win or the store threshold.
        let free_by_threshold = self
            .config
            .free_shipping_threshold_cents
            .is_some_and(|t| subtotal.cents() >= t);
        let shipping = if selection.free_shipping || free_by_threshold {
            Money::zero()
        } else {
            request
                .shipping
                .as_ref()
                .map(|q| q.rate())
                .unwrap_or(Money::zero())
        };

        // Stage 7: tax, with its own short-circuits and fallback.
        let tax = self
            .tax
            .calculate(&request.destination, taxable, shipping)
            .await;
        if tax.fallback_applied {
            warnings.push(PricingWarning::TaxFallback);
        }

        // Stage 8: assemble the grand total.
        let donation = Money::from_cents(request.donation_cents);
        let grand_total =
            (taxable + shipping + Money::from_cents(tax.quote.tax_cents) + donation).floor_zero();

        // Stage 9: gift-card application plan.
        let (gift_card_plan, applied) = self
            .plan_gift_cards(&request.gift_card_codes, grand_total, &mut warnings)
            .await?;
        let total = grand_total - applied;
        if applied.is_positive() && total.is_positive() {
            warnings.push(PricingWarning::GiftCardPartial {
                applied_cents: applied.cents(),
                total_cents: grand_total.cents(),
            });
        }

        // Stage 10: display conversion, strictly presentation.
        let display = self.display_totals(request.display_currency, total, &mut warnings);

        let totals = OrderTotals {
            subtotal_cents: subtotal.cents(),
            discount_cents: selection.amount.cents(),
            discount_source: selection.source,
            shipping_cents: shipping.cents(),
            tax_cents: tax.quote.tax_cents,
            tax_rate_bps: tax.quote.rate.bps(),
            tax_review_required: tax.review_required,
            donation_cents: donation.cents(),
            gift_card_applied_cents: applied.cents(),
            total_cents: total.cents(),
            currency: Currency::BASE,
            display,
        };

        info!(
            subtotal = totals.subtotal_cents,
            discount = totals.discount_cents,
            tax = totals.tax_cents,
            total = totals.total_cents,
            warnings = warnings.len(),
            "order priced"
        );

        Ok(PricedOrder {
            totals,
            warnings,
            consumed_rule_ids: selection.consumed_rule_ids,
            gift_card_plan,
        })
    }

    /// Plans gift-card application: largest balance first, stopping at a
    /// zero remaining total. Unknown or empty cards degrade to warnings.
    async fn plan_gift_cards(
        &self,
        codes: &[String],
        total: Money,
        warnings: &mut Vec<PricingWarning>,
    ) -> PricingResult<(Vec<GiftCardApplication>, Money)> {
        if codes.is_empty() {
            return Ok((Vec::new(), Money::zero()));
        }

        let mut normalized: Vec<String> = Vec::new();
        for code in codes {
            let code = normalize_code(code);
            if !code.is_empty() && !normalized.contains(&code) {
                normalized.push(code);
            }
        }

        let mut cards: Vec<GiftCard> = self.gift_cards.cards_by_codes(&normalized).await?;

        for code in &normalized {
            if !cards.iter().any(|c| &c.code == code) {
                warnings.push(PricingWarning::GiftCardUnusable {
                    code: code.clone(),
                    reason: "card not found".to_string(),
                });
            }
        }

        // Largest balance first; code as tie-break keeps the plan stable.
        cards.sort_by(|a, b| {
            b.balance_cents
                .cmp(&a.balance_cents)
                .then_with(|| a.code.cmp(&b.code))
        });

        let mut plan = Vec::new();
        let mut remaining = total;
        for card in cards {
            if !card.balance().is_positive() {
                warnings.push(PricingWarning::GiftCardUnusable {
                    code: card.code.clone(),
                    reason: "no remaining balance".to_string(),
                });
                continue;
            }
            if remaining.is_zero() {
                break;
            }
            let applied = card.balance().min(remaining);
            remaining -= applied;
            plan.push(GiftCardApplication {
                code: card.code,
                applied_cents: applied.cents(),
            });
        }

        Ok((plan, total - remaining))
    }

    /// Converts the chargeable total for display, when asked and possible.
    fn display_totals(
        &self,
        currency: Option<Currency>,
        total: Money,
        warnings: &mut Vec<PricingWarning>,
    ) -> Option<DisplayTotals> {
        let currency = currency?;
        if currency == Currency::BASE {
            return None;
        }
        match self.rates.convert(total, currency) {
            Some(display) => Some(DisplayTotals {
                currency,
                rate_micros: display.rate_micros,
                total_minor: display.amount_minor,
            }),
            None => {
                warnings.push(PricingWarning::DisplayRateUnavailable {
                    currency: currency.code().to_string(),
                });
                None
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::StoreError;
    use crate::tax::{TaxFallbackPolicy, TaxProviderError};
    use chrono::Utc;
    use filtra_core::{
        CatalogProduct, Destination, DiscountKind, DiscountRule, DiscountSource, DiscountStatus,
        DiscountTarget, ProductType, RequestLine, ShippingQuote, TaxQuote, TaxRate,
        VerificationDiscount, VerificationType,
    };

    // -------------------------------------------------------------------------
    // In-memory fakes
    // -------------------------------------------------------------------------

    #[derive(Default, Clone)]
    struct MemCatalog {
        products: Vec<CatalogProduct>,
    }

    impl CatalogSource for MemCatalog {
        async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<CatalogProduct>, StoreError> {
            Ok(self
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default, Clone)]
    struct MemDiscounts {
        rules: Vec<DiscountRule>,
        verifications: Vec<VerificationDiscount>,
    }

    impl DiscountStore for MemDiscounts {
        async fn active_automatic_rules(&self) -> Result<Vec<DiscountRule>, StoreError> {
            Ok(self
                .rules
                .iter()
                .filter(|r| r.automatic && r.status == DiscountStatus::Active)
                .cloned()
                .collect())
        }

        async fn rule_by_code(&self, code: &str) -> Result<Option<DiscountRule>, StoreError> {
            Ok(self.rules.iter().find(|r| r.code == code).cloned())
        }

        async fn verification_discount(
            &self,
            verification_type: VerificationType,
        ) -> Result<Option<VerificationDiscount>, StoreError> {
            Ok(self
                .verifications
                .iter()
                .find(|v| v.verification_type == verification_type)
                .cloned())
        }
    }

    #[derive(Default, Clone)]
    struct MemCards {
        cards: Vec<GiftCard>,
    }

    impl GiftCardStore for MemCards {
        async fn cards_by_codes(&self, codes: &[String]) -> Result<Vec<GiftCard>, StoreError> {
            Ok(self
                .cards
                .iter()
                .filter(|c| codes.contains(&c.code))
                .cloned()
                .collect())
        }
    }

    /// Flat-rate provider for taxable states.
    #[derive(Clone)]
    struct FlatTax(u32);

    impl TaxProvider for FlatTax {
        async fn tax_for_order(
            &self,
            _destination: &Destination,
            taxable: Money,
            _shipping: Money,
        ) -> Result<TaxQuote, TaxProviderError> {
            Ok(TaxQuote {
                rate: TaxRate::from_bps(self.0),
                tax_cents: taxable.percent_bps(self.0).cents(),
                shipping_taxable: false,
                has_nexus: true,
            })
        }
    }

    #[derive(Clone)]
    struct BrokenTax;

    impl TaxProvider for BrokenTax {
        async fn tax_for_order(
            &self,
            _destination: &Destination,
            _taxable: Money,
            _shipping: Money,
        ) -> Result<TaxQuote, TaxProviderError> {
            Err(TaxProviderError::Provider("connection refused".to_string()))
        }
    }

    struct DownCatalog;

    impl CatalogSource for DownCatalog {
        async fn products_by_ids(
            &self,
            _ids: &[String],
        ) -> Result<Vec<CatalogProduct>, StoreError> {
            Err(StoreError::Unavailable("pool exhausted".to_string()))
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn product(id: &str, price_cents: i64) -> CatalogProduct {
        CatalogProduct {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price_cents,
            product_type: ProductType::AirFilter,
            category_ids: vec![],
            excluded_from_discount: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(code: &str) -> DiscountRule {
        DiscountRule {
            id: format!("id-{}", code),
            code: code.to_string(),
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

    fn card(code: &str, balance_cents: i64) -> GiftCard {
        GiftCard {
            code: code.to_string(),
            balance_cents,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn oregon() -> Destination {
        Destination {
            country: "US".to_string(),
            state: "OR".to_string(),
            city: "Portland".to_string(),
            postal_code: "97201".to_string(),
        }
    }

    fn texas() -> Destination {
        Destination {
            country: "US".to_string(),
            state: "TX".to_string(),
            city: "Austin".to_string(),
            postal_code: "78701".to_string(),
        }
    }

    fn request(lines: Vec<RequestLine>, destination: Destination) -> PricingRequest {
        PricingRequest {
            lines,
            declared_subtotal_cents: None,
            destination,
            promo_code: None,
            verification: None,
            gift_card_codes: vec![],
            donation_cents: 0,
            shipping: None,
            display_currency: None,
        }
    }

    fn line(id: &str, qty: i64) -> RequestLine {
        RequestLine {
            product_id: id.to_string(),
            quantity: qty,
        }
    }

    fn engine(
        catalog: MemCatalog,
        discounts: MemDiscounts,
        cards: MemCards,
        rate_bps: u32,
    ) -> PricingEngine<MemCatalog, MemDiscounts, MemCards, FlatTax> {
        PricingEngine::new(
            catalog,
            discounts,
            cards,
            TaxCalculator::new(FlatTax(rate_bps), TaxFallbackPolicy::default()),
            ExchangeRateTable::new(),
            PricingConfig::default(),
        )
    }

    // -------------------------------------------------------------------------
    // Scenario tests
    // -------------------------------------------------------------------------

    /// $120 cart, automatic 10% for [$100, $500], no-tax destination:
    /// discount $12, tax $0, total $108 + shipping.
    #[tokio::test]
    async fn test_order_threshold_discount_no_tax_jurisdiction() {
        let catalog = MemCatalog {
            products: vec![product("a", 12_000)],
        };
        let mut r = rule("TENOFF");
        r.cart_min_cents = 10_000;
        r.cart_max_cents = 50_000;
        let discounts = MemDiscounts {
            rules: vec![r],
            verifications: vec![],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.shipping = Some(ShippingQuote {
            carrier: "ups".to_string(),
            service_code: "ground".to_string(),
            rate_cents: 799,
        });

        let priced = engine(catalog, discounts, MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.subtotal_cents, 12_000);
        assert_eq!(priced.totals.discount_cents, 1_200);
        assert_eq!(priced.totals.tax_cents, 0);
        assert_eq!(priced.totals.shipping_cents, 799);
        assert_eq!(priced.totals.total_cents, 12_000 - 1_200 + 799);
        assert!(priced.warnings.is_empty());
    }

    /// $40 cart, $60 gift card, nothing else: card covers the whole total
    /// and the plan debits exactly $40.
    #[tokio::test]
    async fn test_gift_card_covers_total() {
        let catalog = MemCatalog {
            products: vec![product("a", 4_000)],
        };
        let cards = MemCards {
            cards: vec![card("GC-ALPHA", 6_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.gift_card_codes = vec!["gc-alpha".to_string()];

        let priced = engine(catalog, MemDiscounts::default(), cards, 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.gift_card_applied_cents, 4_000);
        assert_eq!(priced.totals.total_cents, 0);
        assert_eq!(
            priced.gift_card_plan,
            vec![GiftCardApplication {
                code: "GC-ALPHA".to_string(),
                applied_cents: 4_000,
            }]
        );
    }

    /// Client declares $50 but the catalog says $55: reject, no totals.
    #[tokio::test]
    async fn test_declared_subtotal_mismatch_rejected() {
        let catalog = MemCatalog {
            products: vec![product("a", 5_500)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.declared_subtotal_cents = Some(5_000);

        let err = engine(catalog, MemDiscounts::default(), MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PricingError::TotalMismatch {
                declared_cents: 5_000,
                computed_cents: 5_500,
            }
        );
    }

    /// One cent of rounding drift is tolerated.
    #[tokio::test]
    async fn test_declared_subtotal_within_tolerance() {
        let catalog = MemCatalog {
            products: vec![product("a", 5_500)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.declared_subtotal_cents = Some(5_501);

        let priced = engine(catalog, MemDiscounts::default(), MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();
        assert_eq!(priced.totals.subtotal_cents, 5_500);
    }

    /// Verification 10% capped at $50 beats an $8 fixed product rule on a
    /// $300 cart.
    #[tokio::test]
    async fn test_verification_beats_fixed_product_rule() {
        let catalog = MemCatalog {
            products: vec![product("a", 30_000)],
        };
        let mut fixed = rule("FIX8");
        fixed.kind = DiscountKind::FixedAmount;
        fixed.value = 800;
        fixed.target = DiscountTarget::Product;
        fixed.target_id = Some("a".to_string());

        let discounts = MemDiscounts {
            rules: vec![fixed],
            verifications: vec![VerificationDiscount {
                id: "v1".to_string(),
                verification_type: VerificationType::Military,
                discount_percent: 10,
                min_order_cents: 0,
                max_discount_cents: 5_000,
                is_active: true,
                valid_from: None,
                valid_to: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.verification = Some(VerificationType::Military);

        let priced = engine(catalog, discounts, MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.discount_cents, 3_000);
        assert_eq!(
            priced.totals.discount_source,
            DiscountSource::Verification {
                verification_type: VerificationType::Military
            }
        );
        // Verification never consumes rules.
        assert!(priced.consumed_rule_ids.is_empty());
    }

    #[tokio::test]
    async fn test_compute_is_deterministic() {
        let catalog = MemCatalog {
            products: vec![product("a", 12_345), product("b", 678)],
        };
        let discounts = MemDiscounts {
            rules: vec![rule("TEN")],
            verifications: vec![],
        };
        let cards = MemCards {
            cards: vec![card("GC-1", 2_000)],
        };

        let mut req = request(vec![line("a", 2), line("b", 3)], texas());
        req.gift_card_codes = vec!["GC-1".to_string()];
        req.donation_cents = 250;

        let eng = engine(catalog, discounts, cards, 825);
        let first = eng.compute(&req).await.unwrap();
        let second = eng.compute(&req).await.unwrap();
        assert_eq!(first, second);
    }

    /// Discount plus gift card can exceed what the order owes; the
    /// chargeable total floors at zero and the card is not over-debited.
    #[tokio::test]
    async fn test_total_never_negative() {
        let catalog = MemCatalog {
            products: vec![product("a", 1_000)],
        };
        let mut r = rule("ALL");
        r.value = 100; // 100% off
        let discounts = MemDiscounts {
            rules: vec![r],
            verifications: vec![],
        };
        let cards = MemCards {
            cards: vec![card("GC-BIG", 50_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.gift_card_codes = vec!["GC-BIG".to_string()];

        let priced = engine(catalog, discounts, cards, 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.total_cents, 0);
        assert_eq!(priced.totals.gift_card_applied_cents, 0);
        assert!(priced.gift_card_plan.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_promo_is_soft() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.promo_code = Some("nosuchcode".to_string());

        let priced = engine(catalog, MemDiscounts::default(), MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.discount_cents, 0);
        assert_eq!(priced.totals.total_cents, 10_000);
        assert!(matches!(
            priced.warnings.as_slice(),
            [PricingWarning::InvalidPromoCode { code, .. }] if code == "NOSUCHCODE"
        ));
    }

    #[tokio::test]
    async fn test_promo_code_normalized_before_lookup() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let mut promo = rule("SPRING25");
        promo.automatic = false;
        promo.value = 25;
        let discounts = MemDiscounts {
            rules: vec![promo],
            verifications: vec![],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.promo_code = Some("  spring25 ".to_string());

        let priced = engine(catalog, discounts, MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();
        assert_eq!(priced.totals.discount_cents, 2_500);
    }

    #[tokio::test]
    async fn test_automatic_rule_code_not_double_counted() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let discounts = MemDiscounts {
            rules: vec![rule("TEN")], // automatic
            verifications: vec![],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.promo_code = Some("TEN".to_string());

        let priced = engine(catalog, discounts, MemCards::default(), 0)
            .compute(&req)
            .await
            .unwrap();

        // Applied once, and typing the code is not an error.
        assert_eq!(priced.totals.discount_cents, 1_000);
        assert!(priced.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_tax_fallback_flags_and_warns() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let eng = PricingEngine::new(
            catalog,
            MemDiscounts::default(),
            MemCards::default(),
            TaxCalculator::new(BrokenTax, TaxFallbackPolicy::default()),
            ExchangeRateTable::new(),
            PricingConfig::default(),
        );

        let priced = eng
            .compute(&request(vec![line("a", 1)], texas()))
            .await
            .unwrap();

        assert_eq!(priced.totals.tax_cents, 0);
        assert!(priced.totals.tax_review_required);
        assert!(priced.warnings.contains(&PricingWarning::TaxFallback));
    }

    #[tokio::test]
    async fn test_taxable_state_applies_provider_rate() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let discounts = MemDiscounts {
            rules: vec![rule("TEN")],
            verifications: vec![],
        };

        let priced = engine(catalog, discounts, MemCards::default(), 825)
            .compute(&request(vec![line("a", 1)], texas()))
            .await
            .unwrap();

        // Tax on the discounted amount: $90.00 × 8.25% = $7.43.
        assert_eq!(priced.totals.discount_cents, 1_000);
        assert_eq!(priced.totals.tax_cents, 743);
        assert_eq!(priced.totals.total_cents, 9_000 + 743);
    }

    #[tokio::test]
    async fn test_gift_cards_apply_largest_first() {
        let catalog = MemCatalog {
            products: vec![product("a", 9_000)],
        };
        let cards = MemCards {
            cards: vec![card("GC-SMALL", 2_000), card("GC-LARGE", 5_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.gift_card_codes = vec!["GC-SMALL".to_string(), "GC-LARGE".to_string()];

        let priced = engine(catalog, MemDiscounts::default(), cards, 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(
            priced.gift_card_plan,
            vec![
                GiftCardApplication {
                    code: "GC-LARGE".to_string(),
                    applied_cents: 5_000,
                },
                GiftCardApplication {
                    code: "GC-SMALL".to_string(),
                    applied_cents: 2_000,
                },
            ]
        );
        assert_eq!(priced.totals.gift_card_applied_cents, 7_000);
        assert_eq!(priced.totals.total_cents, 2_000);
        assert!(priced.warnings.contains(&PricingWarning::GiftCardPartial {
            applied_cents: 7_000,
            total_cents: 9_000,
        }));
    }

    #[tokio::test]
    async fn test_unknown_gift_card_is_soft() {
        let catalog = MemCatalog {
            products: vec![product("a", 5_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.gift_card_codes = vec!["GC-GHOST".to_string()];

        let priced = engine(catalog, MemDiscounts::default(), MemCards::default(), 825)
            .compute(&req)
            .await
            .unwrap();

        assert_eq!(priced.totals.total_cents, 5_000);
        assert!(matches!(
            priced.warnings.as_slice(),
            [PricingWarning::GiftCardUnusable { code, .. }] if code == "GC-GHOST"
        ));
    }

    #[tokio::test]
    async fn test_free_shipping_threshold() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let mut config = PricingConfig::default();
        config.free_shipping_threshold_cents = Some(7_500);

        let eng = PricingEngine::new(
            catalog,
            MemDiscounts::default(),
            MemCards::default(),
            TaxCalculator::new(FlatTax(0), TaxFallbackPolicy::default()),
            ExchangeRateTable::new(),
            config,
        );

        let mut req = request(vec![line("a", 1)], oregon());
        req.shipping = Some(ShippingQuote {
            carrier: "usps".to_string(),
            service_code: "priority".to_string(),
            rate_cents: 1_299,
        });

        let priced = eng.compute(&req).await.unwrap();
        assert_eq!(priced.totals.shipping_cents, 0);
    }

    #[tokio::test]
    async fn test_free_shipping_rule_zeroes_shipping() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let mut r = rule("FREESHIP");
        r.free_shipping = true;
        let discounts = MemDiscounts {
            rules: vec![r],
            verifications: vec![],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.shipping = Some(ShippingQuote {
            carrier: "ups".to_string(),
            service_code: "ground".to_string(),
            rate_cents: 899,
        });

        let priced = engine(catalog, discounts, MemCards::default(), 0)
            .compute(&req)
            .await
            .unwrap();
        assert_eq!(priced.totals.shipping_cents, 0);
    }

    #[tokio::test]
    async fn test_donation_added_untaxed() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };

        let mut req = request(vec![line("a", 1)], texas());
        req.donation_cents = 500;

        let priced = engine(catalog, MemDiscounts::default(), MemCards::default(), 1_000)
            .compute(&req)
            .await
            .unwrap();

        // Tax is 10% of the $100 taxable amount only; donation rides on top.
        assert_eq!(priced.totals.tax_cents, 1_000);
        assert_eq!(priced.totals.total_cents, 10_000 + 1_000 + 500);
    }

    #[tokio::test]
    async fn test_display_conversion_presentation_only() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let mut rates = ExchangeRateTable::new();
        rates.set_rate(Currency::Eur, 921_000);

        let eng = PricingEngine::new(
            catalog,
            MemDiscounts::default(),
            MemCards::default(),
            TaxCalculator::new(FlatTax(0), TaxFallbackPolicy::default()),
            rates,
            PricingConfig::default(),
        );

        let mut req = request(vec![line("a", 1)], oregon());
        req.display_currency = Some(Currency::Eur);

        let priced = eng.compute(&req).await.unwrap();
        // Settlement stays in base currency.
        assert_eq!(priced.totals.currency, Currency::Usd);
        assert_eq!(priced.totals.total_cents, 10_000);
        let display = priced.totals.display.unwrap();
        assert_eq!(display.currency, Currency::Eur);
        assert_eq!(display.total_minor, 9_210);
    }

    #[tokio::test]
    async fn test_missing_display_rate_is_soft() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.display_currency = Some(Currency::Gbp);

        let priced = engine(catalog, MemDiscounts::default(), MemCards::default(), 0)
            .compute(&req)
            .await
            .unwrap();
        assert!(priced.totals.display.is_none());
        assert!(matches!(
            priced.warnings.as_slice(),
            [PricingWarning::DisplayRateUnavailable { currency }] if currency == "GBP"
        ));
    }

    #[tokio::test]
    async fn test_store_unavailable_rejects_whole_computation() {
        let eng = PricingEngine::new(
            DownCatalog,
            MemDiscounts::default(),
            MemCards::default(),
            TaxCalculator::new(FlatTax(0), TaxFallbackPolicy::default()),
            ExchangeRateTable::new(),
            PricingConfig::default(),
        );

        let err = eng
            .compute(&request(vec![line("a", 1)], oregon()))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_once_only_winner_reported_for_consumption() {
        let catalog = MemCatalog {
            products: vec![product("a", 10_000)],
        };
        let mut promo = rule("WELCOME1");
        promo.automatic = false;
        promo.once_only = true;
        let discounts = MemDiscounts {
            rules: vec![promo],
            verifications: vec![],
        };

        let mut req = request(vec![line("a", 1)], oregon());
        req.promo_code = Some("WELCOME1".to_string());

        let priced = engine(catalog, discounts, MemCards::default(), 0)
            .compute(&req)
            .await
            .unwrap();
        assert_eq!(priced.consumed_rule_ids, vec!["id-WELCOME1".to_string()]);
    }
}
