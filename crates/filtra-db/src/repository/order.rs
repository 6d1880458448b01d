//! # Checkout Repository
//!
//! The atomic checkout commit and the write-once totals snapshot.
//!
//! ## One Transaction, Three Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     CheckoutRepository::commit                          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    1. once-only rules:  UPDATE ... SET status='used'                   │
//! │                         WHERE id=? AND status='active'                 │
//! │                         0 rows → ROLLBACK, ConcurrentModification      │
//! │    2. gift cards:       UPDATE ... SET balance = balance - applied     │
//! │                         WHERE code=? AND balance >= applied            │
//! │                         0 rows → ROLLBACK, ConcurrentModification      │
//! │    3. totals snapshot:  INSERT INTO order_totals ...                   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  All or nothing: a failed transaction consumes no rule, debits no      │
//! │  card, writes no snapshot. The caller re-prices and retries the        │
//! │  whole request, never a sub-step.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The snapshot row is never updated. Refunds and corrections are separate
//! adjustment records that reference `order_id`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use filtra_core::{Currency, DiscountSource, DisplayTotals, OrderTotals};
use filtra_pricing::PricedOrder;

/// A persisted totals snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub totals: OrderTotals,
    pub created_at: DateTime<Utc>,
}

/// Raw `order_totals` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TotalsRow {
    order_id: String,
    subtotal_cents: i64,
    discount_cents: i64,
    discount_source: String,
    shipping_cents: i64,
    tax_cents: i64,
    tax_rate_bps: i64,
    tax_review_required: bool,
    donation_cents: i64,
    gift_card_applied_cents: i64,
    total_cents: i64,
    currency: String,
    display: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TotalsRow> for OrderSnapshot {
    type Error = DbError;

    fn try_from(row: TotalsRow) -> DbResult<OrderSnapshot> {
        let discount_source: DiscountSource = serde_json::from_str(&row.discount_source)
            .map_err(|e| DbError::invalid("OrderTotals", format!("discount_source: {}", e)))?;
        let display: Option<DisplayTotals> = row
            .display
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DbError::invalid("OrderTotals", format!("display: {}", e)))?;
        let currency = Currency::parse(&row.currency)
            .ok_or_else(|| DbError::invalid("OrderTotals", format!("currency '{}'", row.currency)))?;

        Ok(OrderSnapshot {
            order_id: row.order_id,
            totals: OrderTotals {
                subtotal_cents: row.subtotal_cents,
                discount_cents: row.discount_cents,
                discount_source,
                shipping_cents: row.shipping_cents,
                tax_cents: row.tax_cents,
                tax_rate_bps: row.tax_rate_bps as u32,
                tax_review_required: row.tax_review_required,
                donation_cents: row.donation_cents,
                gift_card_applied_cents: row.gift_card_applied_cents,
                total_cents: row.total_cents,
                currency,
                display,
            },
            created_at: row.created_at,
        })
    }
}

/// Repository for the checkout commit and snapshot reads.
#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    pool: SqlitePool,
}

impl CheckoutRepository {
    /// Creates a new CheckoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutRepository { pool }
    }

    /// Commits a priced order: consumes once-only rules, debits gift
    /// cards, and writes the totals snapshot - atomically.
    ///
    /// Every state change is conditioned on what the pricing computation
    /// saw, so a checkout that raced and lost returns
    /// [`DbError::ConcurrentModification`] with nothing applied.
    pub async fn commit(&self, priced: &PricedOrder) -> DbResult<OrderSnapshot> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for rule_id in &priced.consumed_rule_ids {
            let result = sqlx::query(
                r#"
                UPDATE discount_rules
                SET status = 'used', version = version + 1, updated_at = ?1
                WHERE id = ?2 AND status = 'active'
                "#,
            )
            .bind(now)
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Another checkout consumed it first; the drop of `tx`
                // rolls everything back.
                return Err(DbError::concurrent("DiscountRule", rule_id.clone()));
            }
            debug!(rule_id = %rule_id, "Once-only rule consumed");
        }

        for application in &priced.gift_card_plan {
            let result = sqlx::query(
                r#"
                UPDATE gift_cards
                SET balance_cents = balance_cents - ?1,
                    version = version + 1,
                    updated_at = ?2
                WHERE code = ?3 AND balance_cents >= ?1
                "#,
            )
            .bind(application.applied_cents)
            .bind(now)
            .bind(&application.code)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::concurrent("GiftCard", application.code.clone()));
            }
            debug!(code = %application.code, applied = application.applied_cents, "Gift card debited");
        }

        let totals = &priced.totals;
        let order_id = Uuid::new_v4().to_string();
        let discount_source = serde_json::to_string(&totals.discount_source)
            .map_err(|e| DbError::invalid("OrderTotals", e.to_string()))?;
        let display = totals
            .display
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::invalid("OrderTotals", e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO order_totals (
                order_id, subtotal_cents, discount_cents, discount_source,
                shipping_cents, tax_cents, tax_rate_bps, tax_review_required,
                donation_cents, gift_card_applied_cents, total_cents,
                currency, display, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&order_id)
        .bind(totals.subtotal_cents)
        .bind(totals.discount_cents)
        .bind(&discount_source)
        .bind(totals.shipping_cents)
        .bind(totals.tax_cents)
        .bind(totals.tax_rate_bps as i64)
        .bind(totals.tax_review_required)
        .bind(totals.donation_cents)
        .bind(totals.gift_card_applied_cents)
        .bind(totals.total_cents)
        .bind(totals.currency.code())
        .bind(&display)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            total = totals.total_cents,
            consumed_rules = priced.consumed_rule_ids.len(),
            gift_cards = priced.gift_card_plan.len(),
            "Checkout committed"
        );

        Ok(OrderSnapshot {
            order_id,
            totals: totals.clone(),
            created_at: now,
        })
    }

    /// Reads a snapshot back, e.g. for receipts and adjustments.
    pub async fn fetch(&self, order_id: &str) -> DbResult<Option<OrderSnapshot>> {
        let row: Option<TotalsRow> = sqlx::query_as(
            r#"
            SELECT order_id, subtotal_cents, discount_cents, discount_source,
                   shipping_cents, tax_cents, tax_rate_bps, tax_review_required,
                   donation_cents, gift_card_applied_cents, total_cents,
                   currency, display, created_at
            FROM order_totals
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderSnapshot::try_from).transpose()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use filtra_core::{
        CatalogProduct, Destination, DiscountKind, DiscountRule, DiscountStatus, DiscountTarget,
        ExchangeRateTable, Money, PricingConfig, PricingRequest, PricingWarning, ProductType,
        RequestLine, TaxQuote,
    };
    use filtra_pricing::{
        PricingEngine, TaxCalculator, TaxFallbackPolicy, TaxProvider, TaxProviderError,
    };

    /// No-op provider; tests steer tax through exempt destinations anyway.
    struct ZeroTax;

    impl TaxProvider for ZeroTax {
        async fn tax_for_order(
            &self,
            _destination: &Destination,
            _taxable: Money,
            _shipping: Money,
        ) -> Result<TaxQuote, TaxProviderError> {
            Ok(TaxQuote::zero())
        }
    }

    type Engine = PricingEngine<
        crate::repository::catalog::ProductRepository,
        crate::repository::discount::DiscountRuleRepository,
        crate::repository::gift_card::GiftCardRepository,
        ZeroTax,
    >;

    fn engine(db: &Database) -> Engine {
        PricingEngine::new(
            db.products(),
            db.discounts(),
            db.gift_cards(),
            TaxCalculator::new(ZeroTax, TaxFallbackPolicy::default()),
            ExchangeRateTable::new(),
            PricingConfig::default(),
        )
    }

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

    fn once_only_promo(code: &str) -> DiscountRule {
        DiscountRule {
            id: format!("id-{}", code),
            code: code.to_string(),
            kind: DiscountKind::Percentage,
            value: 20,
            target: DiscountTarget::Global,
            target_id: None,
            cart_min_cents: 0,
            cart_max_cents: i64::MAX,
            valid_from: None,
            valid_to: None,
            status: DiscountStatus::Active,
            automatic: false,
            once_only: true,
            compoundable: false,
            free_shipping: false,
            multiply_by_qty: false,
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

    fn request(product_id: &str) -> PricingRequest {
        PricingRequest {
            lines: vec![RequestLine {
                product_id: product_id.to_string(),
                quantity: 1,
            }],
            declared_subtotal_cents: None,
            destination: oregon(),
            promo_code: None,
            verification: None,
            gift_card_codes: vec![],
            donation_cents: 0,
            shipping: None,
            display_currency: None,
        }
    }

    #[tokio::test]
    async fn test_commit_writes_snapshot_and_consumes_plan() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&product("p1", 10_000)).await.unwrap();
        db.discounts()
            .create(&once_only_promo("WELCOME1"))
            .await
            .unwrap();
        db.gift_cards().create("GC-PAY", 3_000).await.unwrap();

        let mut req = request("p1");
        req.promo_code = Some("WELCOME1".to_string());
        req.gift_card_codes = vec!["GC-PAY".to_string()];

        let priced = engine(&db).compute(&req).await.unwrap();
        // 20% off $100 = $20 discount; $80 total; card covers $30.
        assert_eq!(priced.totals.discount_cents, 2_000);
        assert_eq!(priced.totals.gift_card_applied_cents, 3_000);
        assert_eq!(priced.totals.total_cents, 5_000);

        let snapshot = db.checkout().commit(&priced).await.unwrap();

        // Snapshot reads back exactly as computed.
        let fetched = db.checkout().fetch(&snapshot.order_id).await.unwrap().unwrap();
        assert_eq!(fetched.totals, priced.totals);

        // The once-only rule is consumed.
        let rule = db.discounts().get_by_code("WELCOME1").await.unwrap().unwrap();
        assert_eq!(rule.status, DiscountStatus::Used);

        // The card is debited by exactly what was applied.
        let card = db.gift_cards().get_by_code("GC-PAY").await.unwrap().unwrap();
        assert_eq!(card.balance_cents, 0);
    }

    #[tokio::test]
    async fn test_once_only_race_has_exactly_one_winner() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&product("p1", 10_000)).await.unwrap();
        db.discounts()
            .create(&once_only_promo("LAUNCH"))
            .await
            .unwrap();

        let mut req = request("p1");
        req.promo_code = Some("LAUNCH".to_string());

        // Two checkouts price the same state before either commits.
        let eng = engine(&db);
        let first = eng.compute(&req).await.unwrap();
        let second = eng.compute(&req).await.unwrap();
        assert_eq!(first.consumed_rule_ids, second.consumed_rule_ids);

        db.checkout().commit(&first).await.unwrap();
        let err = db.checkout().commit(&second).await.unwrap_err();
        assert!(matches!(err, DbError::ConcurrentModification { .. }));

        // A re-priced request now sees the consumed code as a soft reject.
        let repriced = eng.compute(&req).await.unwrap();
        assert_eq!(repriced.totals.discount_cents, 0);
        assert!(matches!(
            repriced.warnings.as_slice(),
            [PricingWarning::InvalidPromoCode { reason, .. }]
                if reason == "code has already been used"
        ));
    }

    #[tokio::test]
    async fn test_gift_card_race_rolls_back_loser() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&product("p1", 4_000)).await.unwrap();
        db.gift_cards().create("GC-RACE", 6_000).await.unwrap();

        let mut req = request("p1");
        req.gift_card_codes = vec!["GC-RACE".to_string()];

        let eng = engine(&db);
        let first = eng.compute(&req).await.unwrap();
        let second = eng.compute(&req).await.unwrap();

        db.checkout().commit(&first).await.unwrap();
        // $2000 left on the card; the stale $4000 debit must lose.
        let err = db.checkout().commit(&second).await.unwrap_err();
        assert!(matches!(err, DbError::ConcurrentModification { .. }));

        // Loser's transaction left no partial state behind.
        let card = db.gift_cards().get_by_code("GC-RACE").await.unwrap().unwrap();
        assert_eq!(card.balance_cents, 2_000);
    }

    #[tokio::test]
    async fn test_commit_without_plan_is_plain_insert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&product("p1", 2_500)).await.unwrap();

        let priced = engine(&db).compute(&request("p1")).await.unwrap();
        let snapshot = db.checkout().commit(&priced).await.unwrap();

        assert_eq!(snapshot.totals.total_cents, 2_500);
        assert!(db.checkout().fetch(&snapshot.order_id).await.unwrap().is_some());
        assert!(db.checkout().fetch("no-such-order").await.unwrap().is_none());
    }

    /// Preview and capture are the same computation: two computes over
    /// unchanged state price identically, and the committed snapshot is
    /// the preview the shopper saw.
    #[tokio::test]
    async fn test_preview_equals_capture() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().create(&product("p1", 12_345)).await.unwrap();
        db.discounts()
            .create(&{
                let mut r = once_only_promo("AUTO10");
                r.automatic = true;
                r.once_only = false;
                r.value = 10;
                r
            })
            .await
            .unwrap();

        let eng = engine(&db);
        let preview = eng.compute(&request("p1")).await.unwrap();
        let capture = eng.compute(&request("p1")).await.unwrap();
        assert_eq!(preview, capture);

        let snapshot = db.checkout().commit(&capture).await.unwrap();
        assert_eq!(snapshot.totals, preview.totals);
    }
}
