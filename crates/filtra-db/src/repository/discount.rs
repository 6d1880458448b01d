//! # Discount Repository
//!
//! Database operations for discount rules and verification discounts.
//!
//! ## Shared Mutable State
//! `discount_rules.status` is shared across concurrent checkouts: two
//! shoppers can race for the last use of a `once_only` code. All status
//! flips happen through conditioned updates (`WHERE ... AND status =
//! 'active'`) inside the checkout commit transaction, so exactly one
//! racer wins and the loser sees a concurrent-modification error.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{to_store_error, DbError, DbResult};
use filtra_core::validation::normalize_code;
use filtra_core::{
    DiscountKind, DiscountRule, DiscountStatus, DiscountTarget, VerificationDiscount,
    VerificationType,
};
use filtra_pricing::{DiscountStore, StoreError};

/// Raw `discount_rules` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RuleRow {
    id: String,
    code: String,
    kind: String,
    value: i64,
    target: String,
    target_id: Option<String>,
    cart_min_cents: i64,
    cart_max_cents: i64,
    valid_from: Option<NaiveDate>,
    valid_to: Option<NaiveDate>,
    status: String,
    automatic: bool,
    once_only: bool,
    compoundable: bool,
    free_shipping: bool,
    multiply_by_qty: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for DiscountRule {
    type Error = DbError;

    fn try_from(row: RuleRow) -> DbResult<DiscountRule> {
        let kind = DiscountKind::parse(&row.kind)
            .ok_or_else(|| DbError::invalid("DiscountRule", format!("kind '{}'", row.kind)))?;
        let target = DiscountTarget::parse(&row.target)
            .ok_or_else(|| DbError::invalid("DiscountRule", format!("target '{}'", row.target)))?;
        let status = DiscountStatus::parse(&row.status)
            .ok_or_else(|| DbError::invalid("DiscountRule", format!("status '{}'", row.status)))?;

        Ok(DiscountRule {
            id: row.id,
            code: row.code,
            kind,
            value: row.value,
            target,
            target_id: row.target_id,
            cart_min_cents: row.cart_min_cents,
            cart_max_cents: row.cart_max_cents,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            status,
            automatic: row.automatic,
            once_only: row.once_only,
            compoundable: row.compoundable,
            free_shipping: row.free_shipping,
            multiply_by_qty: row.multiply_by_qty,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Raw `verification_discounts` row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct VerificationRow {
    id: String,
    verification_type: String,
    discount_percent: i64,
    min_order_cents: i64,
    max_discount_cents: i64,
    is_active: bool,
    valid_from: Option<NaiveDate>,
    valid_to: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VerificationRow> for VerificationDiscount {
    type Error = DbError;

    fn try_from(row: VerificationRow) -> DbResult<VerificationDiscount> {
        let verification_type = VerificationType::parse(&row.verification_type).ok_or_else(|| {
            DbError::invalid(
                "VerificationDiscount",
                format!("verification type '{}'", row.verification_type),
            )
        })?;

        Ok(VerificationDiscount {
            id: row.id,
            verification_type,
            discount_percent: row.discount_percent,
            min_order_cents: row.min_order_cents,
            max_discount_cents: row.max_discount_cents,
            is_active: row.is_active,
            valid_from: row.valid_from,
            valid_to: row.valid_to,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const RULE_COLUMNS: &str = "id, code, kind, value, target, target_id, cart_min_cents, \
     cart_max_cents, valid_from, valid_to, status, automatic, once_only, compoundable, \
     free_shipping, multiply_by_qty, version, created_at, updated_at";

const VERIFICATION_COLUMNS: &str = "id, verification_type, discount_percent, min_order_cents, \
     max_discount_cents, is_active, valid_from, valid_to, created_at, updated_at";

/// Repository for discount-rule and verification-discount operations.
#[derive(Debug, Clone)]
pub struct DiscountRuleRepository {
    pool: SqlitePool,
}

impl DiscountRuleRepository {
    /// Creates a new DiscountRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRuleRepository { pool }
    }

    /// Inserts a rule after checking its invariants. The code is stored
    /// uppercase so lookups are case-insensitive by construction.
    pub async fn create(&self, rule: &DiscountRule) -> DbResult<()> {
        rule.validate()
            .map_err(|v| DbError::invalid("DiscountRule", v.to_string()))?;

        let code = normalize_code(&rule.code);
        debug!(id = %rule.id, code = %code, "Inserting discount rule");

        sqlx::query(
            r#"
            INSERT INTO discount_rules (
                id, code, kind, value, target, target_id,
                cart_min_cents, cart_max_cents, valid_from, valid_to,
                status, automatic, once_only, compoundable, free_shipping,
                multiply_by_qty, version, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&rule.id)
        .bind(&code)
        .bind(rule.kind.as_str())
        .bind(rule.value)
        .bind(rule.target.as_str())
        .bind(&rule.target_id)
        .bind(rule.cart_min_cents)
        .bind(rule.cart_max_cents)
        .bind(rule.valid_from)
        .bind(rule.valid_to)
        .bind(rule.status.as_str())
        .bind(rule.automatic)
        .bind(rule.once_only)
        .bind(rule.compoundable)
        .bind(rule.free_shipping)
        .bind(rule.multiply_by_qty)
        .bind(rule.version)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Looks up one rule by code, any status. Input is normalized, so
    /// `spring25` finds `SPRING25`.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<DiscountRule>> {
        let code = normalize_code(code);
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM discount_rules WHERE code = ?1",
            RULE_COLUMNS
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DiscountRule::try_from).transpose()
    }

    /// Every active rule that applies without a code.
    pub async fn list_active_automatic(&self) -> DbResult<Vec<DiscountRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM discount_rules WHERE status = 'active' AND automatic = 1 ORDER BY code",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DiscountRule::try_from).collect()
    }

    /// Lists every rule, for the admin console.
    pub async fn list(&self) -> DbResult<Vec<DiscountRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM discount_rules ORDER BY code",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DiscountRule::try_from).collect()
    }

    /// Admin status flip (activate/deactivate). Version-checked so stale
    /// admin screens cannot clobber each other.
    pub async fn set_status(
        &self,
        id: &str,
        expected_version: i64,
        status: DiscountStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE discount_rules
            SET status = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("DiscountRule", id));
        }
        Ok(())
    }

    /// Inserts or replaces the discount for one verification program.
    pub async fn upsert_verification(&self, vd: &VerificationDiscount) -> DbResult<()> {
        debug!(verification_type = vd.verification_type.as_str(), "Upserting verification discount");

        sqlx::query(
            r#"
            INSERT INTO verification_discounts (
                id, verification_type, discount_percent, min_order_cents,
                max_discount_cents, is_active, valid_from, valid_to,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (verification_type) DO UPDATE SET
                discount_percent = excluded.discount_percent,
                min_order_cents = excluded.min_order_cents,
                max_discount_cents = excluded.max_discount_cents,
                is_active = excluded.is_active,
                valid_from = excluded.valid_from,
                valid_to = excluded.valid_to,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&vd.id)
        .bind(vd.verification_type.as_str())
        .bind(vd.discount_percent)
        .bind(vd.min_order_cents)
        .bind(vd.max_discount_cents)
        .bind(vd.is_active)
        .bind(vd.valid_from)
        .bind(vd.valid_to)
        .bind(vd.created_at)
        .bind(vd.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The configured discount for one verification program, if any.
    pub async fn verification_by_type(
        &self,
        verification_type: VerificationType,
    ) -> DbResult<Option<VerificationDiscount>> {
        let row: Option<VerificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM verification_discounts WHERE verification_type = ?1",
            VERIFICATION_COLUMNS
        ))
        .bind(verification_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(VerificationDiscount::try_from).transpose()
    }
}

impl DiscountStore for DiscountRuleRepository {
    async fn active_automatic_rules(&self) -> Result<Vec<DiscountRule>, StoreError> {
        self.list_active_automatic().await.map_err(to_store_error)
    }

    async fn rule_by_code(&self, code: &str) -> Result<Option<DiscountRule>, StoreError> {
        self.get_by_code(code).await.map_err(to_store_error)
    }

    async fn verification_discount(
        &self,
        verification_type: VerificationType,
    ) -> Result<Option<VerificationDiscount>, StoreError> {
        self.verification_by_type(verification_type)
            .await
            .map_err(to_store_error)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
