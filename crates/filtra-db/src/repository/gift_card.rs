//! # Gift Card Repository
//!
//! Balance reads and the version-checked redemption ledger.
//!
//! ## Double-Spend Defense
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two checkouts race for one $20 card:                                   │
//! │                                                                         │
//! │  A: read balance=2000, version=4                                       │
//! │  B: read balance=2000, version=4                                       │
//! │  A: UPDATE ... WHERE code=? AND version=4   → 1 row   ✅ applied       │
//! │  B: UPDATE ... WHERE code=? AND version=4   → 0 rows  ↻ re-read        │
//! │  B: read balance=0, version=5 → nothing left to apply                  │
//! │                                                                         │
//! │  Retries are bounded; a hot card surfaces ConcurrentModification       │
//! │  instead of spinning.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::error::{to_store_error, DbError, DbResult};
use filtra_core::validation::normalize_code;
use filtra_core::{GiftCard, Money};
use filtra_pricing::{GiftCardStore, StoreError};

/// Raw `gift_cards` row; shaped exactly like the domain type.
#[derive(Debug, Clone, sqlx::FromRow)]
struct GiftCardRow {
    code: String,
    balance_cents: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GiftCardRow> for GiftCard {
    fn from(row: GiftCardRow) -> GiftCard {
        GiftCard {
            code: row.code,
            balance_cents: row.balance_cents,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The outcome of one redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    /// What was actually debited; `min(balance, requested)`, never more.
    pub applied_cents: i64,
    /// Balance left on the card after the debit.
    pub remaining_balance_cents: i64,
}

const SELECT_COLUMNS: &str = "code, balance_cents, version, created_at, updated_at";

/// Repository for gift-card operations.
#[derive(Debug, Clone)]
pub struct GiftCardRepository {
    pool: SqlitePool,
}

impl GiftCardRepository {
    /// Creates a new GiftCardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GiftCardRepository { pool }
    }

    /// Issues a card. Codes are stored uppercase.
    pub async fn create(&self, code: &str, balance_cents: i64) -> DbResult<GiftCard> {
        if balance_cents < 0 {
            return Err(DbError::invalid("GiftCard", "negative balance"));
        }
        let code = normalize_code(code);
        let now = Utc::now();
        debug!(code = %code, balance = balance_cents, "Issuing gift card");

        sqlx::query(
            r#"
            INSERT INTO gift_cards (code, balance_cents, version, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?3)
            "#,
        )
        .bind(&code)
        .bind(balance_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(GiftCard {
            code,
            balance_cents,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a card by code (normalized).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<GiftCard>> {
        let code = normalize_code(code);
        let row: Option<GiftCardRow> = sqlx::query_as(&format!(
            "SELECT {} FROM gift_cards WHERE code = ?1",
            SELECT_COLUMNS
        ))
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(GiftCard::from))
    }

    /// Gets the cards that exist among `codes`, in one query.
    pub async fn get_by_codes(&self, codes: &[String]) -> DbResult<Vec<GiftCard>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM gift_cards WHERE code IN (",
            SELECT_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for code in codes {
            separated.push_bind(code);
        }
        qb.push(")");

        let rows: Vec<GiftCardRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(GiftCard::from).collect())
    }

    /// Redeems up to `requested` from a card: read balance, compute
    /// `applied = min(balance, requested)`, write the new balance - all
    /// conditioned on the version read.
    ///
    /// A lost race re-reads and retries the whole read-then-decide step,
    /// at most `max_retries` times, then surfaces the conflict.
    pub async fn redeem(
        &self,
        code: &str,
        requested: Money,
        max_retries: u32,
    ) -> DbResult<Redemption> {
        let code = normalize_code(code);
        if requested.is_negative() {
            return Err(DbError::invalid("GiftCard", "negative redemption amount"));
        }

        for attempt in 0..=max_retries {
            let card = self
                .get_by_code(&code)
                .await?
                .ok_or_else(|| DbError::not_found("GiftCard", &code))?;

            let applied = card.balance().min(requested);
            if !applied.is_positive() {
                // Nothing left (or nothing requested); no write needed.
                return Ok(Redemption {
                    applied_cents: 0,
                    remaining_balance_cents: card.balance_cents,
                });
            }

            let result = sqlx::query(
                r#"
                UPDATE gift_cards
                SET balance_cents = balance_cents - ?1,
                    version = version + 1,
                    updated_at = ?2
                WHERE code = ?3 AND version = ?4
                "#,
            )
            .bind(applied.cents())
            .bind(Utc::now())
            .bind(&code)
            .bind(card.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                debug!(code = %code, applied = applied.cents(), "Gift card redeemed");
                return Ok(Redemption {
                    applied_cents: applied.cents(),
                    remaining_balance_cents: card.balance_cents - applied.cents(),
                });
            }

            warn!(code = %code, attempt, "Gift card redemption lost a race, retrying");
        }

        Err(DbError::concurrent("GiftCard", code))
    }
}

impl GiftCardStore for GiftCardRepository {
    async fn cards_by_codes(&self, codes: &[String]) -> Result<Vec<GiftCard>, StoreError> {
        self.get_by_codes(codes).await.map_err(to_store_error)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
