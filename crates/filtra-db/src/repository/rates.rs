//! # Exchange Rate Repository
//!
//! Persistence for the display-currency rate table.
//!
//! The rate refresh job upserts rows out-of-band; the storefront loads a
//! snapshot per engine construction. Settlement never reads this table.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use filtra_core::{Currency, ExchangeRateTable};

/// Repository for exchange-rate operations.
#[derive(Debug, Clone)]
pub struct ExchangeRateRepository {
    pool: SqlitePool,
}

impl ExchangeRateRepository {
    /// Creates a new ExchangeRateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExchangeRateRepository { pool }
    }

    /// Inserts or replaces the rate for one display currency.
    pub async fn upsert(&self, currency: Currency, rate_micros: i64) -> DbResult<()> {
        if currency == Currency::BASE {
            return Err(DbError::invalid("ExchangeRate", "base currency has no rate"));
        }
        if rate_micros <= 0 {
            return Err(DbError::invalid("ExchangeRate", "rate must be positive"));
        }

        debug!(currency = currency.code(), rate_micros, "Upserting exchange rate");

        sqlx::query(
            r#"
            INSERT INTO exchange_rates (currency, rate_micros, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (currency) DO UPDATE SET
                rate_micros = excluded.rate_micros,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(currency.code())
        .bind(rate_micros)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads the full table. Rows with codes this build does not know are
    /// skipped rather than failing the load.
    pub async fn load(&self) -> DbResult<ExchangeRateTable> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT currency, rate_micros FROM exchange_rates")
                .fetch_all(&self.pool)
                .await?;

        let mut table = ExchangeRateTable::new();
        for (code, rate_micros) in rows {
            if let Some(currency) = Currency::parse(&code) {
                table.set_rate(currency, rate_micros);
            }
        }
        Ok(table)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
