//! # Currency Display Conversion
//!
//! Multi-currency *display* support over a single settlement currency.
//!
//! ## The Two-Type Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Money (USD cents)          DisplayAmount (derived)                     │
//! │  ─────────────────          ───────────────────────                     │
//! │  • all business logic       • presentation only                         │
//! │  • all persistence          • recomputed on every render                │
//! │  • payment capture          • never an input to any calculation         │
//! │                                                                         │
//! │  Money ──ExchangeRateTable──► DisplayAmount        (one-way street)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rate table is refreshed out-of-band; a stale rate changes what the
//! shopper *sees*, never what the card is charged.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Scale factor for exchange rates: 1_000_000 micros = 1.0.
pub const RATE_SCALE: i64 = 1_000_000;

// =============================================================================
// Currency
// =============================================================================

/// Currencies the storefront can display.
///
/// `Usd` is the base currency: every threshold, discount value, and persisted
/// total is expressed in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    /// The settlement currency.
    pub const BASE: Currency = Currency::Usd;

    /// ISO 4217 code, used for persistence and wire formats.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    /// Parses an ISO 4217 code (case-insensitive).
    pub fn parse(code: &str) -> Option<Currency> {
        match code.to_ascii_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            "CAD" => Some(Currency::Cad),
            "AUD" => Some(Currency::Aud),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Display Amount
// =============================================================================

/// A presentation-only amount in a display currency.
///
/// Carries the rate that produced it so a rendered price can always be
/// traced back to the settlement amount it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAmount {
    pub currency: Currency,
    /// Amount in the display currency's minor units.
    pub amount_minor: i64,
    /// The rate (micros per 1 USD) used for the conversion.
    pub rate_micros: i64,
}

// =============================================================================
// Exchange Rate Table
// =============================================================================

/// In-memory snapshot of exchange rates, base USD.
///
/// Rates are integer micro-units to keep the conversion deterministic:
/// `921_000` means 1 USD = 0.921 units of the display currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    rates: HashMap<Currency, i64>,
}

impl ExchangeRateTable {
    /// Creates an empty table (base-currency display only).
    pub fn new() -> Self {
        ExchangeRateTable {
            rates: HashMap::new(),
        }
    }

    /// Sets or replaces the rate for a display currency.
    ///
    /// Non-positive rates are ignored; a broken refresh job must not make
    /// prices render as zero.
    pub fn set_rate(&mut self, currency: Currency, rate_micros: i64) {
        if currency == Currency::BASE || rate_micros <= 0 {
            return;
        }
        self.rates.insert(currency, rate_micros);
    }

    /// Returns the rate for a currency, if known. The base currency is
    /// always 1.0.
    pub fn rate_micros(&self, currency: Currency) -> Option<i64> {
        if currency == Currency::BASE {
            return Some(RATE_SCALE);
        }
        self.rates.get(&currency).copied()
    }

    /// Converts a settlement amount for display, half-up.
    ///
    /// Returns `None` when no rate is loaded for the currency; callers fall
    /// back to base-currency display rather than guessing.
    pub fn convert(&self, amount: Money, currency: Currency) -> Option<DisplayAmount> {
        let rate_micros = self.rate_micros(currency)?;
        let minor =
            (amount.cents() as i128 * rate_micros as i128 + (RATE_SCALE as i128 / 2)) / RATE_SCALE as i128;
        Some(DisplayAmount {
            currency,
            amount_minor: minor as i64,
            rate_micros,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_currency_is_identity() {
        let table = ExchangeRateTable::new();
        let converted = table.convert(Money::from_cents(1234), Currency::Usd).unwrap();
        assert_eq!(converted.amount_minor, 1234);
        assert_eq!(converted.rate_micros, RATE_SCALE);
    }

    #[test]
    fn test_convert_half_up() {
        let mut table = ExchangeRateTable::new();
        table.set_rate(Currency::Eur, 921_000); // 1 USD = 0.921 EUR

        // $10.00 → 921.0 euro-cents → 921
        let converted = table.convert(Money::from_cents(1000), Currency::Eur).unwrap();
        assert_eq!(converted.amount_minor, 921);

        // $0.05 → 4.605 euro-cents → 5 (half-up)
        let converted = table.convert(Money::from_cents(5), Currency::Eur).unwrap();
        assert_eq!(converted.amount_minor, 5);
    }

    #[test]
    fn test_missing_rate_is_none() {
        let table = ExchangeRateTable::new();
        assert!(table.convert(Money::from_cents(1000), Currency::Gbp).is_none());
    }

    #[test]
    fn test_non_positive_rate_ignored() {
        let mut table = ExchangeRateTable::new();
        table.set_rate(Currency::Eur, 0);
        table.set_rate(Currency::Gbp, -5);
        assert!(table.rate_micros(Currency::Eur).is_none());
        assert!(table.rate_micros(Currency::Gbp).is_none());
    }

    #[test]
    fn test_base_rate_cannot_be_overridden() {
        let mut table = ExchangeRateTable::new();
        table.set_rate(Currency::Usd, 2_000_000);
        assert_eq!(table.rate_micros(Currency::Usd), Some(RATE_SCALE));
    }

    #[test]
    fn test_currency_codes_round_trip() {
        for c in [
            Currency::Usd,
            Currency::Eur,
            Currency::Gbp,
            Currency::Cad,
            Currency::Aud,
        ] {
            assert_eq!(Currency::parse(c.code()), Some(c));
        }
        assert_eq!(Currency::parse("usd"), Some(Currency::Usd));
        assert_eq!(Currency::parse("XYZ"), None);
    }
}
