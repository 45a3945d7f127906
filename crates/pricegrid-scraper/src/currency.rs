//! Currency conversion over a configurable rate table.
//!
//! Rates are expressed as units of a currency per 1 USD; USD is the pivot
//! for every conversion. Conversion never fails: an unusable rate degrades
//! to a logged pass-through of the original amount.

use std::collections::HashMap;

use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct CurrencyTable {
    /// `code -> units per 1 USD`.
    rates: HashMap<String, Decimal>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        let rates = HashMap::from([
            ("USD".to_owned(), Decimal::ONE),
            ("EUR".to_owned(), Decimal::new(85, 2)),
            ("GBP".to_owned(), Decimal::new(73, 2)),
            ("JPY".to_owned(), Decimal::new(110, 0)),
            ("CAD".to_owned(), Decimal::new(125, 2)),
            ("AUD".to_owned(), Decimal::new(135, 2)),
            ("CHF".to_owned(), Decimal::new(92, 2)),
            ("CNY".to_owned(), Decimal::new(645, 2)),
            ("INR".to_owned(), Decimal::new(74, 0)),
        ]);
        Self { rates }
    }
}

impl CurrencyTable {
    #[must_use]
    pub fn from_rates<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (String, Decimal)>,
    {
        Self {
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_uppercase(), rate))
                .collect(),
        }
    }

    #[must_use]
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(&code.to_uppercase()).copied()
    }

    pub fn set_rate(&mut self, code: &str, rate: Decimal) {
        self.rates.insert(code.to_uppercase(), rate);
    }

    /// Converts `amount` from `from` to `to` through the USD pivot, rounded
    /// to 2 decimal places.
    ///
    /// A missing or zero rate on either side makes the conversion a no-op:
    /// the amount is returned unchanged and a warning is logged.
    #[must_use]
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        if from.eq_ignore_ascii_case(to) {
            return amount;
        }

        let Some(from_rate) = self.rate(from).filter(|rate| !rate.is_zero()) else {
            tracing::warn!(currency = from, "no usable rate for source currency; amount passed through");
            return amount;
        };
        let Some(to_rate) = self.rate(to).filter(|rate| !rate.is_zero()) else {
            tracing::warn!(currency = to, "no usable rate for target currency; amount passed through");
            return amount;
        };

        ((amount / from_rate) * to_rate).round_dp(2)
    }
}
