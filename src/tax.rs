//! Tax-rate resolution for invoice and bill lines

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::{round2, TaxCode, TaxRate};

impl TaxCode {
    /// The rate effective on `date`: the most recent rate with
    /// `effective_from <= date` whose `effective_to` is absent or not yet
    /// passed. Returns `None` when no rate applies.
    pub fn effective_rate(&self, date: NaiveDate) -> Option<&TaxRate> {
        self.rates
            .iter()
            .filter(|r| {
                r.effective_from <= date && r.effective_to.map_or(true, |to| to >= date)
            })
            .max_by_key(|r| r.effective_from)
    }
}

/// Tax on a base amount at a percentage rate, rounded to cents.
pub fn line_tax(base: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    round2(&(base * rate / BigDecimal::from(100)))
}
