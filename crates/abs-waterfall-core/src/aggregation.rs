//! Annual roll-up of the monthly ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::deal::DealParameters;
use crate::simulation::{CashflowVectors, Tranche};
use crate::time_value::{self, Periodicity};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::waterfall::MonthlyRecord;

/// Twelve (or fewer, for a trailing partial year) ledger months summed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualSummary {
    /// Year index (1-indexed).
    pub year: u32,
    /// Number of ledger months in this bucket.
    pub months: u32,
    pub senior_interest: Money,
    pub senior_principal: Money,
    pub mezzanine_interest: Money,
    pub mezzanine_principal: Money,
    pub equity_cash: Money,
}

impl AnnualSummary {
    pub fn senior_cash_flow(&self) -> Money {
        self.senior_interest + self.senior_principal
    }

    pub fn mezzanine_cash_flow(&self) -> Money {
        self.mezzanine_interest + self.mezzanine_principal
    }

    pub fn cash_flow(&self, tranche: Tranche) -> Money {
        match tranche {
            Tranche::Senior => self.senior_cash_flow(),
            Tranche::Mezzanine => self.mezzanine_cash_flow(),
            Tranche::Equity => self.equity_cash,
        }
    }

    fn add(&mut self, record: &MonthlyRecord) {
        self.months += 1;
        self.senior_interest += record.senior_interest;
        self.senior_principal += record.senior_principal;
        self.mezzanine_interest += record.mezzanine_interest;
        self.mezzanine_principal += record.mezzanine_principal;
        self.equity_cash += record.equity_cash;
    }
}

/// Group the ledger into consecutive 12-month buckets in month order.
pub fn aggregate_annual(ledger: &[MonthlyRecord]) -> Vec<AnnualSummary> {
    ledger
        .chunks(12)
        .enumerate()
        .map(|(i, months)| {
            let mut summary = AnnualSummary {
                year: i as u32 + 1,
                ..AnnualSummary::default()
            };
            months.iter().for_each(|r| summary.add(r));
            summary
        })
        .collect()
}

/// Annual summaries plus IRRs computed on yearly cash flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnualView {
    pub years: Vec<AnnualSummary>,
    pub cash_flows: CashflowVectors,
    pub senior_irr: Option<Rate>,
    pub mezzanine_irr: Option<Rate>,
    pub equity_irr: Option<Rate>,
}

/// Yearly cash-flow vectors: initial outlay followed by one entry per year.
pub fn annual_cash_flows(deal: &DealParameters, years: &[AnnualSummary]) -> CashflowVectors {
    let build = |tranche: Tranche| -> Vec<Money> {
        std::iter::once(-tranche.size(deal))
            .chain(years.iter().map(|y| y.cash_flow(tranche)))
            .collect()
    };
    CashflowVectors {
        senior: build(Tranche::Senior),
        mezzanine: build(Tranche::Mezzanine),
        equity: build(Tranche::Equity),
    }
}

/// Annual reporting view of a completed ledger.
///
/// IRRs here treat each year's distributions as a single year-end payment,
/// so they sit slightly below the monthly-compounded figures.
pub fn annual_view(
    deal: &DealParameters,
    ledger: &[MonthlyRecord],
) -> ComputationOutput<AnnualView> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let years = aggregate_annual(ledger);
    if years.last().is_some_and(|y| y.months < 12) {
        warnings.push("Final year is a partial year".to_string());
    }

    let cash_flows = annual_cash_flows(deal, &years);
    let mut irrs = [None; 3];
    for (slot, tranche) in irrs.iter_mut().zip(Tranche::ALL) {
        *slot = time_value::irr(cash_flows.get(tranche), Periodicity::Annual);
        if slot.is_none() {
            warnings.push(format!("{} annual IRR undefined", tranche.label()));
        }
    }
    let [senior_irr, mezzanine_irr, equity_irr] = irrs;

    let output = AnnualView {
        years,
        cash_flows,
        senior_irr,
        mezzanine_irr,
        equity_irr,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Annual roll-up of monthly waterfall ledger; IRR on year-end cash flows",
        &serde_json::json!({ "months": ledger.len() }),
        warnings,
        elapsed,
        output,
    )
}

/// Sum of one category across a slice of summaries.
pub fn total<F>(years: &[AnnualSummary], category: F) -> Money
where
    F: Fn(&AnnualSummary) -> Money,
{
    years.iter().map(category).fold(Decimal::ZERO, |acc, v| acc + v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn record(month: u32, amount: Decimal) -> MonthlyRecord {
        MonthlyRecord {
            month,
            interest_income: amount,
            default_amount: Decimal::ZERO,
            recovered_amount: Decimal::ZERO,
            available_cash: amount * dec!(5),
            senior_interest_due: amount,
            senior_interest: amount,
            senior_principal: amount,
            mezzanine_interest_due: amount,
            mezzanine_interest: amount,
            mezzanine_principal: amount,
            equity_cash: amount,
            senior_balance: Decimal::ZERO,
            mezzanine_balance: Decimal::ZERO,
        }
    }

    fn ledger(months: u32) -> Vec<MonthlyRecord> {
        (1..=months).map(|m| record(m, Decimal::from(m))).collect()
    }

    #[test]
    fn test_full_years() {
        let years = aggregate_annual(&ledger(24));
        assert_eq!(years.len(), 2);
        // 1 + 2 + ... + 12 = 78
        assert_eq!(years[0].senior_interest, dec!(78));
        // 13 + ... + 24 = 222
        assert_eq!(years[1].equity_cash, dec!(222));
        assert_eq!(years[1].months, 12);
    }

    #[test]
    fn test_partial_final_year() {
        let years = aggregate_annual(&ledger(30));
        assert_eq!(years.len(), 3);
        assert_eq!(years[2].year, 3);
        assert_eq!(years[2].months, 6);
        // 25 + ... + 30 = 165
        assert_eq!(years[2].mezzanine_principal, dec!(165));
    }

    #[test]
    fn test_empty_ledger() {
        assert_eq!(aggregate_annual(&[]), Vec::<AnnualSummary>::new());
    }

    #[test]
    fn test_tranche_cash_flows_combine_categories() {
        let years = aggregate_annual(&ledger(12));
        assert_eq!(years[0].senior_cash_flow(), dec!(156));
        assert_eq!(years[0].cash_flow(Tranche::Mezzanine), dec!(156));
        assert_eq!(years[0].cash_flow(Tranche::Equity), dec!(78));
    }

    #[test]
    fn test_totals_round_trip() {
        let months = ledger(60);
        let years = aggregate_annual(&months);
        let monthly: Money = months.iter().map(|r| r.equity_cash).sum();
        assert_eq!(total(&years, |y| y.equity_cash), monthly);
    }
}
