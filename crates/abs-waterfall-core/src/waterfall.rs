//! Monthly Waterfall Allocator.
//!
//! Applies each month's collateral cash in strict sequential priority:
//! - Senior interest -> mezzanine interest
//! - Senior scheduled principal -> mezzanine scheduled principal
//!   (suppressed while inside the lockout window)
//! - Equity residual
//!
//! Shortfalls pay less than due and are never carried forward: there is no
//! make-whole and no PIK accrual. All arithmetic uses `rust_decimal::Decimal`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::collateral::{CollateralCash, CollateralModel};
use crate::deal::DealParameters;
use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Capital-structure terms the allocator needs; fixed for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheTerms {
    pub senior_size: Money,
    pub mezzanine_size: Money,
    pub senior_coupon: Rate,
    pub mezzanine_coupon: Rate,
    pub total_months: u32,
    /// Principal is suppressed for months `1..=lockout_months`.
    pub lockout_months: u32,
}

impl TrancheTerms {
    pub fn senior_scheduled_principal(&self) -> Money {
        self.senior_size / Decimal::from(self.total_months)
    }

    pub fn mezzanine_scheduled_principal(&self) -> Money {
        self.mezzanine_size / Decimal::from(self.total_months)
    }

    fn in_lockout(&self, month: u32) -> bool {
        month <= self.lockout_months
    }
}

impl From<&DealParameters> for TrancheTerms {
    fn from(deal: &DealParameters) -> Self {
        TrancheTerms {
            senior_size: deal.senior_size,
            mezzanine_size: deal.mezzanine_size,
            senior_coupon: deal.senior_coupon,
            mezzanine_coupon: deal.mezzanine_coupon,
            total_months: deal.total_months(),
            lockout_months: deal.lockout(),
        }
    }
}

/// Outstanding debt balances. Only ever decreases, floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrancheState {
    pub senior_balance: Money,
    pub mezzanine_balance: Money,
}

impl TrancheState {
    pub fn new(terms: &TrancheTerms) -> Self {
        TrancheState {
            senior_balance: terms.senior_size,
            mezzanine_balance: terms.mezzanine_size,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.senior_balance.is_zero() && self.mezzanine_balance.is_zero()
    }
}

/// Ledger line for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    /// Month index (1-indexed).
    pub month: u32,
    pub interest_income: Money,
    pub default_amount: Money,
    pub recovered_amount: Money,
    /// Cash distributed through the waterfall this month.
    pub available_cash: Money,
    pub senior_interest_due: Money,
    pub senior_interest: Money,
    pub senior_principal: Money,
    pub mezzanine_interest_due: Money,
    pub mezzanine_interest: Money,
    pub mezzanine_principal: Money,
    pub equity_cash: Money,
    /// Senior balance after this month's payments.
    pub senior_balance: Money,
    /// Mezzanine balance after this month's payments.
    pub mezzanine_balance: Money,
}

impl MonthlyRecord {
    pub fn senior_cash(&self) -> Money {
        self.senior_interest + self.senior_principal
    }

    pub fn mezzanine_cash(&self) -> Money {
        self.mezzanine_interest + self.mezzanine_principal
    }

    pub fn total_distributed(&self) -> Money {
        self.senior_cash() + self.mezzanine_cash() + self.equity_cash
    }
}

/// A completed run: the ledger plus the balances left at the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallRun {
    pub records: Vec<MonthlyRecord>,
    pub final_state: TrancheState,
    /// Months in which collateral losses exceeded income.
    pub negative_cash_months: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Pay `due` out of `cash`, returning the amount paid.
fn pay(due: Money, cash: &mut Money) -> Money {
    let paid = due.min(*cash).max(Decimal::ZERO);
    *cash -= paid;
    paid
}

/// Distribute one month of collateral cash.
///
/// Takes the balances at the start of the month and returns the balances
/// at the end of it together with the ledger line.
pub fn allocate_month(
    terms: &TrancheTerms,
    state: TrancheState,
    month: u32,
    collateral: &CollateralCash,
) -> (TrancheState, MonthlyRecord) {
    let monthly = dec!(12);
    let mut cash = collateral.distributable();
    let mut next = state;

    // 1-2. Interest, senior first
    let senior_interest_due = state.senior_balance * (terms.senior_coupon / monthly);
    let senior_interest = pay(senior_interest_due, &mut cash);

    let mezzanine_interest_due = state.mezzanine_balance * (terms.mezzanine_coupon / monthly);
    let mezzanine_interest = pay(mezzanine_interest_due, &mut cash);

    // 3-5. Scheduled principal, sequential; nothing during lockout
    let (senior_principal, mezzanine_principal) = if terms.in_lockout(month) {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let senior = pay(
            terms.senior_scheduled_principal().min(next.senior_balance),
            &mut cash,
        );
        next.senior_balance = (next.senior_balance - senior).max(Decimal::ZERO);

        let mezzanine = pay(
            terms
                .mezzanine_scheduled_principal()
                .min(next.mezzanine_balance),
            &mut cash,
        );
        next.mezzanine_balance = (next.mezzanine_balance - mezzanine).max(Decimal::ZERO);

        (senior, mezzanine)
    };

    // 6. Residual to equity
    let equity_cash = cash.max(Decimal::ZERO);

    let record = MonthlyRecord {
        month,
        interest_income: collateral.interest_income,
        default_amount: collateral.default_amount,
        recovered_amount: collateral.recovered_amount,
        available_cash: collateral.distributable(),
        senior_interest_due,
        senior_interest,
        senior_principal,
        mezzanine_interest_due,
        mezzanine_interest,
        mezzanine_principal,
        equity_cash,
        senior_balance: next.senior_balance,
        mezzanine_balance: next.mezzanine_balance,
    };

    (next, record)
}

/// Run the waterfall over every month of the horizon.
pub fn run_waterfall(terms: &TrancheTerms, collateral: &dyn CollateralModel) -> WaterfallRun {
    let mut state = TrancheState::new(terms);
    let mut records = Vec::with_capacity(terms.total_months as usize);
    let mut negative_cash_months = Vec::new();

    for month in 1..=terms.total_months {
        let cash = collateral.month_cash(month);
        if cash.available_cash < Decimal::ZERO {
            negative_cash_months.push(month);
        }
        let (next, record) = allocate_month(terms, state, month, &cash);
        records.push(record);
        state = next;
    }

    WaterfallRun {
        records,
        final_state: state,
        negative_cash_months,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collateral::CloCollateral;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn sample_terms() -> TrancheTerms {
        TrancheTerms {
            senior_size: dec!(70_000_000),
            mezzanine_size: dec!(30_000_000),
            senior_coupon: dec!(0.04),
            mezzanine_coupon: dec!(0.08),
            total_months: 60,
            lockout_months: 0,
        }
    }

    fn sample_collateral() -> CloCollateral {
        CloCollateral {
            total_collateral: dec!(110_000_000),
            collateral_yield: dec!(0.10),
            default_rate: dec!(0.10),
            recovery_rate: dec!(0.30),
            total_months: 60,
        }
    }

    fn cash(amount: Decimal) -> CollateralCash {
        CollateralCash {
            interest_income: amount,
            default_amount: Decimal::ZERO,
            recovered_amount: Decimal::ZERO,
            loss_amount: Decimal::ZERO,
            available_cash: amount,
        }
    }

    #[test]
    fn test_month_one_priority() {
        let terms = sample_terms();
        let collateral = sample_collateral();
        let (state, rec) = allocate_month(
            &terms,
            TrancheState::new(&terms),
            1,
            &collateral.month_cash(1),
        );

        assert!(approx_eq(rec.available_cash, dec!(788_333.33), dec!(0.01)));
        assert!(approx_eq(rec.senior_interest, dec!(233_333.33), dec!(0.01)));
        assert_eq!(rec.senior_interest, rec.senior_interest_due);
        assert!(approx_eq(rec.mezzanine_interest, dec!(200_000), dec!(0.01)));
        // Remaining 355,000 is short of the 1,166,667 senior schedule
        assert!(approx_eq(rec.senior_principal, dec!(355_000), dec!(0.01)));
        assert_eq!(rec.mezzanine_principal, Decimal::ZERO);
        assert_eq!(rec.equity_cash, Decimal::ZERO);
        assert!(approx_eq(state.senior_balance, dec!(69_645_000), dec!(0.01)));
        assert_eq!(state.mezzanine_balance, dec!(30_000_000));
    }

    #[test]
    fn test_interest_shortfall_not_carried() {
        let terms = sample_terms();
        let start = TrancheState::new(&terms);
        let (_, rec) = allocate_month(&terms, start, 1, &cash(dec!(100_000)));
        assert_eq!(rec.senior_interest, dec!(100_000));
        assert_eq!(rec.mezzanine_interest, Decimal::ZERO);
        assert_eq!(rec.equity_cash, Decimal::ZERO);

        // Next month's interest due is computed on balance only
        let (_, rec2) = allocate_month(&terms, start, 2, &cash(dec!(1_000_000)));
        assert_eq!(rec2.senior_interest_due, rec.senior_interest_due);
    }

    #[test]
    fn test_excess_cash_flows_to_equity() {
        let terms = sample_terms();
        let (state, rec) = allocate_month(
            &terms,
            TrancheState::new(&terms),
            1,
            &cash(dec!(5_000_000)),
        );
        // Full interest and full scheduled principal on both tranches
        assert!(approx_eq(rec.senior_principal, dec!(1_166_666.67), dec!(0.01)));
        assert_eq!(rec.mezzanine_principal, dec!(500_000));
        let expected_equity = dec!(5_000_000)
            - rec.senior_interest
            - rec.mezzanine_interest
            - rec.senior_principal
            - rec.mezzanine_principal;
        assert_eq!(rec.equity_cash, expected_equity);
        assert_eq!(state.mezzanine_balance, dec!(29_500_000));
    }

    #[test]
    fn test_lockout_suppresses_principal() {
        let mut terms = sample_terms();
        terms.lockout_months = 36;
        let start = TrancheState::new(&terms);

        let (state, rec) = allocate_month(&terms, start, 36, &cash(dec!(5_000_000)));
        assert_eq!(rec.senior_principal, Decimal::ZERO);
        assert_eq!(rec.mezzanine_principal, Decimal::ZERO);
        assert_eq!(state, start);
        assert_eq!(
            rec.equity_cash,
            dec!(5_000_000) - rec.senior_interest - rec.mezzanine_interest
        );

        let (_, rec) = allocate_month(&terms, start, 37, &cash(dec!(5_000_000)));
        assert!(rec.senior_principal > Decimal::ZERO);
    }

    #[test]
    fn test_principal_capped_by_balance() {
        let terms = sample_terms();
        let state = TrancheState {
            senior_balance: dec!(100),
            mezzanine_balance: Decimal::ZERO,
        };
        let (next, rec) = allocate_month(&terms, state, 60, &cash(dec!(1_000_000)));
        assert_eq!(rec.senior_principal, dec!(100));
        assert_eq!(rec.mezzanine_principal, Decimal::ZERO);
        assert!(next.is_retired());
    }

    #[test]
    fn test_negative_collateral_cash_pays_nothing() {
        let terms = sample_terms();
        let (state, rec) = allocate_month(
            &terms,
            TrancheState::new(&terms),
            1,
            &cash(dec!(-250_000)),
        );
        assert_eq!(rec.available_cash, Decimal::ZERO);
        assert_eq!(rec.total_distributed(), Decimal::ZERO);
        assert_eq!(state, TrancheState::new(&terms));
    }

    #[test]
    fn test_run_produces_one_record_per_month() {
        let terms = sample_terms();
        let run = run_waterfall(&terms, &sample_collateral());
        assert_eq!(run.records.len(), 60);
        assert_eq!(run.records.first().unwrap().month, 1);
        assert_eq!(run.records.last().unwrap().month, 60);
    }

    #[test]
    fn test_run_conserves_cash_each_month() {
        let terms = sample_terms();
        let run = run_waterfall(&terms, &sample_collateral());
        for rec in &run.records {
            assert!(
                approx_eq(rec.total_distributed(), rec.available_cash, dec!(0.000001)),
                "month {}",
                rec.month
            );
        }
    }

    #[test]
    fn test_run_balances_non_increasing() {
        let terms = sample_terms();
        let run = run_waterfall(&terms, &sample_collateral());
        let mut prev = TrancheState::new(&terms);
        for rec in &run.records {
            assert!(rec.senior_balance <= prev.senior_balance);
            assert!(rec.mezzanine_balance <= prev.mezzanine_balance);
            assert!(rec.senior_balance >= Decimal::ZERO);
            prev = TrancheState {
                senior_balance: rec.senior_balance,
                mezzanine_balance: rec.mezzanine_balance,
            };
        }
        assert_eq!(prev, run.final_state);
    }

    #[test]
    fn test_stressed_run_leaves_senior_outstanding() {
        let terms = sample_terms();
        let run = run_waterfall(&terms, &sample_collateral());
        // ~47M of collateral cash cannot retire 100M of debt
        assert!(run.final_state.senior_balance > Decimal::ZERO);
        assert!(run.negative_cash_months.is_empty());
    }

    #[test]
    fn test_rich_collateral_retires_debt() {
        let terms = sample_terms();
        let collateral = CloCollateral {
            total_collateral: dec!(110_000_000),
            collateral_yield: dec!(0.30),
            default_rate: Decimal::ZERO,
            recovery_rate: Decimal::ZERO,
            total_months: 60,
        };
        let run = run_waterfall(&terms, &collateral);
        assert!(approx_eq(run.final_state.senior_balance, Decimal::ZERO, dec!(0.0001)));
        assert!(approx_eq(run.final_state.mezzanine_balance, Decimal::ZERO, dec!(0.0001)));
        assert!(run.records.iter().all(|r| r.equity_cash > Decimal::ZERO));
    }
}
