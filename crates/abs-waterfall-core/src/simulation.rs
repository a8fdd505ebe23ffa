//! Deal simulation entry points.
//!
//! Runs the collateral model through the monthly waterfall, assembles each
//! tranche's cash-flow vector and reduces it to an annualised IRR. CLO and
//! CMBS deals share one contract; only the collateral model differs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::collateral::{self, CloCollateral, CmbsCollateral, CollateralModel};
use crate::deal::{DealParameters, DealType};
use crate::time_value::{self, Periodicity};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::waterfall::{run_waterfall, MonthlyRecord, TrancheState, TrancheTerms};
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Position in the capital structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tranche {
    Senior,
    Mezzanine,
    Equity,
}

impl Tranche {
    pub const ALL: [Tranche; 3] = [Tranche::Senior, Tranche::Mezzanine, Tranche::Equity];

    pub fn label(self) -> &'static str {
        match self {
            Tranche::Senior => "Senior",
            Tranche::Mezzanine => "Mezzanine",
            Tranche::Equity => "Equity",
        }
    }

    /// Cash this tranche received in a ledger month.
    pub fn cash_in(self, record: &MonthlyRecord) -> Money {
        match self {
            Tranche::Senior => record.senior_cash(),
            Tranche::Mezzanine => record.mezzanine_cash(),
            Tranche::Equity => record.equity_cash,
        }
    }

    pub fn size(self, deal: &DealParameters) -> Money {
        match self {
            Tranche::Senior => deal.senior_size,
            Tranche::Mezzanine => deal.mezzanine_size,
            Tranche::Equity => deal.equity_size(),
        }
    }
}

/// Investor cash-flow vectors: initial outlay followed by one entry per month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowVectors {
    pub senior: Vec<Money>,
    pub mezzanine: Vec<Money>,
    pub equity: Vec<Money>,
}

impl CashflowVectors {
    pub fn from_ledger(deal: &DealParameters, ledger: &[MonthlyRecord]) -> Self {
        let build = |tranche: Tranche| -> Vec<Money> {
            std::iter::once(-tranche.size(deal))
                .chain(ledger.iter().map(|r| tranche.cash_in(r)))
                .collect()
        };
        CashflowVectors {
            senior: build(Tranche::Senior),
            mezzanine: build(Tranche::Mezzanine),
            equity: build(Tranche::Equity),
        }
    }

    pub fn get(&self, tranche: Tranche) -> &[Money] {
        match tranche {
            Tranche::Senior => &self.senior,
            Tranche::Mezzanine => &self.mezzanine,
            Tranche::Equity => &self.equity,
        }
    }
}

/// How completely a tranche was paid over the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PaidInFull,
    PartiallyPaid,
    Unpaid,
}

/// Lifetime totals for one tranche.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheSummary {
    pub tranche: Tranche,
    /// Original investment.
    pub invested: Money,
    pub interest_due: Money,
    pub interest_paid: Money,
    pub principal_paid: Money,
    pub total_received: Money,
    /// Balance still outstanding at the horizon (debt tranches).
    pub outstanding_balance: Money,
    /// Unpaid interest plus unreturned principal; for equity, capital not returned.
    pub shortfall: Money,
    pub status: PaymentStatus,
    /// Annualised IRR; `None` when undefined.
    pub irr: Option<Rate>,
}

/// Collateral-side totals over the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealTotals {
    pub collateral_income: Money,
    pub defaults: Money,
    pub recoveries: Money,
    /// Defaults net of recoveries.
    pub expected_loss: Money,
    pub net_cash_distributed: Money,
}

/// Output of one deal simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub deal_type: DealType,
    pub total_months: u32,
    pub ledger: Vec<MonthlyRecord>,
    pub senior_irr: Option<Rate>,
    pub mezzanine_irr: Option<Rate>,
    pub equity_irr: Option<Rate>,
    pub cash_flows: CashflowVectors,
    pub final_balances: TrancheState,
    pub tranches: Vec<TrancheSummary>,
    pub totals: DealTotals,
}

impl SimulationOutput {
    pub fn irr(&self, tranche: Tranche) -> Option<Rate> {
        match tranche {
            Tranche::Senior => self.senior_irr,
            Tranche::Mezzanine => self.mezzanine_irr,
            Tranche::Equity => self.equity_irr,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Simulate a deal with the collateral model its `deal_type` names.
pub fn simulate(deal: &DealParameters) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    simulate_with(deal, collateral::for_deal(deal).as_ref())
}

/// Simulate a leveraged-loan deal.
pub fn simulate_clo(deal: &DealParameters) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    simulate_with(deal, &CloCollateral::from(deal))
}

/// Simulate a commercial-mortgage deal.
pub fn simulate_cmbs(
    deal: &DealParameters,
) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    simulate_with(deal, &CmbsCollateral::from(deal))
}

/// Validate a deal and run it against any collateral model.
///
/// The tranche schedule follows the deal's horizon. A model reporting a
/// different month count is still run for the deal's months, with a warning.
pub fn simulate_with(
    deal: &DealParameters,
    collateral: &dyn CollateralModel,
) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    deal.validate()?;
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let deal_type = collateral.deal_type();

    tracing::debug!(
        deal_type = deal_type.label(),
        months = deal.total_months(),
        lockout = deal.lockout(),
        "running waterfall"
    );

    if deal_type != deal.deal_type {
        warnings.push(format!(
            "Deal tagged {} simulated with {} collateral model",
            deal.deal_type.label(),
            deal_type.label()
        ));
    }
    if collateral.total_months() != deal.total_months() {
        tracing::warn!(
            model_months = collateral.total_months(),
            deal_months = deal.total_months(),
            "collateral horizon differs from deal horizon"
        );
        warnings.push(format!(
            "Collateral model covers {} months but the deal runs {}",
            collateral.total_months(),
            deal.total_months()
        ));
    }

    let terms = TrancheTerms::from(deal);
    let run = run_waterfall(&terms, collateral);

    if !run.negative_cash_months.is_empty() {
        warnings.push(format!(
            "Collateral losses exceeded income in {} month(s); nothing distributed in those months",
            run.negative_cash_months.len()
        ));
    }
    if !run.final_state.is_retired() {
        tracing::warn!(
            senior = %run.final_state.senior_balance,
            mezzanine = %run.final_state.mezzanine_balance,
            "debt outstanding at horizon"
        );
    }
    if run.final_state.senior_balance > Decimal::ZERO {
        warnings.push(format!(
            "Senior tranche not retired at horizon: {} outstanding",
            run.final_state.senior_balance.round_dp(2)
        ));
    }
    if run.final_state.mezzanine_balance > Decimal::ZERO {
        warnings.push(format!(
            "Mezzanine tranche not retired at horizon: {} outstanding",
            run.final_state.mezzanine_balance.round_dp(2)
        ));
    }

    let cash_flows = CashflowVectors::from_ledger(deal, &run.records);

    let mut irrs = [None; 3];
    for (slot, tranche) in irrs.iter_mut().zip(Tranche::ALL) {
        *slot = time_value::irr(cash_flows.get(tranche), Periodicity::Monthly);
        if slot.is_none() {
            tracing::warn!(tranche = tranche.label(), "IRR undefined");
            warnings.push(format!(
                "{} IRR undefined: cash flows have no sign change or did not converge",
                tranche.label()
            ));
        }
    }
    let [senior_irr, mezzanine_irr, equity_irr] = irrs;

    let tranches = Tranche::ALL
        .iter()
        .zip(irrs)
        .map(|(&tranche, irr)| {
            summarize_tranche(deal, tranche, &run.records, &run.final_state, irr)
        })
        .collect();
    let totals = deal_totals(&run.records);

    let output = SimulationOutput {
        deal_type,
        total_months: deal.total_months(),
        ledger: run.records,
        senior_irr,
        mezzanine_irr,
        equity_irr,
        cash_flows,
        final_balances: run.final_state,
        tranches,
        totals,
    };

    let methodology = format!(
        "{} periodic waterfall: straight-line defaults on original pool, \
         sequential pay, monthly IRR compounded annually",
        deal_type.label()
    );
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(&methodology, deal, warnings, elapsed, output))
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

fn summarize_tranche(
    deal: &DealParameters,
    tranche: Tranche,
    ledger: &[MonthlyRecord],
    final_state: &TrancheState,
    irr: Option<Rate>,
) -> TrancheSummary {
    let invested = tranche.size(deal);
    let totals: (Money, Money, Money, Money) = match tranche {
        Tranche::Senior => (
            ledger.iter().map(|r| r.senior_interest_due).sum(),
            ledger.iter().map(|r| r.senior_interest).sum(),
            ledger.iter().map(|r| r.senior_principal).sum(),
            final_state.senior_balance,
        ),
        Tranche::Mezzanine => (
            ledger.iter().map(|r| r.mezzanine_interest_due).sum(),
            ledger.iter().map(|r| r.mezzanine_interest).sum(),
            ledger.iter().map(|r| r.mezzanine_principal).sum(),
            final_state.mezzanine_balance,
        ),
        Tranche::Equity => (
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        ),
    };
    let (interest_due, interest_paid, principal_paid, outstanding_balance) = totals;
    let total_received: Money = ledger.iter().map(|r| tranche.cash_in(r)).sum();

    let shortfall = match tranche {
        Tranche::Equity => (invested - total_received).max(Decimal::ZERO),
        _ => (interest_due - interest_paid).max(Decimal::ZERO) + outstanding_balance,
    };

    let status = if total_received.is_zero() && !invested.is_zero() {
        PaymentStatus::Unpaid
    } else if shortfall.is_zero() {
        PaymentStatus::PaidInFull
    } else {
        PaymentStatus::PartiallyPaid
    };

    TrancheSummary {
        tranche,
        invested,
        interest_due,
        interest_paid,
        principal_paid,
        total_received,
        outstanding_balance,
        shortfall,
        status,
        irr,
    }
}

fn deal_totals(ledger: &[MonthlyRecord]) -> DealTotals {
    let collateral_income: Money = ledger.iter().map(|r| r.interest_income).sum();
    let defaults: Money = ledger.iter().map(|r| r.default_amount).sum();
    let recoveries: Money = ledger.iter().map(|r| r.recovered_amount).sum();
    DealTotals {
        collateral_income,
        defaults,
        recoveries,
        expected_loss: defaults - recoveries,
        net_cash_distributed: ledger.iter().map(|r| r.total_distributed()).sum(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::LossAssumption;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn reference_deal() -> DealParameters {
        DealParameters {
            deal_type: DealType::Clo,
            total_collateral: dec!(110_000_000),
            senior_size: dec!(70_000_000),
            mezzanine_size: dec!(30_000_000),
            senior_coupon: dec!(0.04),
            mezzanine_coupon: dec!(0.08),
            collateral_yield: dec!(0.10),
            default_rate: dec!(0.10),
            loss: LossAssumption::Recovery(dec!(0.30)),
            years: 5,
            lockout_months: None,
        }
    }

    fn healthy_deal() -> DealParameters {
        DealParameters {
            collateral_yield: dec!(0.25),
            default_rate: dec!(0.02),
            ..reference_deal()
        }
    }

    #[test]
    fn test_ledger_length_matches_horizon() {
        let out = simulate(&reference_deal()).unwrap();
        assert_eq!(out.result.ledger.len(), 60);
        assert_eq!(out.result.total_months, 60);
    }

    #[test]
    fn test_cash_flow_vectors_start_with_investment() {
        let out = simulate(&reference_deal()).unwrap().result;
        assert_eq!(out.cash_flows.senior[0], dec!(-70_000_000));
        assert_eq!(out.cash_flows.mezzanine[0], dec!(-30_000_000));
        assert_eq!(out.cash_flows.equity[0], dec!(-10_000_000));
        assert_eq!(out.cash_flows.senior.len(), 61);
    }

    #[test]
    fn test_stressed_equity_irr_undefined_not_error() {
        let out = simulate(&reference_deal()).unwrap();
        assert!(out.result.equity_irr.is_none());
        assert!(out.warnings.iter().any(|w| w.starts_with("Equity IRR undefined")));
        let equity = &out.result.tranches[2];
        assert_eq!(equity.status, PaymentStatus::Unpaid);
        assert_eq!(equity.shortfall, dec!(10_000_000));
    }

    #[test]
    fn test_stressed_senior_loses_money() {
        let out = simulate(&reference_deal()).unwrap().result;
        let senior_irr = out.senior_irr.unwrap();
        assert!(senior_irr < Decimal::ZERO, "senior irr {senior_irr}");
        assert_eq!(out.tranches[0].status, PaymentStatus::PartiallyPaid);
        assert!(out.final_balances.senior_balance > Decimal::ZERO);
    }

    #[test]
    fn test_healthy_deal_senior_earns_coupon() {
        let out = simulate(&healthy_deal()).unwrap().result;
        // Fully serviced amortising 4% monthly-pay debt ≈ 4.07% effective
        let senior_irr = out.senior_irr.unwrap();
        assert!(approx_eq(senior_irr, dec!(0.0407), dec!(0.001)), "got {senior_irr}");
        let mezz_irr = out.mezzanine_irr.unwrap();
        assert!(approx_eq(mezz_irr, dec!(0.0830), dec!(0.001)), "got {mezz_irr}");
        assert!(out.equity_irr.unwrap() > mezz_irr);
        assert_eq!(out.tranches[0].status, PaymentStatus::PaidInFull);
    }

    #[test]
    fn test_net_cash_matches_ledger() {
        let out = simulate(&healthy_deal()).unwrap().result;
        let available: Money = out.ledger.iter().map(|r| r.available_cash).sum();
        assert!(approx_eq(out.totals.net_cash_distributed, available, dec!(0.0001)));
    }

    #[test]
    fn test_expected_loss_matches_closed_form() {
        let out = simulate(&reference_deal()).unwrap().result;
        // 110M * 10% * (1 - 30%)
        assert!(approx_eq(out.totals.expected_loss, dec!(7_700_000), dec!(0.01)));
    }

    #[test]
    fn test_cmbs_entry_point_reports_deal_type() {
        let mut deal = healthy_deal();
        deal.deal_type = DealType::Cmbs;
        deal.loss = LossAssumption::Severity(dec!(0.70));
        let out = simulate(&deal).unwrap().result;
        assert_eq!(out.deal_type, DealType::Cmbs);

        let clo = simulate(&healthy_deal()).unwrap().result;
        assert!(approx_eq(
            clo.senior_irr.unwrap(),
            out.senior_irr.unwrap(),
            dec!(0.000001)
        ));
    }

    #[test]
    fn test_mismatched_entry_point_warns() {
        let out = simulate_cmbs(&reference_deal()).unwrap();
        assert_eq!(out.result.deal_type, DealType::Cmbs);
        assert!(out.warnings.iter().any(|w| w.contains("simulated with CMBS")));
    }

    #[test]
    fn test_invalid_deal_rejected_before_run() {
        let mut deal = reference_deal();
        deal.senior_size = dec!(200_000_000);
        assert!(simulate(&deal).is_err());
    }

    #[test]
    fn test_custom_model_entry_point_validates_deal() {
        let mut deal = reference_deal();
        deal.years = 0;
        let err = simulate_with(&deal, &CloCollateral::from(&deal)).unwrap_err();
        assert!(err.to_string().contains("years"), "got {err}");

        let mut deal = reference_deal();
        deal.total_collateral = dec!(100_000_000);
        deal.senior_size = dec!(500_000_000);
        assert!(simulate_with(&deal, &CloCollateral::from(&deal)).is_err());
    }

    #[test]
    fn test_collateral_horizon_mismatch_warns() {
        let deal = reference_deal();
        let model = CloCollateral {
            total_months: 36,
            ..CloCollateral::from(&deal)
        };
        let out = simulate_with(&deal, &model).unwrap();
        assert_eq!(out.result.ledger.len(), 60);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("covers 36 months but the deal runs 60")));

        let matched = simulate(&deal).unwrap();
        assert!(!matched.warnings.iter().any(|w| w.contains("covers")));
    }

    #[test]
    fn test_zero_equity_irr_is_undefined() {
        let mut deal = healthy_deal();
        deal.mezzanine_size = dec!(40_000_000);
        let out = simulate(&deal).unwrap().result;
        // No investment to return on
        assert!(out.equity_irr.is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let out = simulate(&reference_deal()).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        let _: ComputationOutput<SimulationOutput> = serde_json::from_str(&json).unwrap();
    }
}
