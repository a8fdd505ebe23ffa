//! Stress scenarios and collateral-quality overlays.
//!
//! Presets replace a deal's credit assumptions (yield, default rate, loss)
//! wholesale; quality overlays nudge them up or down in whole percentage
//! points from pool characteristics. `compare_scenarios` runs the same
//! capital structure through several of them side by side.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::deal::{DealParameters, DealType, LossAssumption};
use crate::error::WaterfallError;
use crate::simulation::{simulate, DealTotals, SimulationOutput, TrancheSummary};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::WaterfallResult;

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Named stress level. `Custom` keeps the deal's own assumptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressScenario {
    #[default]
    Custom,
    Mild,
    Moderate,
    Severe,
}

impl StressScenario {
    pub const ALL: [StressScenario; 4] = [
        StressScenario::Custom,
        StressScenario::Mild,
        StressScenario::Moderate,
        StressScenario::Severe,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StressScenario::Custom => "Custom",
            StressScenario::Mild => "Mild",
            StressScenario::Moderate => "Moderate",
            StressScenario::Severe => "Severe",
        }
    }

    /// Preset credit assumptions for a deal type; `None` for `Custom`.
    pub fn assumptions(self, deal_type: DealType) -> Option<CreditAssumptions> {
        let (collateral_yield, default_rate, loss) = match (deal_type, self) {
            (_, StressScenario::Custom) => return None,
            (DealType::Clo, StressScenario::Mild) => {
                (dec!(0.10), dec!(0.05), LossAssumption::Recovery(dec!(0.40)))
            }
            (DealType::Clo, StressScenario::Moderate) => {
                (dec!(0.09), dec!(0.15), LossAssumption::Recovery(dec!(0.30)))
            }
            (DealType::Clo, StressScenario::Severe) => {
                (dec!(0.07), dec!(0.30), LossAssumption::Recovery(dec!(0.20)))
            }
            (DealType::Cmbs, StressScenario::Mild) => {
                (dec!(0.065), dec!(0.02), LossAssumption::Severity(dec!(0.30)))
            }
            (DealType::Cmbs, StressScenario::Moderate) => {
                (dec!(0.06), dec!(0.05), LossAssumption::Severity(dec!(0.40)))
            }
            (DealType::Cmbs, StressScenario::Severe) => {
                (dec!(0.05), dec!(0.12), LossAssumption::Severity(dec!(0.55)))
            }
        };
        Some(CreditAssumptions {
            collateral_yield,
            default_rate,
            loss,
        })
    }

    /// The deal with this scenario's credit assumptions swapped in.
    pub fn apply(self, deal: &DealParameters) -> DealParameters {
        match self.assumptions(deal.deal_type) {
            Some(a) => a.apply(deal),
            None => deal.clone(),
        }
    }
}

/// The credit inputs a scenario controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAssumptions {
    pub collateral_yield: Rate,
    pub default_rate: Rate,
    pub loss: LossAssumption,
}

impl CreditAssumptions {
    pub fn of(deal: &DealParameters) -> Self {
        CreditAssumptions {
            collateral_yield: deal.collateral_yield,
            default_rate: deal.default_rate,
            loss: deal.loss,
        }
    }

    pub fn apply(&self, deal: &DealParameters) -> DealParameters {
        DealParameters {
            collateral_yield: self.collateral_yield,
            default_rate: self.default_rate,
            loss: self.loss,
            ..deal.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Collateral quality overlays
// ---------------------------------------------------------------------------

/// Loan-pool characteristics for a CLO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloPoolQuality {
    /// Average loan-to-value (decimal).
    pub avg_ltv: Rate,
    /// Average debt-service coverage ratio (multiple).
    pub avg_dscr: Decimal,
    /// Weighted-average spread in basis points; when set it re-derives the yield.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_avg_spread_bps: Option<Decimal>,
}

/// Property-pool characteristics for a CMBS deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmbsPoolQuality {
    pub avg_ltv: Rate,
    pub avg_dscr: Decimal,
    /// Property-type exposures (decimals of the pool).
    pub retail_pct: Rate,
    pub office_pct: Rate,
    pub multifamily_pct: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolQuality {
    Clo(CloPoolQuality),
    Cmbs(CmbsPoolQuality),
}

fn points(n: i64) -> Rate {
    Decimal::new(n, 2)
}

fn clamp_rate(r: Rate) -> Rate {
    r.max(Decimal::ZERO).min(Decimal::ONE)
}

/// Apply a pool-quality overlay to a deal's credit assumptions.
pub fn adjust_for_quality(
    deal: &DealParameters,
    quality: &PoolQuality,
    warnings: &mut Vec<String>,
) -> WaterfallResult<DealParameters> {
    let mut adjusted = deal.clone();

    match quality {
        PoolQuality::Clo(q) => {
            validate_common(q.avg_ltv, q.avg_dscr)?;
            if deal.deal_type != DealType::Clo {
                warnings.push("CLO pool overlay applied to a non-CLO deal".into());
            }

            if q.avg_ltv <= dec!(0.60) {
                adjusted.default_rate = clamp_rate(adjusted.default_rate - points(2));
            } else if q.avg_ltv > dec!(0.80) {
                adjusted.default_rate = clamp_rate(adjusted.default_rate + points(3));
            }

            let recovery = adjusted.loss.recovery_rate();
            if q.avg_dscr >= dec!(1.5) {
                adjusted.loss = adjusted.loss.with_recovery(clamp_rate(recovery + points(3)));
            } else if q.avg_dscr < dec!(1.2) {
                adjusted.loss = adjusted.loss.with_recovery(clamp_rate(recovery - points(4)));
            }

            if let Some(was) = q.weighted_avg_spread_bps {
                if was < Decimal::ZERO {
                    return Err(WaterfallError::invalid(
                        "weighted_avg_spread_bps",
                        "Spread cannot be negative.",
                    ));
                }
                // Yield in percent: 5 + WAS/10000, to two decimals
                adjusted.collateral_yield = (dec!(5) + was / dec!(10000)).round_dp(2) / dec!(100);
            }
        }
        PoolQuality::Cmbs(q) => {
            validate_common(q.avg_ltv, q.avg_dscr)?;
            if deal.deal_type != DealType::Cmbs {
                warnings.push("CMBS pool overlay applied to a non-CMBS deal".into());
            }
            let exposure = q.retail_pct + q.office_pct + q.multifamily_pct;
            if exposure > Decimal::ONE {
                warnings.push(format!(
                    "Property exposure sums to {}% (above 100%)",
                    (exposure * dec!(100)).round_dp(2)
                ));
            }

            let mut severity = adjusted.loss.severity();
            if q.avg_ltv > dec!(0.80) {
                adjusted.default_rate = clamp_rate(adjusted.default_rate + points(2));
            }
            if q.avg_dscr < dec!(1.2) {
                severity += points(5);
            }
            if q.retail_pct > dec!(0.40) {
                severity += points(5);
            }
            if q.office_pct > dec!(0.40) {
                adjusted.default_rate = clamp_rate(adjusted.default_rate + points(2));
            }
            if q.multifamily_pct > dec!(0.50) {
                severity -= points(3);
            }
            adjusted.loss = adjusted
                .loss
                .with_recovery(Decimal::ONE - clamp_rate(severity));
        }
    }

    Ok(adjusted)
}

fn validate_common(avg_ltv: Rate, avg_dscr: Decimal) -> WaterfallResult<()> {
    if avg_ltv < Decimal::ZERO {
        return Err(WaterfallError::invalid("avg_ltv", "LTV cannot be negative."));
    }
    if avg_dscr < Decimal::ZERO {
        return Err(WaterfallError::invalid("avg_dscr", "DSCR cannot be negative."));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Side-by-side comparison
// ---------------------------------------------------------------------------

/// Input for a scenario comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonInput {
    pub deal: DealParameters,
    /// Scenarios to run; every preset when empty.
    #[serde(default)]
    pub scenarios: Vec<StressScenario>,
    /// Overlay applied on top of each scenario's assumptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<PoolQuality>,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: StressScenario,
    pub assumptions: CreditAssumptions,
    pub senior_irr: Option<Rate>,
    pub mezzanine_irr: Option<Rate>,
    pub equity_irr: Option<Rate>,
    pub tranches: Vec<TrancheSummary>,
    pub totals: DealTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonOutput {
    pub deal_type: DealType,
    pub results: Vec<ScenarioResult>,
}

/// Run one capital structure through several stress scenarios.
///
/// Each run owns its own state; results come back in request order.
pub fn compare_scenarios(
    input: &ScenarioComparisonInput,
) -> WaterfallResult<ComputationOutput<ScenarioComparisonOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    input.deal.validate()?;

    let scenarios: &[StressScenario] = if input.scenarios.is_empty() {
        &StressScenario::ALL
    } else {
        &input.scenarios
    };

    let mut results = Vec::with_capacity(scenarios.len());
    for &scenario in scenarios {
        let mut deal = scenario.apply(&input.deal);
        if let Some(ref quality) = input.quality {
            deal = adjust_for_quality(&deal, quality, &mut warnings)?;
        }

        let run = simulate(&deal)?;
        warnings.extend(
            run.warnings
                .into_iter()
                .map(|w| format!("{}: {w}", scenario.label())),
        );

        let out = run.result;
        results.push(ScenarioResult {
            scenario,
            assumptions: CreditAssumptions::of(&deal),
            senior_irr: out.senior_irr,
            mezzanine_irr: out.mezzanine_irr,
            equity_irr: out.equity_irr,
            tranches: out.tranches,
            totals: out.totals,
        });
    }
    warnings.dedup();

    let output = ScenarioComparisonOutput {
        deal_type: input.deal.deal_type,
        results,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stress scenario comparison over a fixed capital structure",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Simulate a single deal after applying a collateral-quality overlay.
///
/// Overlay warnings come first in the envelope, followed by the run's own.
pub fn simulate_with_quality(
    deal: &DealParameters,
    quality: &PoolQuality,
) -> WaterfallResult<ComputationOutput<SimulationOutput>> {
    deal.validate()?;
    let mut warnings: Vec<String> = Vec::new();
    let adjusted = adjust_for_quality(deal, quality, &mut warnings)?;
    tracing::debug!(
        default_rate = %adjusted.default_rate,
        collateral_yield = %adjusted.collateral_yield,
        "quality overlay applied"
    );

    let mut out = simulate(&adjusted)?;
    warnings.append(&mut out.warnings);
    out.warnings = warnings;
    Ok(out)
}
