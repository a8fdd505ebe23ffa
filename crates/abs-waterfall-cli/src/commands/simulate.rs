use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use abs_waterfall_core::aggregation;
use abs_waterfall_core::deal::{DealParameters, DealType, LossAssumption};
use abs_waterfall_core::scenarios::{self, PoolQuality, StressScenario};
use abs_waterfall_core::simulation::{self, SimulationOutput};
use abs_waterfall_core::ComputationOutput;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DealTypeArg {
    Clo,
    Cmbs,
}

impl From<DealTypeArg> for DealType {
    fn from(arg: DealTypeArg) -> Self {
        match arg {
            DealTypeArg::Clo => DealType::Clo,
            DealTypeArg::Cmbs => DealType::Cmbs,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScenarioArg {
    Custom,
    Mild,
    Moderate,
    Severe,
}

impl From<ScenarioArg> for StressScenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Custom => StressScenario::Custom,
            ScenarioArg::Mild => StressScenario::Mild,
            ScenarioArg::Moderate => StressScenario::Moderate,
            ScenarioArg::Severe => StressScenario::Severe,
        }
    }
}

/// Deal definition shared by every deal-driven command.
///
/// Rates are decimals (`0.04` = 4%).
#[derive(Args)]
pub struct DealArgs {
    /// Path to a JSON or YAML deal file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Collateral type
    #[arg(long, value_enum, default_value = "clo")]
    pub deal_type: DealTypeArg,

    /// Total collateral pool balance
    #[arg(long)]
    pub total_collateral: Option<Decimal>,

    /// Senior tranche size
    #[arg(long)]
    pub senior_size: Option<Decimal>,

    /// Mezzanine tranche size
    #[arg(long)]
    pub mezzanine_size: Option<Decimal>,

    /// Senior annual coupon
    #[arg(long)]
    pub senior_coupon: Option<Decimal>,

    /// Mezzanine annual coupon
    #[arg(long)]
    pub mezzanine_coupon: Option<Decimal>,

    /// Annual collateral yield (NOI yield for CMBS)
    #[arg(long)]
    pub collateral_yield: Option<Decimal>,

    /// Default rate over the horizon
    #[arg(long)]
    pub default_rate: Option<Decimal>,

    /// Recovery rate on defaults (CLO convention)
    #[arg(long, conflicts_with = "severity")]
    pub recovery: Option<Decimal>,

    /// Loss severity on defaults (CMBS convention)
    #[arg(long)]
    pub severity: Option<Decimal>,

    /// Horizon in years
    #[arg(long)]
    pub years: Option<u32>,

    /// Months from closing with no principal payments
    #[arg(long)]
    pub lockout_months: Option<u32>,

    /// Replace credit assumptions with a stress preset
    #[arg(long, value_enum)]
    pub scenario: Option<ScenarioArg>,

    /// Path to a JSON or YAML pool-quality overlay (`kind: clo` or `kind: cmbs`)
    #[arg(long)]
    pub quality: Option<String>,
}

impl DealArgs {
    /// Load the `--quality` overlay, if any.
    pub fn pool_quality(&self) -> Result<Option<PoolQuality>, Box<dyn std::error::Error>> {
        match self.quality {
            Some(ref path) => Ok(Some(input::file::read_input(path)?)),
            None => Ok(None),
        }
    }

    /// Resolve the deal from file, piped stdin or flags, then apply `--scenario`.
    pub fn into_deal(self) -> Result<DealParameters, Box<dyn std::error::Error>> {
        let scenario = self.scenario;
        let deal: DealParameters = if let Some(ref path) = self.input {
            input::file::read_input(path)?
        } else if self.total_collateral.is_some() {
            self.deal_from_flags()?
        } else if let Some(data) = input::stdin::read_stdin()? {
            serde_json::from_value(data)?
        } else {
            self.deal_from_flags()?
        };

        Ok(match scenario {
            Some(s) => StressScenario::from(s).apply(&deal),
            None => deal,
        })
    }

    fn deal_from_flags(self) -> Result<DealParameters, Box<dyn std::error::Error>> {
        let deal_type = DealType::from(self.deal_type);
        let loss = match (self.recovery, self.severity, deal_type) {
            (Some(r), _, _) => LossAssumption::Recovery(r),
            (None, Some(s), _) => LossAssumption::Severity(s),
            (None, None, DealType::Clo) => {
                return Err("--recovery is required (or provide --input)".into())
            }
            (None, None, DealType::Cmbs) => {
                return Err("--severity is required (or provide --input)".into())
            }
        };

        Ok(DealParameters {
            deal_type,
            total_collateral: self
                .total_collateral
                .ok_or("--total-collateral is required (or provide --input)")?,
            senior_size: self
                .senior_size
                .ok_or("--senior-size is required (or provide --input)")?,
            mezzanine_size: self
                .mezzanine_size
                .ok_or("--mezzanine-size is required (or provide --input)")?,
            senior_coupon: self
                .senior_coupon
                .ok_or("--senior-coupon is required (or provide --input)")?,
            mezzanine_coupon: self
                .mezzanine_coupon
                .ok_or("--mezzanine-coupon is required (or provide --input)")?,
            collateral_yield: self
                .collateral_yield
                .ok_or("--collateral-yield is required (or provide --input)")?,
            default_rate: self
                .default_rate
                .ok_or("--default-rate is required (or provide --input)")?,
            loss,
            years: self.years.ok_or("--years is required (or provide --input)")?,
            lockout_months: self.lockout_months,
        })
    }
}

/// Arguments for a deal simulation
#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub deal: DealArgs,
}

/// Resolve the deal, apply any quality overlay after `--scenario`, and run it.
fn simulate_deal(
    args: DealArgs,
) -> Result<(DealParameters, ComputationOutput<SimulationOutput>), Box<dyn std::error::Error>> {
    let quality = args.pool_quality()?;
    let deal = args.into_deal()?;

    let Some(quality) = quality else {
        let sim = simulation::simulate(&deal)?;
        return Ok((deal, sim));
    };

    deal.validate()?;
    let mut warnings = Vec::new();
    let adjusted = scenarios::adjust_for_quality(&deal, &quality, &mut warnings)?;
    let mut sim = simulation::simulate(&adjusted)?;
    warnings.append(&mut sim.warnings);
    sim.warnings = warnings;
    Ok((adjusted, sim))
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (_, result) = simulate_deal(args.deal)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_annual(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let (deal, sim) = simulate_deal(args.deal)?;
    let mut view = aggregation::annual_view(&deal, &sim.result.ledger);

    // Run-level warnings still apply to the annual view
    let mut warnings = sim.warnings;
    warnings.append(&mut view.warnings);
    view.warnings = warnings;
    Ok(serde_json::to_value(view)?)
}
