use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use abs_waterfall_core::time_value::{self, Periodicity};
use abs_waterfall_core::types::with_metadata;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PeriodicityArg {
    Monthly,
    Quarterly,
    Annual,
}

impl From<PeriodicityArg> for Periodicity {
    fn from(arg: PeriodicityArg) -> Self {
        match arg {
            PeriodicityArg::Monthly => Periodicity::Monthly,
            PeriodicityArg::Quarterly => Periodicity::Quarterly,
            PeriodicityArg::Annual => Periodicity::Annual,
        }
    }
}

/// Arguments for a standalone IRR calculation
#[derive(Args)]
pub struct IrrArgs {
    /// Path to a JSON or YAML file with `cash_flows` and `periodicity`
    #[arg(long)]
    pub input: Option<String>,

    /// Evenly spaced cash flows (comma-separated, e.g. "-100,5,5,105")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<Decimal>>,

    /// Spacing of the cash flows
    #[arg(long, value_enum, default_value = "monthly")]
    pub periodicity: PeriodicityArg,
}

#[derive(Debug, Serialize, Deserialize)]
struct IrrInput {
    cash_flows: Vec<Decimal>,
    #[serde(default)]
    periodicity: Periodicity,
}

#[derive(Debug, Serialize)]
struct IrrOutput {
    irr: Option<Decimal>,
    periodic_irr: Option<Decimal>,
    periodicity: Periodicity,
    periods: usize,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(cash_flows) = args.cash_flows {
        IrrInput {
            cash_flows,
            periodicity: args.periodicity.into(),
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--cash-flows is required (or provide --input)".into());
    };

    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let periodic_irr = time_value::periodic_irr(&irr_input.cash_flows);
    let irr = periodic_irr.and_then(|r| time_value::annualize(r, irr_input.periodicity));
    if irr.is_none() {
        warnings.push("IRR undefined: cash flows have no sign change or did not converge".into());
    }

    let output = IrrOutput {
        irr,
        periodic_irr,
        periodicity: irr_input.periodicity,
        periods: irr_input.cash_flows.len(),
    };
    let result = with_metadata(
        "Newton-Raphson IRR with bisection fallback, compounded to an annual rate",
        &irr_input,
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    );
    Ok(serde_json::to_value(result)?)
}
