use clap::Args;
use serde_json::Value;

use abs_waterfall_core::scenarios::{self, ScenarioComparisonInput, StressScenario};

use crate::commands::simulate::{DealArgs, ScenarioArg};
use crate::input;

/// Arguments for a stress-scenario comparison
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to a JSON or YAML comparison file (`deal`, `scenarios`, `quality`)
    #[arg(long = "comparison")]
    pub comparison: Option<String>,

    /// Scenarios to compare (comma-separated); all presets when omitted
    #[arg(long, value_enum, value_delimiter = ',')]
    pub scenarios: Vec<ScenarioArg>,

    #[command(flatten)]
    pub deal: DealArgs,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let comparison: ScenarioComparisonInput = if let Some(ref path) = args.comparison {
        input::file::read_input(path)?
    } else {
        let quality = args.deal.pool_quality()?;
        ScenarioComparisonInput {
            deal: args.deal.into_deal()?,
            scenarios: args
                .scenarios
                .into_iter()
                .map(StressScenario::from)
                .collect(),
            quality,
        }
    };

    let result = scenarios::compare_scenarios(&comparison)?;
    Ok(serde_json::to_value(result)?)
}
