use napi::Result as NapiResult;
use napi_derive::napi;

use abs_waterfall_core::deal::DealParameters;
use abs_waterfall_core::time_value::Periodicity;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[napi]
pub fn simulate(deal_json: String) -> NapiResult<String> {
    let deal: DealParameters = serde_json::from_str(&deal_json).map_err(to_napi_error)?;
    let output = abs_waterfall_core::simulation::simulate(&deal).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Single run after a pool-quality overlay (`{"kind": "clo", ...}`).
#[napi]
pub fn simulate_with_quality(deal_json: String, quality_json: String) -> NapiResult<String> {
    let deal: DealParameters = serde_json::from_str(&deal_json).map_err(to_napi_error)?;
    let quality: abs_waterfall_core::scenarios::PoolQuality =
        serde_json::from_str(&quality_json).map_err(to_napi_error)?;
    let output = abs_waterfall_core::scenarios::simulate_with_quality(&deal, &quality)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn annual_view(deal_json: String) -> NapiResult<String> {
    let deal: DealParameters = serde_json::from_str(&deal_json).map_err(to_napi_error)?;
    let sim = abs_waterfall_core::simulation::simulate(&deal).map_err(to_napi_error)?;
    let output = abs_waterfall_core::aggregation::annual_view(&deal, &sim.result.ledger);
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// IRR
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct IrrRequest {
    cash_flows: Vec<rust_decimal::Decimal>,
    #[serde(default)]
    periodicity: Periodicity,
}

/// Annualised IRR as a decimal string, or `null` when undefined.
#[napi]
pub fn irr(input_json: String) -> NapiResult<String> {
    let input: IrrRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rate = abs_waterfall_core::time_value::irr(&input.cash_flows, input.periodicity);
    serde_json::to_string(&rate).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: abs_waterfall_core::scenarios::ScenarioComparisonInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        abs_waterfall_core::scenarios::compare_scenarios(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
