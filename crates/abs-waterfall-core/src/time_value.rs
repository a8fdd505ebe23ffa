//! Discounting and internal-rate-of-return solving.
//!
//! The solver never errors on economically undefined inputs: a stream
//! without a sign change, or one the iteration cannot pin down, yields
//! `None`. Callers surface that as "n/a".

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::types::{Money, Rate};
use crate::WaterfallResult;

/// NPV tolerance, relative to the size of the initial outlay.
const NPV_TOLERANCE: Decimal = dec!(0.000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const IRR_GUESS: Rate = dec!(0.01);
const MIN_PERIODIC_RATE: Rate = dec!(-0.9999);
/// Initial upper bracket; doubled while the NPV keeps its sign.
const INITIAL_UPPER_BRACKET: Rate = dec!(10);
const MAX_BRACKET_DOUBLINGS: u32 = 64;
/// Lower-bracket candidates, deepest first.
const LOWER_BRACKETS: [Rate; 8] = [
    MIN_PERIODIC_RATE,
    dec!(-0.999),
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(-0.1),
];

/// Spacing of the entries in a cash-flow vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    #[default]
    Monthly,
    Quarterly,
    Annual,
}

impl Periodicity {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Periodicity::Monthly => 12,
            Periodicity::Quarterly => 4,
            Periodicity::Annual => 1,
        }
    }
}

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> WaterfallResult<Money> {
    if rate <= dec!(-1) {
        return Err(WaterfallError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    checked_npv(rate, cash_flows).ok_or_else(|| WaterfallError::DivisionByZero {
        context: format!("NPV discount factor at rate {rate}"),
    })
}

/// Annualised IRR of an evenly spaced cash-flow vector.
///
/// Monthly and quarterly rates are compounded: `(1 + r)^n - 1`. Annual
/// vectors return the periodic rate unchanged.
pub fn irr(cash_flows: &[Money], periodicity: Periodicity) -> Option<Rate> {
    let periodic = periodic_irr(cash_flows)?;
    annualize(periodic, periodicity)
}

/// Compound a periodic rate up to an annual rate.
pub fn annualize(periodic: Rate, periodicity: Periodicity) -> Option<Rate> {
    match periodicity {
        Periodicity::Annual => Some(periodic),
        other => {
            let n = i64::from(other.periods_per_year());
            (Decimal::ONE + periodic)
                .checked_powi(n)
                .map(|growth| growth - Decimal::ONE)
        }
    }
}

/// Periodic rate `r` such that `sum(cf[t] / (1 + r)^t) == 0`.
///
/// Newton-Raphson from a fixed guess, falling back to bisection when
/// Newton stalls or leaves the rate domain. The bisection bracket starts at
/// `[-0.9999, 10]`; the upper end doubles until the NPV changes sign. With
/// several sign changes the first root reached is returned.
pub fn periodic_irr(cash_flows: &[Money]) -> Option<Rate> {
    if cash_flows.len() < 2 {
        return None;
    }
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_positive || !has_negative {
        return None;
    }

    let tolerance = npv_tolerance(cash_flows);
    newton_irr(cash_flows, tolerance).or_else(|| bisection_irr(cash_flows, tolerance))
}

fn npv_tolerance(cash_flows: &[Money]) -> Decimal {
    let scale = if cash_flows[0].is_zero() {
        cash_flows
            .iter()
            .map(|cf| cf.abs())
            .max()
            .unwrap_or(Decimal::ONE)
    } else {
        cash_flows[0].abs()
    };
    NPV_TOLERANCE * scale
}

fn newton_irr(cash_flows: &[Money], tolerance: Decimal) -> Option<Rate> {
    let mut rate = IRR_GUESS;

    for _ in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_and_derivative(rate, cash_flows)?;

        if npv_val.abs() < tolerance {
            return Some(rate);
        }
        if dnpv.is_zero() {
            return None;
        }

        rate -= npv_val.checked_div(dnpv)?;

        if rate < MIN_PERIODIC_RATE {
            return None;
        }
    }

    None
}

fn bisection_irr(cash_flows: &[Money], tolerance: Decimal) -> Option<Rate> {
    // Deep negative rates overflow the discount factor on long vectors, so
    // walk the lower bracket up until the NPV is representable.
    let (mut low, mut npv_low) = LOWER_BRACKETS
        .into_iter()
        .find_map(|r| checked_npv(r, cash_flows).map(|v| (r, v)))?;
    let mut high = upper_bracket(cash_flows, npv_low.is_sign_positive())?;

    for _ in 0..MAX_IRR_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let npv_mid = checked_npv(mid, cash_flows)?;

        if npv_mid.abs() < tolerance || (high - low) < dec!(0.000000000001) {
            return Some(mid);
        }

        if npv_mid.is_sign_positive() == npv_low.is_sign_positive() {
            low = mid;
            npv_low = npv_mid;
        } else {
            high = mid;
        }
    }

    None
}

/// Smallest `10 * 2^k` whose NPV has the opposite sign to the lower bracket.
fn upper_bracket(cash_flows: &[Money], low_positive: bool) -> Option<Rate> {
    let mut high = INITIAL_UPPER_BRACKET;
    for _ in 0..MAX_BRACKET_DOUBLINGS {
        if checked_npv(high, cash_flows)?.is_sign_positive() != low_positive {
            return Some(high);
        }
        high = high.checked_mul(dec!(2))?;
    }
    None
}

/// NPV with overflow-checked arithmetic. Terms whose discount factor
/// exceeds the Decimal range are negligible and are dropped.
fn checked_npv(rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut total = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(d) => discount = d,
                None if one_plus_r > Decimal::ONE => break,
                None => return None,
            }
        }
        total = total.checked_add(cf.checked_div(discount)?)?;
    }

    Some(total)
}

fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        let term = cf.checked_div(discount)?;
        npv_val = npv_val.checked_add(term)?;
        if t > 0 {
            // d/dr [cf / (1+r)^t] = -t * cf / (1+r)^(t+1)
            let t_dec = Decimal::from(t as i64);
            dnpv = dnpv.checked_sub(t_dec.checked_mul(term)?.checked_div(one_plus_r)?)?;
        }
    }

    Some((npv_val, dnpv))
}
