//! Deal configuration: collateral pool, capital structure and credit
//! assumptions for a single simulation run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WaterfallError;
use crate::types::{Money, Rate};
use crate::WaterfallResult;

/// Longest horizon the engine accepts.
pub const MAX_HORIZON_YEARS: u32 = 10;

/// Collateral type backing the deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    /// Collateralized loan obligation: leveraged-loan pool.
    #[default]
    Clo,
    /// Commercial mortgage-backed security: commercial real estate loans.
    Cmbs,
}

impl DealType {
    pub fn label(self) -> &'static str {
        match self {
            DealType::Clo => "CLO",
            DealType::Cmbs => "CMBS",
        }
    }
}

/// How much of a defaulted balance comes back.
///
/// CLO desks quote recovery; CMBS desks quote loss severity. The two are
/// complements (`severity = 1 - recovery`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossAssumption {
    Recovery(Rate),
    Severity(Rate),
}

impl LossAssumption {
    pub fn recovery_rate(self) -> Rate {
        match self {
            LossAssumption::Recovery(r) => r,
            LossAssumption::Severity(s) => Decimal::ONE - s,
        }
    }

    pub fn severity(self) -> Rate {
        Decimal::ONE - self.recovery_rate()
    }

    /// Same convention, re-expressed from a new recovery rate.
    pub fn with_recovery(self, recovery: Rate) -> Self {
        match self {
            LossAssumption::Recovery(_) => LossAssumption::Recovery(recovery),
            LossAssumption::Severity(_) => LossAssumption::Severity(Decimal::ONE - recovery),
        }
    }

    fn raw(self) -> Rate {
        match self {
            LossAssumption::Recovery(r) | LossAssumption::Severity(r) => r,
        }
    }
}

impl Default for LossAssumption {
    fn default() -> Self {
        LossAssumption::Recovery(Decimal::ZERO)
    }
}

/// Immutable input to one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealParameters {
    #[serde(default)]
    pub deal_type: DealType,
    /// Original collateral pool balance.
    pub total_collateral: Money,
    /// Senior tranche original balance.
    pub senior_size: Money,
    /// Mezzanine tranche original balance.
    pub mezzanine_size: Money,
    /// Senior annual coupon (decimal).
    pub senior_coupon: Rate,
    /// Mezzanine annual coupon (decimal).
    pub mezzanine_coupon: Rate,
    /// Annual gross collateral yield; NOI yield for CMBS.
    pub collateral_yield: Rate,
    /// Default rate applied straight-line to the original pool over the horizon.
    pub default_rate: Rate,
    pub loss: LossAssumption,
    /// Horizon in whole years.
    pub years: u32,
    /// Months from closing during which no principal is paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockout_months: Option<u32>,
}

impl DealParameters {
    /// Residual first-loss piece below the mezzanine tranche.
    pub fn equity_size(&self) -> Money {
        self.total_collateral - self.senior_size - self.mezzanine_size
    }

    pub fn total_months(&self) -> u32 {
        self.years * 12
    }

    /// Lockout threshold in months; zero when principal pays from month one.
    pub fn lockout(&self) -> u32 {
        self.lockout_months.unwrap_or(0)
    }

    /// Reject configurations the engine must never see.
    pub fn validate(&self) -> WaterfallResult<()> {
        let non_negative = [
            ("total_collateral", self.total_collateral),
            ("senior_size", self.senior_size),
            ("mezzanine_size", self.mezzanine_size),
            ("senior_coupon", self.senior_coupon),
            ("mezzanine_coupon", self.mezzanine_coupon),
            ("collateral_yield", self.collateral_yield),
            ("default_rate", self.default_rate),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(WaterfallError::invalid(field, "Must be non-negative."));
            }
        }

        if self.total_collateral.is_zero() {
            return Err(WaterfallError::invalid(
                "total_collateral",
                "Collateral pool must be positive.",
            ));
        }
        if self.senior_size + self.mezzanine_size > self.total_collateral {
            return Err(WaterfallError::invalid(
                "mezzanine_size",
                "Senior plus mezzanine cannot exceed total collateral.",
            ));
        }
        if self.default_rate > Decimal::ONE {
            return Err(WaterfallError::invalid(
                "default_rate",
                "Default rate must be in [0, 1].",
            ));
        }

        let loss = self.loss.raw();
        if loss < Decimal::ZERO || loss > Decimal::ONE {
            let field = match self.loss {
                LossAssumption::Recovery(_) => "loss.recovery",
                LossAssumption::Severity(_) => "loss.severity",
            };
            return Err(WaterfallError::invalid(field, "Must be in [0, 1]."));
        }

        if self.years == 0 {
            return Err(WaterfallError::invalid(
                "years",
                "Horizon must be at least one year.",
            ));
        }
        if self.years > MAX_HORIZON_YEARS {
            return Err(WaterfallError::invalid(
                "years",
                format!("Horizon cannot exceed {MAX_HORIZON_YEARS} years."),
            ));
        }
        if self.lockout() > self.total_months() {
            return Err(WaterfallError::invalid(
                "lockout_months",
                "Lockout cannot be longer than the horizon.",
            ));
        }

        Ok(())
    }
}
