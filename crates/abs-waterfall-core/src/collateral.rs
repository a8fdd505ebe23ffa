//! Collateral pool cash generation.
//!
//! Annual assumptions are spread straight-line across the horizon: yield
//! accrues at `yield / 12` on the original pool each month and the default
//! rate is divided evenly over every month of the run. The pool base never
//! amortises, so defaults reduce cash, not the balance earning interest.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::deal::{DealParameters, DealType};
use crate::types::{Money, Rate};

/// Collateral-side figures for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralCash {
    /// Interest (CLO) or net operating income (CMBS).
    pub interest_income: Money,
    pub default_amount: Money,
    pub recovered_amount: Money,
    /// Defaults net of recoveries.
    pub loss_amount: Money,
    /// `interest_income - loss_amount`; negative when losses outrun income.
    pub available_cash: Money,
}

impl CollateralCash {
    /// Cash the waterfall may distribute. A negative month distributes
    /// nothing and carries no deficit forward.
    pub fn distributable(&self) -> Money {
        self.available_cash.max(Decimal::ZERO)
    }
}

/// Monthly cash generation for a collateral pool.
pub trait CollateralModel {
    /// Cash generated in `month` (1-indexed).
    fn month_cash(&self, month: u32) -> CollateralCash;

    fn total_months(&self) -> u32;

    fn deal_type(&self) -> DealType;
}

/// Leveraged-loan pool: income from loan coupons, losses quoted via recovery.
#[derive(Debug, Clone)]
pub struct CloCollateral {
    pub total_collateral: Money,
    pub collateral_yield: Rate,
    pub default_rate: Rate,
    pub recovery_rate: Rate,
    pub total_months: u32,
}

impl CollateralModel for CloCollateral {
    fn month_cash(&self, _month: u32) -> CollateralCash {
        let interest_income = self.total_collateral * (self.collateral_yield / dec!(12));
        let default_amount =
            self.total_collateral * (self.default_rate / Decimal::from(self.total_months));
        let recovered_amount = default_amount * self.recovery_rate;
        let available_cash = interest_income + recovered_amount - default_amount;
        CollateralCash {
            interest_income,
            default_amount,
            recovered_amount,
            loss_amount: default_amount - recovered_amount,
            available_cash,
        }
    }

    fn total_months(&self) -> u32 {
        self.total_months
    }

    fn deal_type(&self) -> DealType {
        DealType::Clo
    }
}

/// Commercial mortgage pool: income is property NOI, losses quoted via severity.
#[derive(Debug, Clone)]
pub struct CmbsCollateral {
    pub total_loan_pool: Money,
    pub noi_yield: Rate,
    pub default_rate: Rate,
    pub loss_severity: Rate,
    pub total_months: u32,
}

impl CollateralModel for CmbsCollateral {
    fn month_cash(&self, _month: u32) -> CollateralCash {
        let noi = self.total_loan_pool * (self.noi_yield / dec!(12));
        let default_amount =
            self.total_loan_pool * (self.default_rate / Decimal::from(self.total_months));
        let loss_amount = default_amount * self.loss_severity;
        CollateralCash {
            interest_income: noi,
            default_amount,
            recovered_amount: default_amount - loss_amount,
            loss_amount,
            available_cash: noi - loss_amount,
        }
    }

    fn total_months(&self) -> u32 {
        self.total_months
    }

    fn deal_type(&self) -> DealType {
        DealType::Cmbs
    }
}

impl From<&DealParameters> for CloCollateral {
    fn from(deal: &DealParameters) -> Self {
        CloCollateral {
            total_collateral: deal.total_collateral,
            collateral_yield: deal.collateral_yield,
            default_rate: deal.default_rate,
            recovery_rate: deal.loss.recovery_rate(),
            total_months: deal.total_months(),
        }
    }
}

impl From<&DealParameters> for CmbsCollateral {
    fn from(deal: &DealParameters) -> Self {
        CmbsCollateral {
            total_loan_pool: deal.total_collateral,
            noi_yield: deal.collateral_yield,
            default_rate: deal.default_rate,
            loss_severity: deal.loss.severity(),
            total_months: deal.total_months(),
        }
    }
}

/// Collateral model matching the deal's type.
pub fn for_deal(deal: &DealParameters) -> Box<dyn CollateralModel> {
    match deal.deal_type {
        DealType::Clo => Box::new(CloCollateral::from(deal)),
        DealType::Cmbs => Box::new(CmbsCollateral::from(deal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::LossAssumption;
    use rust_decimal_macros::dec;

    fn approx_eq(a: Decimal, b: Decimal, eps: Decimal) -> bool {
        (a - b).abs() < eps
    }

    fn clo() -> CloCollateral {
        CloCollateral {
            total_collateral: dec!(110_000_000),
            collateral_yield: dec!(0.10),
            default_rate: dec!(0.10),
            recovery_rate: dec!(0.30),
            total_months: 60,
        }
    }

    #[test]
    fn test_clo_month_one_figures() {
        let cash = clo().month_cash(1);
        assert!(approx_eq(cash.interest_income, dec!(916_666.67), dec!(0.01)));
        assert!(approx_eq(cash.default_amount, dec!(183_333.33), dec!(0.01)));
        assert!(approx_eq(cash.recovered_amount, dec!(55_000), dec!(0.01)));
        assert!(approx_eq(cash.available_cash, dec!(788_333.33), dec!(0.01)));
    }

    #[test]
    fn test_clo_is_flat_across_months() {
        let model = clo();
        assert_eq!(model.month_cash(1), model.month_cash(60));
    }

    #[test]
    fn test_loss_is_default_net_of_recovery() {
        let cash = clo().month_cash(1);
        assert_eq!(cash.loss_amount, cash.default_amount - cash.recovered_amount);
    }

    #[test]
    fn test_cmbs_matches_clo_with_complementary_severity() {
        let cmbs = CmbsCollateral {
            total_loan_pool: dec!(110_000_000),
            noi_yield: dec!(0.10),
            default_rate: dec!(0.10),
            loss_severity: dec!(0.70),
            total_months: 60,
        };
        let a = clo().month_cash(1);
        let b = cmbs.month_cash(1);
        assert!(approx_eq(a.available_cash, b.available_cash, dec!(0.000001)));
    }

    #[test]
    fn test_negative_available_cash_distributes_nothing() {
        let model = CloCollateral {
            total_collateral: dec!(100_000_000),
            collateral_yield: dec!(0.05),
            default_rate: dec!(0.50),
            recovery_rate: Decimal::ZERO,
            total_months: 12,
        };
        let cash = model.month_cash(1);
        assert!(cash.available_cash < Decimal::ZERO);
        assert_eq!(cash.distributable(), Decimal::ZERO);
    }

    #[test]
    fn test_for_deal_dispatches_on_type() {
        let deal = DealParameters {
            deal_type: DealType::Cmbs,
            total_collateral: dec!(100_000_000),
            senior_size: dec!(65_000_000),
            mezzanine_size: dec!(25_000_000),
            senior_coupon: dec!(0.04),
            mezzanine_coupon: dec!(0.08),
            collateral_yield: dec!(0.06),
            default_rate: dec!(0.05),
            loss: LossAssumption::Severity(dec!(0.40)),
            years: 5,
            lockout_months: None,
        };
        let model = for_deal(&deal);
        let cash = model.month_cash(1);
        // NOI 500,000; loss = 100M * 0.05/60 * 0.40 = 33,333.33
        assert_eq!(model.total_months(), 60);
        assert_eq!(model.deal_type(), DealType::Cmbs);
        assert!(approx_eq(cash.available_cash, dec!(466_666.67), dec!(0.01)));
    }
}
