//! Payroll arithmetic: summaries, statutory defaults, period totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use derive_more::Display;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::payroll::{Deductions, Earnings, Payroll, PayrollSummary};
use crate::utils::dates::get_financial_year;

/// PF is 12% of basic, on a basic of at most 15 000.
const PF_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);
const PF_WAGE_CEILING: Decimal = Decimal::from_parts(15_000, 0, 0, false, 0);
/// Employee ESIC share is 0.75% of gross, only while gross is at most 21 000.
const ESIC_RATE: Decimal = Decimal::from_parts(75, 0, 0, false, 4);
const ESIC_WAGE_CEILING: Decimal = Decimal::from_parts(21_000, 0, 0, false, 0);

#[derive(Debug, Display, PartialEq, Eq)]
pub enum PayrollError {
    #[display(fmt = "{} cannot be negative", _0)]
    NegativeComponent(&'static str),
    #[display(fmt = "Deductions ({}) exceed gross pay ({})", deductions, gross)]
    NegativeNet { gross: Decimal, deductions: Decimal },
}

impl From<PayrollError> for AppError {
    fn from(e: PayrollError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn check_non_negative(name: &'static str, value: Decimal) -> Result<(), PayrollError> {
    if value < Decimal::ZERO {
        Err(PayrollError::NegativeComponent(name))
    } else {
        Ok(())
    }
}

pub fn gross_of(earnings: &Earnings) -> Decimal {
    earnings.basic + earnings.hra + earnings.allowances + earnings.bonus + earnings.overtime
}

pub fn total_of(deductions: &Deductions) -> Decimal {
    deductions.pf + deductions.esic + deductions.tax + deductions.recoveries
}

/// gross = sum of earnings, deductions = sum of deductions, net = gross - deductions.
pub fn compute_summary(earnings: &Earnings, deductions: &Deductions) -> Result<PayrollSummary, PayrollError> {
    for (name, value) in [
        ("basic", earnings.basic),
        ("hra", earnings.hra),
        ("allowances", earnings.allowances),
        ("bonus", earnings.bonus),
        ("overtime", earnings.overtime),
        ("pf", deductions.pf),
        ("esic", deductions.esic),
        ("tax", deductions.tax),
        ("recoveries", deductions.recoveries),
    ] {
        check_non_negative(name, value)?;
    }

    let gross = money(gross_of(earnings));
    let total = money(total_of(deductions));
    if total > gross {
        return Err(PayrollError::NegativeNet {
            gross,
            deductions: total,
        });
    }

    Ok(PayrollSummary {
        gross,
        deductions: total,
        net: gross - total,
    })
}

/// Default (PF, ESIC) for a month's basic and gross pay.
pub fn statutory_deductions(basic: Decimal, gross: Decimal) -> (Decimal, Decimal) {
    let pf = money(basic.min(PF_WAGE_CEILING) * PF_RATE);
    let esic = if gross <= ESIC_WAGE_CEILING {
        money(gross * ESIC_RATE)
    } else {
        Decimal::ZERO
    };
    (pf, esic)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct Totals {
    pub payslips: u32,
    #[schema(value_type = String)]
    pub gross: Decimal,
    #[schema(value_type = String)]
    pub deductions: Decimal,
    #[schema(value_type = String)]
    pub net: Decimal,
}

impl Totals {
    fn add(&mut self, summary: &PayrollSummary) {
        self.payslips += 1;
        self.gross += summary.gross;
        self.deductions += summary.deductions;
        self.net += summary.net;
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PeriodTotals {
    /// Keyed by `YYYY-MM`.
    pub by_month: BTreeMap<String, Totals>,
    /// Keyed by financial year, e.g. `2025-2026`.
    pub by_financial_year: BTreeMap<String, Totals>,
    pub overall: Totals,
}

pub fn month_key(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}

pub fn aggregate(payrolls: &[Payroll]) -> PeriodTotals {
    let mut totals = PeriodTotals::default();
    for p in payrolls {
        totals
            .by_month
            .entry(month_key(p.month))
            .or_default()
            .add(&p.summary);
        totals
            .by_financial_year
            .entry(get_financial_year(p.month))
            .or_default()
            .add(&p.summary);
        totals.overall.add(&p.summary);
    }
    totals
}
