//! Supported currencies and the fixed INR conversion table.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of currencies the ledger accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Inr,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    /// ISO code as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Inr => "INR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    /// How many INR one unit of this currency is worth
    pub fn inr_rate(&self) -> Decimal {
        match self {
            Currency::Usd => Decimal::new(83, 0),
            Currency::Eur => Decimal::new(89, 0),
            Currency::Gbp => Decimal::new(104, 0),
            Currency::Cad => Decimal::new(61, 0),
            Currency::Aud => Decimal::new(54, 0),
            Currency::Inr => Decimal::ONE,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Inr
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "INR" => Ok(Currency::Inr),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            _ => Err(AppError::Validation(format!("Unsupported currency: {}", s))),
        }
    }
}

/// Largest magnitude any single amount may have (10^15)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// Most decimal places an amount may carry
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Reject amounts outside `[-MAX_AMOUNT, MAX_AMOUNT]` or with more than
/// `MAX_AMOUNT_SCALE` decimal places
pub fn check_amount(field: &str, amount: Decimal) -> AppResult<()> {
    if amount.abs() > MAX_AMOUNT {
        return Err(AppError::Validation(format!(
            "{} must not exceed {} in magnitude, got {}",
            field, MAX_AMOUNT, amount
        )));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(AppError::Validation(format!(
            "{} must have at most {} decimal places, got {}",
            field, MAX_AMOUNT_SCALE, amount
        )));
    }
    Ok(())
}

/// Convert an amount in `currency` to INR using the fixed rate table
pub fn convert_to_inr(amount: Decimal, currency: Currency) -> AppResult<Decimal> {
    amount
        .checked_mul(currency.inr_rate())
        .ok_or_else(|| AppError::Validation(format!("{} {} is too large to convert", amount, currency)))
}

/// Overflow-checked `*total += amount`; `total` is unchanged on error
pub fn accumulate(total: &mut Decimal, amount: Decimal) -> AppResult<()> {
    *total = total
        .checked_add(amount)
        .ok_or_else(|| AppError::Validation("Total amount overflowed".to_string()))?;
    Ok(())
}

/// Overflow-checked sum
pub fn checked_total<I>(amounts: I) -> AppResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut total = Decimal::ZERO;
    for amount in amounts {
        accumulate(&mut total, amount)?;
    }
    Ok(total)
}
