//! Conversions between odds notations and probabilities, and margin removal.
//!
//! Every function is pure and total on its valid domain. Values outside the
//! domain return `OddsError::InvalidOddsFormat` (single prices) or
//! `OddsError::IncompleteMarket` (side-sets).

use crate::error::{OddsError, OddsResult};
use crate::models::OddsFormat;

/// Fair probabilities of a side-set sum to 1.0 within this tolerance
pub const FAIR_SUM_TOLERANCE: f64 = 1e-9;

/// Largest American magnitude accepted from a float feed; beyond this the
/// value no longer converts to an exact integer
pub const MAX_AMERICAN_MAGNITUDE: f64 = 1e15;

fn invalid(format: OddsFormat, value: f64) -> OddsError {
    OddsError::InvalidOddsFormat { format, value }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && p > 0.0 && p < 1.0
}

/// Implied probability of an American price.
///
/// `+130` -> 100 / 230, `-150` -> 150 / 250. Values in (-100, 100) are not
/// valid American odds.
pub fn american_to_implied(value: i64) -> OddsResult<f64> {
    let implied = if value >= 100 {
        100.0 / (value as f64 + 100.0)
    } else if value <= -100 {
        let stake = value.unsigned_abs() as f64;
        stake / (stake + 100.0)
    } else {
        return Err(invalid(OddsFormat::American, value as f64));
    };

    if !is_probability(implied) {
        return Err(invalid(OddsFormat::American, value as f64));
    }
    Ok(implied)
}

/// Implied probability of a decimal price (1 / value)
pub fn decimal_to_implied(value: f64) -> OddsResult<f64> {
    if !value.is_finite() || value <= 1.0 {
        return Err(invalid(OddsFormat::Decimal, value));
    }
    Ok(1.0 / value)
}

/// Exchange prices already denote the probability of the "yes" outcome.
/// 0 and 1 are resolved markets, not live quotes.
pub fn exchange_price_to_implied(value: f64) -> OddsResult<f64> {
    if !is_probability(value) {
        return Err(invalid(OddsFormat::ExchangePrice, value));
    }
    Ok(value)
}

/// Implied probability of a raw value in the given notation.
///
/// American values arrive as `f64` from collectors; they must be integral.
pub fn to_implied(format: OddsFormat, raw_value: f64) -> OddsResult<f64> {
    match format {
        OddsFormat::American => {
            if !raw_value.is_finite()
                || raw_value.fract() != 0.0
                || raw_value.abs() > MAX_AMERICAN_MAGNITUDE
            {
                return Err(invalid(OddsFormat::American, raw_value));
            }
            american_to_implied(raw_value as i64)
        }
        OddsFormat::Decimal => decimal_to_implied(raw_value),
        OddsFormat::ExchangePrice => exchange_price_to_implied(raw_value),
    }
}

/// Proportional de-vig: divide every side by the sum of the full side-set.
pub fn remove_margin(side_probabilities: &[f64]) -> OddsResult<Vec<f64>> {
    if side_probabilities.len() < 2 {
        return Err(OddsError::IncompleteMarket(format!(
            "{} side(s) supplied, at least 2 required",
            side_probabilities.len()
        )));
    }

    if let Some(bad) = side_probabilities.iter().find(|p| !is_probability(**p)) {
        return Err(OddsError::IncompleteMarket(format!(
            "side probability {} outside (0, 1)",
            bad
        )));
    }

    let total: f64 = side_probabilities.iter().sum();
    Ok(side_probabilities.iter().map(|p| p / total).collect())
}

/// Book margin of a side-set (sum of implied probabilities minus one)
pub fn overround(side_probabilities: &[f64]) -> f64 {
    side_probabilities.iter().sum::<f64>() - 1.0
}

/// Inverse of `american_to_implied`, rounded to the nearest integer.
///
/// 0.5 maps to +100; -100 and +100 are the same price.
pub fn implied_to_american(probability: f64) -> OddsResult<i64> {
    if !is_probability(probability) {
        return Err(invalid(OddsFormat::American, probability));
    }

    let american = if probability > 0.5 {
        -100.0 * probability / (1.0 - probability)
    } else {
        100.0 * (1.0 - probability) / probability
    };

    Ok(american.round() as i64)
}

/// Decimal odds of a probability (1 / p)
pub fn implied_to_decimal(probability: f64) -> OddsResult<f64> {
    if !is_probability(probability) {
        return Err(invalid(OddsFormat::Decimal, probability));
    }
    Ok(1.0 / probability)
}

pub fn american_to_decimal(value: i64) -> OddsResult<f64> {
    if value >= 100 {
        Ok(value as f64 / 100.0 + 1.0)
    } else if value <= -100 {
        Ok(100.0 / value.unsigned_abs() as f64 + 1.0)
    } else {
        Err(invalid(OddsFormat::American, value as f64))
    }
}

pub fn decimal_to_american(value: f64) -> OddsResult<i64> {
    if !value.is_finite() || value <= 1.0 {
        return Err(invalid(OddsFormat::Decimal, value));
    }

    let american = if value >= 2.0 {
        (value - 1.0) * 100.0
    } else {
        -100.0 / (value - 1.0)
    };

    Ok(american.round() as i64)
}

/// Exchange contracts quoted in integer cents (1..=99) as a share price
pub fn cents_to_exchange_price(cents: i64) -> OddsResult<f64> {
    if !(1..=99).contains(&cents) {
        return Err(invalid(OddsFormat::ExchangePrice, cents as f64 / 100.0));
    }
    Ok(cents as f64 / 100.0)
}
