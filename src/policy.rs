use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::devnet;

pub const MIN_THRESHOLD_MM: f64 = 0.1;
pub const MIN_PAYOUT: i64 = 1;
pub const MAX_PAYOUT: i64 = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Please enter a city name.")]
    EmptyCity,
    #[error("Rain threshold must be at least 0.1 mm.")]
    ThresholdTooLow,
    #[error("Enter a valid payout amount.")]
    InvalidPayout,
    #[error("Payout must be at most 200 RALO tokens.")]
    PayoutTooHigh,
}

impl PolicyError {
    /// Stable machine code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::EmptyCity => "empty_city",
            PolicyError::ThresholdTooLow => "threshold_too_low",
            PolicyError::InvalidPayout => "invalid_payout",
            PolicyError::PayoutTooHigh => "payout_too_high",
        }
    }
}

/// Raw form input as submitted by the user.
///
/// Numbers are read as loosely as the page's inputs: numeric strings are
/// accepted and a fractional payout is truncated. Anything unreadable
/// becomes `None` and is reported by [`PolicyRequest::validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRequest {
    #[serde(default)]
    pub city: String,
    #[serde(default, deserialize_with = "loose_float")]
    pub threshold: Option<f64>,
    #[serde(default, deserialize_with = "loose_integer")]
    pub payout: Option<i64>,
}

fn loose_float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(&s, true),
        _ => None,
    })
}

fn loose_integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let n = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(&s, false),
        _ => None,
    };
    // saturating cast keeps huge values "too high" rather than invalid
    Ok(n.filter(|n| n.is_finite()).map(|n| n.trunc() as i64))
}

/// Longest numeric prefix of `s` after leading whitespace ("12.5mm" reads as 12.5).
fn leading_number(s: &str, fractional: bool) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if fractional && bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if fractional && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    s[..end].parse().ok()
}

/// A deployed payout policy. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub city: String,
    pub threshold: f64,
    pub payout: u32,
    pub wallet: String,
}

impl PolicyRequest {
    pub fn new(city: impl Into<String>, threshold: f64, payout: i64) -> Self {
        Self {
            city: city.into(),
            threshold: Some(threshold),
            payout: Some(payout),
        }
    }

    /// Check the form in display order and build the policy. Pure; nothing is committed.
    pub fn validate(&self) -> Result<Policy, PolicyError> {
        let city = self.city.trim();
        if city.is_empty() {
            return Err(PolicyError::EmptyCity);
        }

        let threshold = match self.threshold {
            Some(t) if t.is_finite() && t >= MIN_THRESHOLD_MM => t,
            _ => return Err(PolicyError::ThresholdTooLow),
        };

        let payout = match self.payout {
            Some(p) if p >= MIN_PAYOUT => p,
            _ => return Err(PolicyError::InvalidPayout),
        };
        if payout > MAX_PAYOUT {
            return Err(PolicyError::PayoutTooHigh);
        }

        Ok(Policy {
            city: city.to_string(),
            threshold,
            payout: payout as u32,
            wallet: devnet::derived_address(city),
        })
    }
}

/// What the page shows once the deployment delay has passed.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyReceipt {
    pub policy: Policy,
    pub setup_tx: String,
    pub deployed_at: chrono::DateTime<chrono::Utc>,
}

impl PolicyReceipt {
    pub fn summary_lines(&self) -> Vec<String> {
        let p = &self.policy;
        vec![
            "Policy created on Rialo DevNet".to_string(),
            format!("Location : {}", p.city),
            format!("Threshold : {} mm rainfall", devnet::fixed_1(p.threshold)),
            format!("Payout : {} {}", p.payout, crate::TOKEN_SYMBOL),
            format!("User : {}", devnet::truncate(&p.wallet, 12)),
            format!("Tx (setup) : {}", devnet::truncate(&self.setup_tx, 18)),
        ]
    }
}
