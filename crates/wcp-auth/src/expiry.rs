//! Credential lifetime parsing
//!
//! Lifetimes are written as `<amount><unit>` pairs, e.g. `"10y"`, `"1h"`,
//! `"1h30m"`. Units: `s`, `m`, `h`, `d`, `w`, `y`. A year is 365.25 days.
//! Issuer and verifier both work from the parsed [`Duration`], so the units
//! cannot drift between the two sides.

use std::time::Duration;

use crate::error::{Error, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
/// 365.25 days
const YEAR: u64 = 31_557_600;

/// Parse a lifetime string into a [`Duration`] with second granularity.
pub fn parse_expiry(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidExpiry("expiry cannot be empty".into()));
    }

    let mut total: u64 = 0;
    let mut amount = String::new();

    for c in input.chars() {
        if c.is_ascii_digit() {
            amount.push(c);
            continue;
        }

        if amount.is_empty() {
            return Err(Error::InvalidExpiry(format!(
                "unit '{c}' has no amount in '{input}'"
            )));
        }

        let unit = match c {
            's' => 1,
            'm' => MINUTE,
            'h' => HOUR,
            'd' => DAY,
            'w' => WEEK,
            'y' => YEAR,
            other => {
                return Err(Error::InvalidExpiry(format!(
                    "unknown unit '{other}' in '{input}'"
                )));
            }
        };

        let value: u64 = amount
            .parse()
            .map_err(|e| Error::InvalidExpiry(format!("bad amount in '{input}': {e}")))?;
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| Error::InvalidExpiry(format!("'{input}' overflows")))?;
        amount.clear();
    }

    if !amount.is_empty() {
        return Err(Error::InvalidExpiry(format!(
            "missing unit after '{amount}' in '{input}'"
        )));
    }

    if total == 0 {
        return Err(Error::InvalidExpiry(format!("'{input}' is zero")));
    }

    Ok(Duration::from_secs(total))
}
