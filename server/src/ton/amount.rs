//! Decimal TON amounts.
//!
//! Amounts travel through the system as decimal strings and only become
//! numbers at the chain boundary, as integer nanoTON. Never floats.

use thiserror::Error;

pub const NANO_PER_TON: u128 = 1_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty TON amount")]
    Empty,
    #[error("invalid TON amount: {0}")]
    Malformed(String),
}

/// Converts a decimal TON string (e.g. "5.5") to nanoTON.
/// At most nine fractional digits are significant; anything beyond is
/// truncated.
pub fn parse_ton_to_nano(amount: &str) -> Result<u128, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let mut parts = amount.splitn(3, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err(AmountError::Malformed(amount.to_string()));
    }
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Malformed(amount.to_string()));
    }
    let all_digits =
        whole.chars().all(|c| c.is_ascii_digit()) && frac.chars().all(|c| c.is_ascii_digit());
    if !all_digits {
        return Err(AmountError::Malformed(amount.to_string()));
    }

    let frac = if frac.len() > 9 { &frac[..9] } else { frac };
    let digits = format!("{whole}{frac:0<9}");

    digits
        .parse::<u128>()
        .map_err(|_| AmountError::Malformed(amount.to_string()))
}

/// Human-readable rendering for logs: trims trailing fractional zeros.
pub fn format_nano_as_ton(nano: u128) -> String {
    let whole = nano / NANO_PER_TON;
    let frac = nano % NANO_PER_TON;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{frac:09}");
    format!("{whole}.{}", frac_str.trim_end_matches('0'))
}
