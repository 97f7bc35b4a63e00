//! Parsing for the provider's percentage strings.

use fleetmon_provider::{Error, Result};

/// Parses a percentage string such as `"61%"` into an integer in `0..=100`.
///
/// Strips one trailing percent sign before parsing; a bare integer without
/// the sign is accepted as well.
///
/// # Errors
///
/// Returns [`Error::Parse`] for non-numeric input and for values outside
/// `0..=100`.
pub fn parse_percent(raw: &str) -> Result<u8> {
    let digits = raw.strip_suffix('%').unwrap_or(raw);

    let value: u8 = digits
        .trim()
        .parse()
        .map_err(|_| Error::Parse(format!("invalid percentage {raw:?}")))?;

    if value > 100 {
        return Err(Error::Parse(format!("percentage {raw:?} out of range")));
    }

    Ok(value)
}
