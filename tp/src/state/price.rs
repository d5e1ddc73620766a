//! Price string parsing

use tracing::debug;

/// Parse a free-form price string into a cost
///
/// Takes the first whitespace-separated token that contains a digit, drops
/// any leading currency marker (`$`, `€`, `£`, `¥`, `USD`, `A$`, ...) and
/// thousands separators, and parses what is left. A range or per-unit price
/// (`15-25`, `30/person`) yields its first number. Anything unparseable,
/// negative or non-finite is worth 0.
pub fn parse_price(raw: &str) -> f64 {
    debug!(%raw, "parse_price: called");
    let Some(token) = raw
        .split_whitespace()
        .find(|t| t.chars().any(|c| c.is_ascii_digit()))
    else {
        debug!("parse_price: no numeric token branch");
        return 0.0;
    };

    let body = token.trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let body = body.split(['/', '-']).next().unwrap_or_default();
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => {
            debug!(%value, "parse_price: parsed branch");
            value
        }
        _ => {
            debug!(%cleaned, "parse_price: malformed branch");
            0.0
        }
    }
}
