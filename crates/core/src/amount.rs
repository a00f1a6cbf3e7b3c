use rust_decimal::Decimal;
use std::str::FromStr;

/// Parses a statement amount cell into a decimal.
///
/// Statements prefix amounts with a currency sign and may pad them with
/// whitespace; both are stripped. Empty or unparseable input yields zero,
/// so a bad cell never drops its row.
pub fn parse_amount(raw: &str) -> Decimal {
    let s = raw
        .trim()
        .trim_start_matches(['¥', '￥', '$'])
        .trim()
        .replace(',', "");
    if s.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(&s).unwrap_or(Decimal::ZERO)
}
