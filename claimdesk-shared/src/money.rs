/// Currency formatting for user-facing text
///
/// Amounts are `rust_decimal::Decimal` everywhere; this module only renders
/// them for notification messages and reports.

use rust_decimal::{Decimal, RoundingStrategy};

/// Formats an amount as US dollars, e.g. `$1,234.50` or `-$3.00`
pub fn format_usd(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());

    let (whole, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, fraction)
}
