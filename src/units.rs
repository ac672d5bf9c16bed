use alloy::primitives::{
    U256,
    utils::{
        ParseUnits,
        Unit,
        format_ether,
    },
};

/// Wei per whole unit of an 18-decimal native currency.
pub const WEI_PER_UNIT: u128 = 1_000_000_000_000_000_000;

pub const GWEI: u128 = 1_000_000_000;

/// Formats a wei amount the way wallets show it: whole part, a dot, and the
/// fractional digits with trailing zeros removed but at least one kept
/// (`0.1`, `1.0`, `0.000000000000000001`).
pub fn format_native(amount: U256) -> String {
    trim_fraction(&format_ether(amount))
}

pub fn format_gwei(amount: u128) -> String {
    let formatted = trim_fraction(&ParseUnits::U256(U256::from(amount)).format_units(Unit::GWEI));
    let formatted = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{formatted} gwei")
}

fn trim_fraction(formatted: &str) -> String {
    match formatted.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => format!("{whole}.0"),
            trimmed => format!("{whole}.{trimmed}"),
        },
        None => format!("{formatted}.0"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn format_native__tenth_of_a_unit__is_0_1() {
        assert_eq!(format_native(U256::from(100_000_000_000_000_000u128)), "0.1");
    }

    #[test]
    fn format_native__whole_units__keep_one_fraction_digit() {
        assert_eq!(format_native(U256::ZERO), "0.0");
        assert_eq!(format_native(U256::from(WEI_PER_UNIT)), "1.0");
        assert_eq!(format_native(U256::from(42 * WEI_PER_UNIT)), "42.0");
    }

    #[test]
    fn format_native__smallest_unit__is_not_rounded_away() {
        assert_eq!(format_native(U256::from(1u8)), "0.000000000000000001");
        assert_eq!(
            format_native(U256::from(1_500_000_000_000_000_123u128)),
            "1.500000000000000123"
        );
    }

    #[test]
    fn format_native__amounts_beyond_u128__format_exactly() {
        // given
        let amount = U256::from(u128::MAX) * U256::from(10u8);

        // when
        let formatted = format_native(amount);

        // then
        assert_eq!(formatted, "3402823669209384634633.74607431768211455");
    }

    #[test]
    fn format_gwei__drops_zero_fraction() {
        assert_eq!(format_gwei(150 * GWEI), "150 gwei");
        assert_eq!(format_gwei(1_500_000_000), "1.5 gwei");
        assert_eq!(format_gwei(1), "0.000000001 gwei");
    }
}
