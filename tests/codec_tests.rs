// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the color-band codec

use resistor_scan::codec::{
    CodecError, ColorBand, calculate_resistance, decode, digit_value, format_resistance,
    parse_band_list, tolerance_percent,
};

use ColorBand::*;

#[test]
fn test_four_band_values() {
    assert_eq!(
        calculate_resistance(&[Yellow, Violet, Brown, Gold]).unwrap(),
        470.0
    );
    assert_eq!(
        calculate_resistance(&[Brown, Black, Orange, Gold]).unwrap(),
        10_000.0
    );
}

#[test]
fn test_five_band_value() {
    assert_eq!(
        calculate_resistance(&[Yellow, Violet, Black, Brown, Brown]).unwrap(),
        4_700.0
    );
}

#[test]
fn test_band_count_is_checked_before_content() {
    // Bands that would fail digit lookup still report the count problem
    assert_eq!(
        calculate_resistance(&[Gold, Silver, ColorBand::None]),
        Err(CodecError::BandCount(3))
    );
    assert_eq!(
        calculate_resistance(&[Brown; 7]),
        Err(CodecError::BandCount(7))
    );
}

#[test]
fn test_digit_values() {
    for (expected, band) in ColorBand::ALL[..10].iter().enumerate() {
        assert_eq!(digit_value(*band).unwrap() as usize, expected);
    }
    for band in [Gold, Silver, ColorBand::None] {
        assert_eq!(digit_value(band), Err(CodecError::NotADigit(band)));
    }
}

#[test]
fn test_formatting_prefixes() {
    assert_eq!(format_resistance(1_000_000.0), "1MΩ");
    assert_eq!(format_resistance(4_700_000.0), "4.7MΩ");
    assert_eq!(format_resistance(1_000_000_000.0), "1GΩ");
    assert_eq!(format_resistance(470.0), "470Ω");
}

#[test]
fn test_unmapped_tolerance_defaults_to_twenty_percent() {
    assert_eq!(tolerance_percent(Orange), 20.0);
    assert_eq!(tolerance_percent(Gold), 5.0);
}

#[test]
fn test_decode_typed_band_list() {
    let bands = parse_band_list("yellow, violet, orange, gold").unwrap();
    let decoded = decode(&bands).unwrap();
    assert_eq!(decoded.ohms, 47_000.0);
    assert_eq!(decoded.formatted, "47kΩ");
    assert_eq!(decoded.tolerance_percent, 5.0);

    assert!(matches!(
        parse_band_list("brown,black,chartreuse,gold"),
        Err(CodecError::UnknownBand(_))
    ));
}
