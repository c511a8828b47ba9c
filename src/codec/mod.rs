// SPDX-License-Identifier: GPL-3.0-only

//! Resistor color-code decoding
//!
//! Pure functions over the fixed [`ColorBand`] taxonomy. The three lookup
//! tables are exhaustive `match`es, so a new band cannot be added without
//! the compiler pointing at every table.
//!
//! Digit and multiplier lookups fail for bands that have no entry.
//! Tolerance lookups never fail: a band without an entry reads as the 20%
//! default, which is what an unmarked (or unreadable) tolerance band means
//! on a real part.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tolerance assumed when the band has no tolerance entry
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 20.0;

/// Ohm sign appended to formatted values
pub const OHM_SUFFIX: &str = "Ω";

/// Significant digits used by [`format_resistance`]
const DISPLAY_SIGNIFICANT_DIGITS: usize = 4;

/// One color band printed on a resistor
///
/// Black..White carry ordinals 0..9, which double as digit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Black,
    Brown,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    Grey,
    White,
    Gold,
    Silver,
    None,
}

/// Errors from band decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("a resistor has 4, 5 or 6 bands, got {0}")]
    BandCount(usize),
    #[error("{0} is not a digit band")]
    NotADigit(ColorBand),
    #[error("{0} has no multiplier")]
    NoMultiplier(ColorBand),
    #[error("unknown color band '{0}'")]
    UnknownBand(String),
}

impl ColorBand {
    /// All bands in ordinal order
    pub const ALL: [ColorBand; 13] = [
        ColorBand::Black,
        ColorBand::Brown,
        ColorBand::Red,
        ColorBand::Orange,
        ColorBand::Yellow,
        ColorBand::Green,
        ColorBand::Blue,
        ColorBand::Violet,
        ColorBand::Grey,
        ColorBand::White,
        ColorBand::Gold,
        ColorBand::Silver,
        ColorBand::None,
    ];

    /// Digit value (0-9) of Black..White
    pub fn digit_value(self) -> Result<u8, CodecError> {
        match self {
            Self::Black => Ok(0),
            Self::Brown => Ok(1),
            Self::Red => Ok(2),
            Self::Orange => Ok(3),
            Self::Yellow => Ok(4),
            Self::Green => Ok(5),
            Self::Blue => Ok(6),
            Self::Violet => Ok(7),
            Self::Grey => Ok(8),
            Self::White => Ok(9),
            Self::Gold | Self::Silver | Self::None => Err(CodecError::NotADigit(self)),
        }
    }

    /// Multiplier table entry
    pub fn multiplier(self) -> Result<f64, CodecError> {
        match self {
            Self::Black => Ok(1.0),
            Self::Brown => Ok(10.0),
            Self::Red => Ok(100.0),
            Self::Orange => Ok(1e3),
            Self::Yellow => Ok(1e4),
            Self::Green => Ok(1e5),
            Self::Blue => Ok(1e6),
            Self::Violet => Ok(1e7),
            Self::Grey => Ok(1e8),
            Self::White => Ok(1e9),
            Self::Gold => Ok(0.1),
            Self::Silver => Ok(0.01),
            Self::None => Err(CodecError::NoMultiplier(self)),
        }
    }

    /// Tolerance table entry, if the band has one
    pub fn tolerance_entry(self) -> Option<f64> {
        match self {
            Self::Brown => Some(1.0),
            Self::Red => Some(2.0),
            Self::Green => Some(0.5),
            Self::Blue => Some(0.25),
            Self::Violet => Some(0.1),
            Self::Grey => Some(0.05),
            Self::Gold => Some(5.0),
            Self::Silver => Some(10.0),
            Self::None => Some(20.0),
            Self::Black | Self::Orange | Self::Yellow | Self::White => Option::None,
        }
    }

    /// Tolerance in percent, falling back to [`DEFAULT_TOLERANCE_PERCENT`]
    pub fn tolerance_percent(self) -> f64 {
        self.tolerance_entry().unwrap_or(DEFAULT_TOLERANCE_PERCENT)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Brown => "brown",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Violet => "violet",
            Self::Grey => "grey",
            Self::White => "white",
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ColorBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorBand {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "gray" => return Ok(Self::Grey),
            "purple" => return Ok(Self::Violet),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|band| band.name() == lower)
            .ok_or_else(|| CodecError::UnknownBand(s.trim().to_string()))
    }
}

/// Parse a comma-separated band list such as `yellow,violet,brown,gold`
pub fn parse_band_list(list: &str) -> Result<Vec<ColorBand>, CodecError> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Free-function form of [`ColorBand::digit_value`]
pub fn digit_value(band: ColorBand) -> Result<u8, CodecError> {
    band.digit_value()
}

/// Free-function form of [`ColorBand::multiplier`]
pub fn multiplier(band: ColorBand) -> Result<f64, CodecError> {
    band.multiplier()
}

/// Free-function form of [`ColorBand::tolerance_percent`]
pub fn tolerance_percent(band: ColorBand) -> f64 {
    band.tolerance_percent()
}

/// Number of significant-digit bands for a sequence of `len` bands
fn digit_band_count(len: usize) -> usize {
    if len >= 5 { 3 } else { 2 }
}

fn check_band_count(bands: &[ColorBand]) -> Result<(), CodecError> {
    match bands.len() {
        4..=6 => Ok(()),
        n => Err(CodecError::BandCount(n)),
    }
}

/// Resistance in ohms of a 4, 5 or 6 band sequence
///
/// Digit bands are folded left to right in base 10 and scaled by the band
/// right after them. Trailing tolerance and temperature-coefficient bands
/// are accepted but do not affect the value.
pub fn calculate_resistance(bands: &[ColorBand]) -> Result<f64, CodecError> {
    check_band_count(bands)?;
    let digits = digit_band_count(bands.len());

    let mut base = 0.0;
    for band in &bands[..digits] {
        base = base * 10.0 + band.digit_value()? as f64;
    }
    Ok(base * bands[digits].multiplier()?)
}

/// The band read as tolerance: the one right after the multiplier
pub fn tolerance_band(bands: &[ColorBand]) -> Option<ColorBand> {
    bands.get(digit_band_count(bands.len()) + 1).copied()
}

/// Human-readable value with a G/M/k prefix and 4 significant digits
///
/// `470.0 -> "470Ω"`, `4_700.0 -> "4.7kΩ"`, `1e6 -> "1MΩ"`.
pub fn format_resistance(ohms: f64) -> String {
    let (scaled, prefix) = if ohms >= 1e9 {
        (ohms / 1e9, "G")
    } else if ohms >= 1e6 {
        (ohms / 1e6, "M")
    } else if ohms >= 1e3 {
        (ohms / 1e3, "k")
    } else {
        (ohms, "")
    };
    format!(
        "{}{}{}",
        format_significant(scaled, DISPLAY_SIGNIFICANT_DIGITS),
        prefix,
        OHM_SUFFIX
    )
}

/// A decoded band sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedValue {
    pub ohms: f64,
    pub formatted: String,
    pub tolerance_percent: f64,
}

/// Value, display string and tolerance of a band sequence in one call
pub fn decode(bands: &[ColorBand]) -> Result<DecodedValue, CodecError> {
    let ohms = calculate_resistance(bands)?;
    let tolerance_percent = tolerance_band(bands)
        .map(ColorBand::tolerance_percent)
        .unwrap_or(DEFAULT_TOLERANCE_PERCENT);
    Ok(DecodedValue {
        ohms,
        formatted: format_resistance(ohms),
        tolerance_percent,
    })
}

/// General numeric formatting with `digits` significant digits
///
/// Fixed notation with trailing zeros (and a bare decimal point) trimmed
/// when the decimal exponent is in `-5..digits`, otherwise scientific
/// notation like `1.235E+15`.
fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 {
            "0".to_string()
        } else {
            value.to_string()
        };
    }

    // Round to the requested precision first; rounding can bump the exponent
    let sci = format!("{:.*e}", digits - 1, value);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return value.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value.to_string();
    };

    if (-5..digits as i32).contains(&exponent) {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(format!("{:.*}", decimals, value))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}E{}{:02}",
            trim_fraction(mantissa.to_string()),
            sign,
            exponent.abs()
        )
    }
}

fn trim_fraction(mut text: String) -> String {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text
}
