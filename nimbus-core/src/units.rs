//! Unit handling at the parse boundary.
//!
//! Providers report measurements in their own units; every reading is
//! converted with [`Unit::to_si`] the moment it is extracted. The reverse
//! direction ([`Unit::from_si`]) is for front ends rendering the
//! canonical model in display units.

/// Tokens providers use for "this station does not report that".
const NOT_AVAILABLE: &[&str] = &["NA", "N/A", "-", "--"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Kelvin,
    Celsius,
    Fahrenheit,
    Pascal,
    Hectopascal,
    PoundsPerSquareInch,
    MillimetersOfMercury,
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
    /// Plain angle, e.g. a coordinate.
    Degrees,
    /// Direction the wind blows from, kept within 0..360.
    Bearing,
    /// Bearing measured in the opposite rotational sense.
    ReversedBearing,
    Percent,
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl Unit {
    pub fn to_si(self, value: f64) -> f64 {
        match self {
            Unit::Kelvin
            | Unit::Pascal
            | Unit::MetersPerSecond
            | Unit::Degrees
            | Unit::Percent
            | Unit::Meters => value,
            Unit::Celsius => value + 273.15,
            Unit::Fahrenheit => (value - 32.0) * 5.0 / 9.0 + 273.15,
            Unit::Hectopascal => value * 100.0,
            Unit::PoundsPerSquareInch => value * 6894.75729,
            Unit::MillimetersOfMercury => value * 133.3224,
            Unit::KilometersPerHour => value * 10.0 / 36.0,
            Unit::MilesPerHour => value * 0.44704,
            Unit::Bearing => value.rem_euclid(360.0),
            Unit::ReversedBearing => (360.0 - value).rem_euclid(360.0),
            Unit::Kilometers => value * 1000.0,
            Unit::Miles => value * 1609.3472,
            Unit::Feet => value / 3.2808,
        }
    }

    pub fn from_si(self, value: f64) -> f64 {
        match self {
            Unit::Kelvin
            | Unit::Pascal
            | Unit::MetersPerSecond
            | Unit::Degrees
            | Unit::Percent
            | Unit::Meters => value,
            Unit::Celsius => value - 273.15,
            Unit::Fahrenheit => (value - 273.15) * 1.8 + 32.0,
            Unit::Hectopascal => value / 100.0,
            Unit::PoundsPerSquareInch => value / 6894.75729,
            Unit::MillimetersOfMercury => value / 133.3224,
            Unit::KilometersPerHour => value * 3.6,
            Unit::MilesPerHour => value / 0.44704,
            Unit::Bearing => value.rem_euclid(360.0),
            Unit::ReversedBearing => (360.0 - value).rem_euclid(360.0),
            Unit::Kilometers => value / 1000.0,
            Unit::Miles => value / 1609.3472,
            Unit::Feet => value * 3.2808,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Kelvin => "K",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Pascal => "Pa",
            Unit::Hectopascal => "hPa",
            Unit::PoundsPerSquareInch => "psi",
            Unit::MillimetersOfMercury => "mmHg",
            Unit::MetersPerSecond => "m/s",
            Unit::KilometersPerHour => "km/h",
            Unit::MilesPerHour => "mph",
            Unit::Degrees | Unit::Bearing | Unit::ReversedBearing => "°",
            Unit::Percent => "%",
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Miles => "mi",
            Unit::Feet => "ft",
        }
    }
}

/// Parse a provider reading, tolerating a trailing unit suffix
/// (`"65%"`, `"49 ft"`).
///
/// Not-available tokens, empty text and anything that is not a finite
/// number yield `None`; they must never turn into `0.0`.
pub fn parse_reading(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || NOT_AVAILABLE.iter().any(|na| text.eq_ignore_ascii_case(na)) {
        return None;
    }

    let number = text
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
        .trim_end();

    number.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a reading and convert it to SI in one step.
pub fn reading_to_si(text: &str, unit: Unit) -> Option<f64> {
    parse_reading(text).map(|v| unit.to_si(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn documented_conversions() {
        assert!(close(Unit::Celsius.to_si(20.0), 293.15));
        assert!(close(Unit::Hectopascal.to_si(1013.0), 101_300.0));
        assert!(close(Unit::KilometersPerHour.to_si(36.0), 10.0));
        assert!(close(Unit::ReversedBearing.to_si(90.0), 270.0));
        assert!(close(Unit::Kilometers.to_si(16.1), 16_100.0));
        assert!(close(Unit::Feet.to_si(32.808), 10.0));
    }

    #[test]
    fn reversed_north_stays_in_range() {
        assert_eq!(Unit::ReversedBearing.to_si(0.0), 0.0);
        assert_eq!(Unit::ReversedBearing.to_si(360.0), 0.0);
        assert_eq!(Unit::Bearing.to_si(360.0), 0.0);
        assert_eq!(Unit::Degrees.to_si(-122.5), -122.5);
    }

    #[test]
    fn display_conversions_invert_si() {
        assert!(close(Unit::Celsius.from_si(273.15), 0.0));
        assert!(close(Unit::Fahrenheit.from_si(273.15), 32.0));
        assert!(close(Unit::KilometersPerHour.from_si(10.0), 36.0));
        assert!(close(Unit::Fahrenheit.to_si(212.0), 373.15));
    }

    #[test]
    fn not_available_tokens_are_unknown() {
        for token in ["NA", "N/A", "n/a", "", "  ", "-", "--", "nan", "inf"] {
            assert_eq!(parse_reading(token), None, "{token:?}");
        }
    }

    #[test]
    fn suffixes_are_stripped() {
        assert_eq!(parse_reading("65%"), Some(65.0));
        assert_eq!(parse_reading("49 ft"), Some(49.0));
        assert_eq!(parse_reading(" -3.5 "), Some(-3.5));
        assert_eq!(parse_reading("0"), Some(0.0));
    }
}
