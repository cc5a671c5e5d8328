use std::fmt::Write;

use chrono::Local;
use clap::ValueEnum;
use nimbus_core::{Unit, WeatherConditions};

/// Longest location name shown before it gets shortened.
const MAX_NAME_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayUnits {
    /// °C, hPa, km/h, km
    Metric,
    /// °F, psi, mph, mi
    Imperial,
    /// K, Pa, m/s, m
    Si,
}

struct Scale {
    unit: Unit,
    precision: usize,
}

impl Scale {
    const fn new(unit: Unit, precision: usize) -> Self {
        Self { unit, precision }
    }

    fn format(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format!(
                "{:.*} {}",
                self.precision,
                self.unit.from_si(v),
                self.unit.symbol()
            ),
            None => "n/a".to_string(),
        }
    }
}

impl DisplayUnits {
    fn temperature(self) -> Scale {
        match self {
            DisplayUnits::Metric => Scale::new(Unit::Celsius, 1),
            DisplayUnits::Imperial => Scale::new(Unit::Fahrenheit, 1),
            DisplayUnits::Si => Scale::new(Unit::Kelvin, 1),
        }
    }

    fn pressure(self) -> Scale {
        match self {
            DisplayUnits::Metric => Scale::new(Unit::Hectopascal, 0),
            DisplayUnits::Imperial => Scale::new(Unit::PoundsPerSquareInch, 1),
            DisplayUnits::Si => Scale::new(Unit::Pascal, 0),
        }
    }

    fn speed(self) -> Scale {
        match self {
            DisplayUnits::Metric => Scale::new(Unit::KilometersPerHour, 0),
            DisplayUnits::Imperial => Scale::new(Unit::MilesPerHour, 0),
            DisplayUnits::Si => Scale::new(Unit::MetersPerSecond, 1),
        }
    }

    fn distance(self) -> Scale {
        match self {
            DisplayUnits::Metric => Scale::new(Unit::Kilometers, 1),
            DisplayUnits::Imperial => Scale::new(Unit::Miles, 1),
            DisplayUnits::Si => Scale::new(Unit::Meters, 0),
        }
    }
}

/// Cut long names and mark the cut with "...".
fn shorten_name(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_LEN {
        return name.to_string();
    }

    let head: String = name.chars().take(MAX_NAME_LEN - 1).collect();
    let head = head.trim_end_matches(|c: char| !c.is_alphanumeric());

    if head.is_empty() {
        name.to_string()
    } else {
        format!("{head}...")
    }
}

pub fn render(conditions: &WeatherConditions, units: DisplayUnits) -> String {
    let temperature = units.temperature();
    let speed = units.speed();
    let percent = Scale::new(Unit::Percent, 0);

    let mut name = shorten_name(&conditions.location_name);
    if name.is_empty() {
        name = "Unknown location".to_string();
    }
    if !conditions.station_id.is_empty() {
        name = format!("{name} ({})", conditions.station_id);
    }

    let observed = conditions
        .observation_time
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M %Z").to_string())
        .unwrap_or_else(|| "n/a".to_string());

    let mut wind = format!(
        "{} (gusts {})",
        speed.format(conditions.wind_speed),
        speed.format(conditions.wind_gust_speed)
    );
    if let Some(direction) = conditions.wind_direction {
        wind.push_str(&format!(" from {direction:.0}°"));
    }

    let mut out = String::new();
    let _ = writeln!(out, "{name}");
    let _ = writeln!(out, "Observed:    {observed}");
    let _ = writeln!(out, "Conditions:  {}", conditions.icon.theme_name());
    let _ = writeln!(
        out,
        "Temperature: {} (feels like {})",
        temperature.format(conditions.temperature),
        temperature.format(conditions.wind_chill)
    );
    let _ = writeln!(out, "Wind:        {wind}");
    let _ = writeln!(out, "Humidity:    {}", percent.format(conditions.humidity));
    let _ = writeln!(out, "Dew point:   {}", temperature.format(conditions.dew_point));
    let _ = writeln!(out, "Visibility:  {}", units.distance().format(conditions.visibility));
    let _ = writeln!(out, "Pressure:    {}", units.pressure().format(conditions.pressure));
    out
}
