use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical weather condition, independent of provider vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    #[default]
    Clear,
    ClearNight,
    FewClouds,
    FewCloudsNight,
    Overcast,
    Showers,
    ShowersScattered,
    Fog,
    Snow,
    Storm,
    SevereAlert,
}

impl WeatherIcon {
    /// Night counterpart of a daytime icon, or the icon itself when the
    /// condition looks the same after dark.
    pub fn night(self) -> Self {
        match self {
            WeatherIcon::Clear => WeatherIcon::ClearNight,
            WeatherIcon::FewClouds => WeatherIcon::FewCloudsNight,
            other => other,
        }
    }

    /// Freedesktop icon-theme name for this condition.
    pub fn theme_name(self) -> &'static str {
        match self {
            WeatherIcon::Clear => "weather-clear",
            WeatherIcon::ClearNight => "weather-clear-night",
            WeatherIcon::FewClouds => "weather-few-clouds",
            WeatherIcon::FewCloudsNight => "weather-few-clouds-night",
            WeatherIcon::Overcast => "weather-overcast",
            WeatherIcon::Showers => "weather-showers",
            WeatherIcon::ShowersScattered => "weather-showers-scattered",
            WeatherIcon::Fog => "weather-fog",
            WeatherIcon::Snow => "weather-snow",
            WeatherIcon::Storm => "weather-storm",
            WeatherIcon::SevereAlert => "weather-severe-alert",
        }
    }
}

/// A single observation in SI units.
///
/// Every measurement is `None` when the provider did not report it (or
/// reported it as not available). Units are fixed:
/// temperatures in kelvin, pressure in pascal, speeds in m/s, wind
/// direction in degrees the wind blows *from*, humidity in percent,
/// distances and elevation in meters, coordinates in degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub location_name: String,
    pub station_id: String,
    pub observation_time: Option<DateTime<Utc>>,
    pub icon: WeatherIcon,

    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_chill: Option<f64>,
    pub humidity: Option<f64>,
    pub dew_point: Option<f64>,
    pub visibility: Option<f64>,

    pub station_latitude: Option<f64>,
    pub station_longitude: Option<f64>,
    pub station_elevation: Option<f64>,
}

impl WeatherConditions {
    /// Legacy numeric marker for "not available".
    pub const UNKNOWN: f64 = -1.0;

    pub fn builder() -> WeatherConditionsBuilder {
        WeatherConditionsBuilder::default()
    }

    /// Value of a measurement with [`Self::UNKNOWN`] standing in for `None`.
    pub fn sentinel(value: Option<f64>) -> f64 {
        value.unwrap_or(Self::UNKNOWN)
    }

    pub fn measurement(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Temperature => self.temperature,
            Quantity::Pressure => self.pressure,
            Quantity::WindSpeed => self.wind_speed,
            Quantity::WindGustSpeed => self.wind_gust_speed,
            Quantity::WindDirection => self.wind_direction,
            Quantity::WindChill => self.wind_chill,
            Quantity::Humidity => self.humidity,
            Quantity::DewPoint => self.dew_point,
            Quantity::Visibility => self.visibility,
            Quantity::StationLatitude => self.station_latitude,
            Quantity::StationLongitude => self.station_longitude,
            Quantity::StationElevation => self.station_elevation,
        }
    }

    fn measurement_mut(&mut self, quantity: Quantity) -> &mut Option<f64> {
        match quantity {
            Quantity::Temperature => &mut self.temperature,
            Quantity::Pressure => &mut self.pressure,
            Quantity::WindSpeed => &mut self.wind_speed,
            Quantity::WindGustSpeed => &mut self.wind_gust_speed,
            Quantity::WindDirection => &mut self.wind_direction,
            Quantity::WindChill => &mut self.wind_chill,
            Quantity::Humidity => &mut self.humidity,
            Quantity::DewPoint => &mut self.dew_point,
            Quantity::Visibility => &mut self.visibility,
            Quantity::StationLatitude => &mut self.station_latitude,
            Quantity::StationLongitude => &mut self.station_longitude,
            Quantity::StationElevation => &mut self.station_elevation,
        }
    }
}

/// The numeric fields of [`WeatherConditions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    Pressure,
    WindSpeed,
    WindGustSpeed,
    WindDirection,
    WindChill,
    Humidity,
    DewPoint,
    Visibility,
    StationLatitude,
    StationLongitude,
    StationElevation,
}

impl Quantity {
    pub const fn all() -> &'static [Quantity] {
        &[
            Quantity::Temperature,
            Quantity::Pressure,
            Quantity::WindSpeed,
            Quantity::WindGustSpeed,
            Quantity::WindDirection,
            Quantity::WindChill,
            Quantity::Humidity,
            Quantity::DewPoint,
            Quantity::Visibility,
            Quantity::StationLatitude,
            Quantity::StationLongitude,
            Quantity::StationElevation,
        ]
    }
}

/// Scratch state filled while a response is streamed.
///
/// Starts with every measurement unknown and the default icon. Values
/// handed to it must already be in SI units.
#[derive(Debug, Default)]
pub struct WeatherConditionsBuilder {
    conditions: WeatherConditions,
}

impl WeatherConditionsBuilder {
    pub fn location_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.conditions.location_name = name.into();
        self
    }

    pub fn station_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.conditions.station_id = id.into();
        self
    }

    pub fn observation_time(&mut self, time: Option<DateTime<Utc>>) -> &mut Self {
        if time.is_some() {
            self.conditions.observation_time = time;
        }
        self
    }

    pub fn icon(&mut self, icon: WeatherIcon) -> &mut Self {
        self.conditions.icon = icon;
        self
    }

    /// Store a measurement unless one was already recorded for `quantity`.
    ///
    /// `None` never claims the field, so a later synonym may still fill it.
    pub fn measurement(&mut self, quantity: Quantity, value: Option<f64>) -> &mut Self {
        let slot = self.conditions.measurement_mut(quantity);
        if slot.is_none() {
            *slot = value;
        }
        self
    }

    pub fn build(self) -> WeatherConditions {
        self.conditions
    }
}

/// Something a provider reports back after a dispatched request completes.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherEvent {
    CurrentConditions(WeatherConditions),
    LocationAutocomplete(Vec<String>),
}
