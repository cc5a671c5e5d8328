//! OpenWeatherMap current weather, requested with `mode=xml`.
//!
//! Unlike Weather Underground, values live in attributes and carry their
//! unit next to them (`<temperature value="20" unit="celsius"/>`).

use chrono::{NaiveDateTime, TimeZone, Utc};
use reqwest::Url;
use tracing::{debug, warn};

use crate::{
    fetch::{Fetcher, RequestKind},
    model::{Quantity, WeatherConditions, WeatherConditionsBuilder, WeatherEvent, WeatherIcon},
    provider::{ProviderId, ProviderSettings, WeatherProvider},
    units::{Unit, reading_to_si},
    xml::{Element, Tag, XmlStream},
};

const API_BASE: &str = "https://api.openweathermap.org";

/// Condition codes for tornadoes, squalls and the legacy "extreme" group.
const SEVERE_CODES: &[u32] = &[771, 781, 900, 901, 902, 903, 904, 905, 906];

const ICONS: &[(&str, WeatherIcon)] = &[
    ("01", WeatherIcon::Clear),
    ("02", WeatherIcon::FewClouds),
    ("03", WeatherIcon::Overcast),
    ("04", WeatherIcon::Overcast),
    ("09", WeatherIcon::Showers),
    ("10", WeatherIcon::ShowersScattered),
    ("11", WeatherIcon::Storm),
    ("13", WeatherIcon::Snow),
    ("50", WeatherIcon::Fog),
];

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    settings: ProviderSettings,
    fetcher: Fetcher,
}

impl OpenWeatherProvider {
    /// The provider orders its own requests; see [`Fetcher::scoped`].
    pub fn new(settings: ProviderSettings, fetcher: &Fetcher) -> Self {
        Self {
            settings,
            fetcher: fetcher.scoped(),
        }
    }

    fn conditions_url(&self, api_key: &str, location: &str) -> Option<Url> {
        let base = self.settings.base_url.as_deref().unwrap_or(API_BASE);

        let mut url = Url::parse(&format!("{base}/data/2.5/weather"))
            .map_err(|e| warn!(base, error = %e, "cannot build OpenWeather URL"))
            .ok()?;

        {
            let mut query = url.query_pairs_mut();
            match coordinates(location) {
                Some((lat, lon)) => query.append_pair("lat", lat).append_pair("lon", lon),
                None => query.append_pair("q", location),
            };
            query.append_pair("appid", api_key).append_pair("mode", "xml");
        }

        Some(url)
    }
}

/// Split `"51.5,-0.12"` into latitude and longitude.
fn coordinates(location: &str) -> Option<(&str, &str)> {
    let (lat, lon) = location.split_once(',')?;
    let (lat, lon) = (lat.trim(), lon.trim());
    (lat.parse::<f64>().is_ok() && lon.parse::<f64>().is_ok()).then_some((lat, lon))
}

impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    fn fetch_current_conditions(&self) -> bool {
        let Some(api_key) = self.settings.api_key() else {
            debug!(provider = %self.id(), "no API key configured; not fetching");
            return false;
        };

        // No IP geolocation on this service.
        if self.settings.location.is_empty() {
            debug!(provider = %self.id(), "no location configured; not fetching");
            return false;
        }

        let Some(url) = self.conditions_url(api_key, &self.settings.location) else {
            return false;
        };

        debug!(
            provider = %self.id(),
            location = %self.settings.location,
            "fetching current conditions"
        );
        self.fetcher.dispatch(RequestKind::CurrentConditions, url, |body| {
            WeatherEvent::CurrentConditions(parse_current_conditions(body))
        })
    }

    fn fetch_forecast_conditions(&self) -> bool {
        false
    }

    fn fetch_location_autocomplete(&self, _query: &str) -> bool {
        false
    }
}

fn temperature_unit(unit: Option<&str>) -> Unit {
    match unit.map(str::to_ascii_lowercase).as_deref() {
        Some("celsius" | "metric") => Unit::Celsius,
        Some("fahrenheit" | "imperial") => Unit::Fahrenheit,
        _ => Unit::Kelvin,
    }
}

fn speed_unit(unit: Option<&str>) -> Unit {
    match unit.map(str::to_ascii_lowercase).as_deref() {
        Some("mph" | "miles/hour" | "imperial") => Unit::MilesPerHour,
        _ => Unit::MetersPerSecond,
    }
}

fn value(element: &Element, unit: Unit) -> Option<f64> {
    element.attribute("value").and_then(|v| reading_to_si(v, unit))
}

/// Parse a `mode=xml` current weather response.
///
/// Never fails: missing, unavailable or malformed fields stay unknown.
pub fn parse_current_conditions(body: &[u8]) -> WeatherConditions {
    let mut xml = XmlStream::new(body);
    let mut conditions = WeatherConditions::builder();
    let mut city = String::new();
    let mut country = String::new();

    while let Some(tag) = xml.next_tag() {
        let Tag::Open(element) = tag else { continue };

        match element.name() {
            "city" => {
                if let Some(id) = element.attribute("id") {
                    conditions.station_id(id.trim());
                }
                city = element.attribute("name").unwrap_or_default().trim().to_string();
            }
            "country" => country = xml.read_text().trim().to_string(),
            "coord" => {
                let degrees = |key: &str| {
                    element
                        .attribute(key)
                        .and_then(|v| reading_to_si(v, Unit::Degrees))
                };
                conditions
                    .measurement(Quantity::StationLatitude, degrees("lat"))
                    .measurement(Quantity::StationLongitude, degrees("lon"));
            }
            "temperature" => {
                let unit = temperature_unit(element.attribute("unit"));
                conditions.measurement(Quantity::Temperature, value(&element, unit));
            }
            "feels_like" => {
                let unit = temperature_unit(element.attribute("unit"));
                conditions.measurement(Quantity::WindChill, value(&element, unit));
            }
            "humidity" => {
                conditions.measurement(Quantity::Humidity, value(&element, Unit::Percent));
            }
            "pressure" => {
                conditions.measurement(Quantity::Pressure, value(&element, Unit::Hectopascal));
            }
            "visibility" => {
                conditions.measurement(Quantity::Visibility, value(&element, Unit::Meters));
            }
            "wind" if !element.is_empty() => parse_wind(&mut xml, &mut conditions),
            "weather" => {
                let number = element.attribute("number");
                if let Some(icon) = icon_for(number, element.attribute("icon")) {
                    conditions.icon(icon);
                }
            }
            "lastupdate" => {
                let time = element
                    .attribute("value")
                    .and_then(|v| NaiveDateTime::parse_from_str(v.trim(), "%Y-%m-%dT%H:%M:%S").ok())
                    .map(|naive| Utc.from_utc_datetime(&naive));
                conditions.observation_time(time);
            }
            _ => {}
        }
    }

    let location = match (city.is_empty(), country.is_empty()) {
        (false, false) => format!("{city}, {country}"),
        (false, true) => city,
        _ => String::new(),
    };
    conditions.location_name(location);

    conditions.build()
}

/// `<wind>` block; gusts share the unit announced on `<speed>`.
fn parse_wind(xml: &mut XmlStream<'_>, conditions: &mut WeatherConditionsBuilder) {
    let mut unit = Unit::MetersPerSecond;

    while let Some(tag) = xml.next_tag() {
        let element = match tag {
            Tag::Close(name) if name == "wind" => return,
            Tag::Close(_) => continue,
            Tag::Open(element) => element,
        };

        match element.name() {
            "speed" => {
                unit = speed_unit(element.attribute("unit"));
                conditions.measurement(Quantity::WindSpeed, value(&element, unit));
            }
            "gusts" => {
                conditions.measurement(Quantity::WindGustSpeed, value(&element, unit));
            }
            "direction" => {
                conditions.measurement(Quantity::WindDirection, value(&element, Unit::Bearing));
            }
            _ => {}
        }
    }
}

fn icon_for(number: Option<&str>, icon: Option<&str>) -> Option<WeatherIcon> {
    if number
        .and_then(|n| n.trim().parse::<u32>().ok())
        .is_some_and(|n| SEVERE_CODES.contains(&n))
    {
        return Some(WeatherIcon::SevereAlert);
    }

    let icon = icon?.trim();
    let night = icon.ends_with('n');
    let code = icon.trim_end_matches(['d', 'n']);

    let mapped = ICONS.iter().find(|(c, _)| *c == code).map(|&(_, icon)| icon);
    if mapped.is_none() {
        debug!(icon, "unmapped OpenWeather icon");
    }

    mapped.map(|icon| if night { icon.night() } else { icon })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const CURRENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<current>
  <city id="2643743" name="London">
    <coord lon="-0.13" lat="51.51"/>
    <country>GB</country>
    <timezone>0</timezone>
    <sun rise="2017-01-30T07:40:36" set="2017-01-30T16:47:56"/>
  </city>
  <temperature value="20" min="18" max="21" unit="celsius"/>
  <feels_like value="19.5" unit="celsius"/>
  <humidity value="81" unit="%"/>
  <pressure value="1012" unit="hPa"/>
  <wind>
    <speed value="4.6" unit="m/s" name="Gentle Breeze"/>
    <gusts value="7.2"/>
    <direction value="90" code="E" name="East"/>
  </wind>
  <clouds value="90" name="overcast clouds"/>
  <visibility value="10000"/>
  <precipitation mode="no"/>
  <weather number="500" value="light rain" icon="10n"/>
  <lastupdate value="2017-01-30T15:50:00"/>
</current>"#;

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|v| (v - expected).abs() < 1e-6)
    }

    #[test]
    fn attributes_are_converted_to_si() {
        let c = parse_current_conditions(CURRENT.as_bytes());

        assert_eq!(c.station_id, "2643743");
        assert_eq!(c.location_name, "London, GB");
        assert_eq!(
            c.observation_time.map(|t| t.to_rfc3339()),
            Some("2017-01-30T15:50:00+00:00".to_string())
        );
        assert_eq!(c.icon, WeatherIcon::ShowersScattered);

        assert!(close(c.temperature, 293.15));
        assert!(close(c.wind_chill, 292.65));
        assert!(close(c.humidity, 81.0));
        assert!(close(c.pressure, 101_200.0));
        assert!(close(c.wind_speed, 4.6));
        assert!(close(c.wind_gust_speed, 7.2));
        assert!(close(c.wind_direction, 90.0));
        assert!(close(c.visibility, 10_000.0));
        assert!(close(c.station_latitude, 51.51));
        assert!(close(c.station_longitude, -0.13));
        assert_eq!(c.station_elevation, None);
    }

    #[test]
    fn kelvin_is_the_default_temperature_unit() {
        let doc = r#"<current><temperature value="280.15"/></current>"#;
        assert!(close(parse_current_conditions(doc.as_bytes()).temperature, 280.15));

        let doc = r#"<current><temperature value="50" unit="fahrenheit"/></current>"#;
        assert!(close(parse_current_conditions(doc.as_bytes()).temperature, 283.15));
    }

    #[test]
    fn imperial_gusts_follow_speed_unit() {
        let doc = r#"<current>
            <wind><speed value="10" unit="mph"/><gusts value="20"/></wind>
        </current>"#;
        let c = parse_current_conditions(doc.as_bytes());

        assert!(close(c.wind_speed, 4.4704));
        assert!(close(c.wind_gust_speed, 8.9408));
    }

    #[test]
    fn wind_scope_does_not_leak() {
        let doc = r#"<current><wind/><direction value="45"/><speed value="3"/></current>"#;
        let c = parse_current_conditions(doc.as_bytes());

        assert_eq!(c.wind_direction, None);
        assert_eq!(c.wind_speed, None);
    }

    #[test]
    fn missing_values_stay_unknown() {
        let doc = r#"<current>
            <city name="Nowhere"/><humidity unit="%"/><visibility value="N/A"/>
        </current>"#;
        let c = parse_current_conditions(doc.as_bytes());

        assert_eq!(c.location_name, "Nowhere");
        assert_eq!(c.humidity, None);
        assert_eq!(c.visibility, None);
        assert_eq!(c.icon, WeatherIcon::Clear);
    }

    #[test]
    fn icon_codes() {
        assert_eq!(icon_for(Some("800"), Some("01d")), Some(WeatherIcon::Clear));
        assert_eq!(icon_for(Some("800"), Some("01n")), Some(WeatherIcon::ClearNight));
        assert_eq!(icon_for(Some("801"), Some("02n")), Some(WeatherIcon::FewCloudsNight));
        assert_eq!(icon_for(Some("804"), Some("04n")), Some(WeatherIcon::Overcast));
        assert_eq!(icon_for(Some("211"), Some("11d")), Some(WeatherIcon::Storm));
        assert_eq!(icon_for(Some("781"), Some("50d")), Some(WeatherIcon::SevereAlert));
        assert_eq!(icon_for(None, Some("99d")), None);
        assert_eq!(icon_for(None, None), None);
    }

    #[tokio::test]
    async fn refuses_without_location_or_key() {
        let (fetcher, _rx) = Fetcher::new(Arc::new(crate::fetch::HttpTransport::new()));

        let no_key = OpenWeatherProvider::new(
            ProviderSettings {
                location: "London".into(),
                ..Default::default()
            },
            &fetcher,
        );
        assert!(!no_key.fetch_current_conditions());

        let blank_key = OpenWeatherProvider::new(
            ProviderSettings {
                api_key: Some("  ".into()),
                location: "London".into(),
                ..Default::default()
            },
            &fetcher,
        );
        assert!(!blank_key.fetch_current_conditions());

        let no_location = OpenWeatherProvider::new(
            ProviderSettings {
                api_key: Some("k".into()),
                ..Default::default()
            },
            &fetcher,
        );
        assert!(!no_location.fetch_current_conditions());
        assert!(!no_location.fetch_location_autocomplete("Lon"));
        assert!(!no_location.fetch_forecast_conditions());
    }

    #[test]
    fn url_uses_coordinates_when_given() {
        let (fetcher, _rx) = Fetcher::new(Arc::new(crate::fetch::HttpTransport::new()));
        let provider = OpenWeatherProvider::new(ProviderSettings::default(), &fetcher);

        let url = provider.conditions_url("K", "51.5, -0.12").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.openweathermap.org/data/2.5/weather?lat=51.5&lon=-0.12&appid=K&mode=xml"
        );

        let url = provider.conditions_url("K", "London,GB").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.openweathermap.org/data/2.5/weather?q=London%2CGB&appid=K&mode=xml"
        );
    }
}
