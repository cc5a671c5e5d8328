//! Weather Underground XML API.
//!
//! Current conditions come from `/api/{key}/conditions/q/{location}.xml`,
//! place-name suggestions from the key-less autocomplete service.

use chrono::{TimeZone, Utc};
use reqwest::Url;
use tracing::{debug, warn};

use crate::{
    fetch::{Fetcher, RequestKind},
    model::{Quantity, WeatherConditions, WeatherConditionsBuilder, WeatherEvent, WeatherIcon},
    provider::{ProviderId, ProviderSettings, WeatherProvider},
    units::{Unit, reading_to_si},
    xml::{Tag, XmlStream},
};

const API_BASE: &str = "http://api.wunderground.com";
const AUTOCOMPLETE_BASE: &str = "http://autocomplete.wunderground.com";

/// Location token asking the server to geolocate the caller's IP.
const AUTOIP: &str = "autoip";

/// Prefix on icon names that marks a nighttime observation.
const NIGHT_MARKER: &str = "nt_";

/// Top-level elements carrying a measurement. Several names may feed the
/// same quantity; the first one present in the document wins.
const MEASUREMENTS: &[(&str, Quantity, Unit)] = &[
    ("temp_c", Quantity::Temperature, Unit::Celsius),
    ("pressure_mb", Quantity::Pressure, Unit::Hectopascal),
    ("wind_kph", Quantity::WindSpeed, Unit::KilometersPerHour),
    ("wind_gust_kph", Quantity::WindGustSpeed, Unit::KilometersPerHour),
    ("wind_degrees", Quantity::WindDirection, Unit::ReversedBearing),
    ("windchill_c", Quantity::WindChill, Unit::Celsius),
    ("feelslike_c", Quantity::WindChill, Unit::Celsius),
    ("relative_humidity", Quantity::Humidity, Unit::Percent),
    ("dewpoint_c", Quantity::DewPoint, Unit::Celsius),
    ("visibility_km", Quantity::Visibility, Unit::Kilometers),
];

/// Measurements inside `<observation_location>`.
const STATION_MEASUREMENTS: &[(&str, Quantity, Unit)] = &[
    ("latitude", Quantity::StationLatitude, Unit::Degrees),
    ("longitude", Quantity::StationLongitude, Unit::Degrees),
    ("elevation", Quantity::StationElevation, Unit::Feet),
];

const ICONS: &[(&str, WeatherIcon)] = &[
    ("clear", WeatherIcon::Clear),
    ("sunny", WeatherIcon::Clear),
    ("partlycloudy", WeatherIcon::FewClouds),
    ("mostlysunny", WeatherIcon::FewClouds),
    ("chanceflurries", WeatherIcon::FewClouds),
    ("cloudy", WeatherIcon::Overcast),
    ("mostlycloudy", WeatherIcon::Overcast),
    ("partlysunny", WeatherIcon::Overcast),
    ("chancesnow", WeatherIcon::Overcast),
    ("rain", WeatherIcon::Showers),
    ("chancerain", WeatherIcon::ShowersScattered),
    ("chancesleet", WeatherIcon::ShowersScattered),
    ("fog", WeatherIcon::Fog),
    ("hazy", WeatherIcon::Fog),
    ("snow", WeatherIcon::Snow),
    ("flurries", WeatherIcon::Snow),
    ("sleet", WeatherIcon::Snow),
    ("tstorms", WeatherIcon::Storm),
    ("chancetstorms", WeatherIcon::Storm),
];

#[derive(Debug, Clone)]
pub struct WundergroundProvider {
    settings: ProviderSettings,
    fetcher: Fetcher,
}

impl WundergroundProvider {
    /// The provider orders its own requests; see [`Fetcher::scoped`].
    pub fn new(settings: ProviderSettings, fetcher: &Fetcher) -> Self {
        Self {
            settings,
            fetcher: fetcher.scoped(),
        }
    }

    /// `{base}/api/{key}/conditions/q/{location}.xml`, one percent-encoded
    /// path segment per `/`-separated piece of the location.
    fn conditions_url(&self, api_key: &str) -> Option<Url> {
        let mut pieces: Vec<&str> = self
            .settings
            .location
            .split('/')
            .filter(|piece| !piece.trim().is_empty())
            .collect();
        if pieces.is_empty() {
            pieces.push(AUTOIP);
        }
        let last = pieces.len() - 1;
        let document = format!("{}.xml", pieces[last]);

        let base = self.settings.base_url.as_deref().unwrap_or(API_BASE);
        let mut url = Url::parse(base)
            .map_err(|e| warn!(base, error = %e, "cannot build Weather Underground URL"))
            .ok()?;

        url.path_segments_mut()
            .map_err(|()| warn!(base, "Weather Underground base URL cannot carry a path"))
            .ok()?
            .pop_if_empty()
            .extend(["api", api_key, "conditions", "q"])
            .extend(&pieces[..last])
            .push(&document);

        Some(url)
    }

    fn autocomplete_url(&self, query: &str) -> Option<Url> {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or(AUTOCOMPLETE_BASE);

        let mut url = Url::parse(&format!("{base}/aq"))
            .map_err(|e| {
                warn!(base, error = %e, "cannot build Weather Underground autocomplete URL")
            })
            .ok()?;
        url.query_pairs_mut()
            .append_pair("format", "xml")
            .append_pair("query", query);
        Some(url)
    }
}

impl WeatherProvider for WundergroundProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Wunderground
    }

    fn fetch_current_conditions(&self) -> bool {
        let Some(api_key) = self.settings.api_key() else {
            debug!(provider = %self.id(), "no API key configured; not fetching");
            return false;
        };

        let Some(url) = self.conditions_url(api_key) else {
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

    fn fetch_location_autocomplete(&self, query: &str) -> bool {
        let Some(url) = self.autocomplete_url(query) else {
            return false;
        };

        debug!(provider = %self.id(), query, "fetching location autocomplete");
        self.fetcher.dispatch(RequestKind::LocationAutocomplete, url, |body| {
            WeatherEvent::LocationAutocomplete(parse_location_autocomplete(body))
        })
    }
}

/// Parse a `conditions` response.
///
/// Never fails: missing, unavailable or malformed fields stay unknown.
pub fn parse_current_conditions(body: &[u8]) -> WeatherConditions {
    let mut xml = XmlStream::new(body);
    let mut conditions = WeatherConditions::builder();

    while let Some(tag) = xml.next_tag() {
        let Tag::Open(element) = tag else { continue };

        match element.name() {
            "station_id" => {
                conditions.station_id(xml.read_text().trim());
            }
            "observation_epoch" => {
                let time = xml
                    .read_text()
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
                conditions.observation_time(time);
            }
            "observation_location" if !element.is_empty() => {
                parse_observation_location(&mut xml, &mut conditions);
            }
            "icon_url" => {
                if let Some(icon) = icon_from_url(&xml.read_text()) {
                    conditions.icon(icon);
                }
            }
            name => {
                if let Some(&(_, quantity, unit)) = MEASUREMENTS.iter().find(|(n, ..)| *n == name) {
                    let value = reading_to_si(&xml.read_text(), unit);
                    conditions.measurement(quantity, value);
                }
            }
        }
    }

    conditions.build()
}

/// Station metadata, bounded by `</observation_location>` so that the
/// same element names in sibling blocks are left alone.
fn parse_observation_location(xml: &mut XmlStream<'_>, conditions: &mut WeatherConditionsBuilder) {
    while let Some(tag) = xml.next_tag() {
        let element = match tag {
            Tag::Close(name) if name == "observation_location" => return,
            Tag::Close(_) => continue,
            Tag::Open(element) => element,
        };

        if element.name() == "full" {
            conditions.location_name(xml.read_text().trim());
        } else if let Some(&(_, quantity, unit)) =
            STATION_MEASUREMENTS.iter().find(|(n, ..)| *n == element.name())
        {
            let value = reading_to_si(&xml.read_text(), unit);
            conditions.measurement(quantity, value);
        }
    }
}

/// Map `http://icons.example/i/c/k/nt_partlycloudy.gif` onto a canonical icon.
fn icon_from_url(url: &str) -> Option<WeatherIcon> {
    let file = url.trim().rsplit('/').next().unwrap_or_default();
    let stem = file.split('.').next().unwrap_or_default();

    let (name, night) = match stem.strip_prefix(NIGHT_MARKER) {
        Some(name) => (name, true),
        None => (stem, false),
    };

    let icon = ICONS.iter().find(|(n, _)| *n == name).map(|&(_, icon)| icon);
    if icon.is_none() {
        debug!(icon = stem, "unmapped Weather Underground icon");
    }

    icon.map(|icon| if night { icon.night() } else { icon })
}

/// Parse an autocomplete response into place names, in document order.
pub fn parse_location_autocomplete(body: &[u8]) -> Vec<String> {
    let mut xml = XmlStream::new(body);
    let mut names = Vec::new();

    while let Some(tag) = xml.next_tag() {
        if let Tag::Open(element) = tag {
            if element.name() == "name" {
                names.push(xml.read_text());
            }
        }
    }

    names
}
