use crate::{
    Config,
    fetch::Fetcher,
    provider::{openweather::OpenWeatherProvider, wunderground::WundergroundProvider},
};
use std::{convert::TryFrom, fmt::Debug};

pub mod openweather;
pub mod wunderground;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Wunderground,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Wunderground => "wunderground",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Wunderground, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "wunderground" => Ok(ProviderId::Wunderground),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: wunderground, openweather."
            )),
        }
    }
}

/// A remote source of weather data.
///
/// Every operation only *starts* a request. `true` means the request was
/// sent; the outcome arrives later as a
/// [`WeatherEvent`](crate::WeatherEvent) on the fetcher's channel.
/// `false` means nothing was sent, either because a prerequisite such as
/// the API key is missing or because the provider lacks the capability.
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    fn fetch_current_conditions(&self) -> bool;

    fn fetch_forecast_conditions(&self) -> bool;

    fn fetch_location_autocomplete(&self, query: &str) -> bool;
}

/// What a provider reads from [`Config`]. Never written back.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub location: String,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// The API key, unless it is missing or blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn from_config(id: ProviderId, config: &Config) -> Self {
        Self {
            api_key: config.provider_api_key(id).map(str::to_owned),
            location: config.location().to_owned(),
            base_url: config
                .provider_config(id)
                .and_then(|cfg| cfg.base_url.as_deref())
                .map(|url| url.trim_end_matches('/').to_owned()),
        }
    }
}

/// Construct a provider from config and explicit ProviderId.
///
/// Missing credentials are not an error here: the provider refuses to
/// fetch until they are configured.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
    fetcher: &Fetcher,
) -> Box<dyn WeatherProvider> {
    let settings = ProviderSettings::from_config(id, config);

    match id {
        ProviderId::Wunderground => Box::new(WundergroundProvider::new(settings, fetcher)),
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(settings, fetcher)),
    }
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(
    config: &Config,
    fetcher: &Fetcher,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    Ok(provider_from_config(id, config, fetcher))
}
