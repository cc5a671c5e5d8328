//! Core library for the `nimbus` weather front end.
//!
//! This crate defines:
//! - The canonical, SI-unit weather model every provider converges to
//! - Abstraction over weather providers and their response parsers
//! - Request orchestration over a pluggable transport
//! - Configuration & credentials handling
//!
//! A provider operation only starts a request; results arrive as
//! [`WeatherEvent`]s on the channel returned by [`Fetcher::new`].

pub mod config;
pub mod fetch;
pub mod model;
pub mod provider;
pub mod units;
mod xml;

pub use config::{Config, ProviderConfig};
pub use fetch::{Fetcher, HttpTransport, RequestKind, Transport, TransportError};
pub use model::{Quantity, WeatherConditions, WeatherConditionsBuilder, WeatherEvent, WeatherIcon};
pub use provider::{ProviderId, ProviderSettings, WeatherProvider};
pub use units::Unit;
