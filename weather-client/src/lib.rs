//! Client for the OpenWeather current-weather endpoint.
//!
//! This crate defines:
//! - The response schema of `data/2.5/weather`
//! - A client that serializes requests over one shared transport, probes
//!   connectivity first and retries timeout-class failures a bounded number of times
//! - Narrow seams for the HTTP transport and the connectivity probe, so both can be swapped
//!
//! ```no_run
//! use weather_client::{CancellationToken, OpenWeatherClient, WeatherQuery};
//!
//! # async fn run() -> Result<(), weather_client::WeatherError> {
//! let client = OpenWeatherClient::new("your-api-key")?;
//! let query = WeatherQuery::new(94040, "us");
//!
//! match client.fetch_weather(&query, &CancellationToken::new()).await? {
//!     Some(weather) => println!("{}: {} K", weather.name, weather.main.temp),
//!     None => println!("no data available"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod model;
pub mod transport;

pub use client::{FetchOutcome, OpenWeatherClient, OpenWeatherClientBuilder};
pub use config::{ClientConfig, DEFAULT_MAX_RETRIES, Units};
pub use connectivity::{AssumeReachable, ConnectivityProbe, TcpProbe};
pub use error::{TransportError, WeatherError};
pub use model::{WeatherQuery, WeatherResponse};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
pub use tokio_util::sync::CancellationToken;
