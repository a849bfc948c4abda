use thiserror::Error;

/// Failure reported by an [`HttpTransport`](crate::transport::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete in time. Retried by the client.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The caller's cancellation token fired while the request was in flight.
    #[error("request was cancelled")]
    Cancelled,

    /// Any other failure: connect refused, TLS, broken body stream, ...
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the access token.
        let e = e.without_url();
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Request(format!("connection failed: {e}"))
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Errors surfaced by [`OpenWeatherClient`](crate::OpenWeatherClient).
///
/// API-level non-answers (exhausted retries, a rejected status) are not
/// errors; they come back as `Ok(None)` or as a
/// [`FetchOutcome`](crate::FetchOutcome) variant.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("network connectivity is unavailable")]
    NetworkUnavailable,

    #[error("failed to parse OpenWeather response: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("weather request was cancelled")]
    Cancelled,

    #[error("client has been disposed")]
    Disposed,

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Transport(TransportError),
}

impl WeatherError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        WeatherError::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = WeatherError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_classified() {
        assert!(TransportError::Timeout("slow".into()).is_timeout());
        assert!(!TransportError::Cancelled.is_timeout());
        assert!(!TransportError::Request("refused".into()).is_timeout());
    }

    #[test]
    fn deserialize_error_converts() {
        let err: WeatherError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, WeatherError::Deserialize(_)));
        assert!(err.to_string().starts_with("failed to parse OpenWeather response"));
    }

    #[test]
    fn transport_error_is_transparent() {
        let err = WeatherError::Transport(TransportError::Request("connection refused".into()));
        assert_eq!(err.to_string(), "request failed: connection refused");
    }
}
