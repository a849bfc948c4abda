use std::{
    fmt,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use tokio::{runtime::Runtime, sync::Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ClientConfig,
    connectivity::{AssumeReachable, ConnectivityProbe, TcpProbe},
    error::{Result, TransportError, WeatherError},
    model::{WeatherQuery, WeatherResponse},
    transport::{HttpTransport, ReqwestTransport},
};

/// How a fetch ended when it did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(WeatherResponse),
    /// The provider answered with a non-timeout error status. Not retried.
    Rejected { status: u16, body: String },
    /// Every attempt timed out or came back empty.
    Exhausted { attempts: u32 },
}

impl FetchOutcome {
    pub fn into_response(self) -> Option<WeatherResponse> {
        match self {
            FetchOutcome::Found(response) => Some(response),
            FetchOutcome::Rejected { .. } | FetchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }
}

/// Client for the OpenWeather current-weather endpoint.
///
/// Fetches are serialized: a single-permit semaphore guards the shared
/// transport, so at most one retry loop runs at a time. Tokio's semaphore
/// is fair, so callers waiting on it are served in arrival order.
///
/// Call [`dispose`](Self::dispose) to release the transport early; later
/// fetches fail with [`WeatherError::Disposed`].
pub struct OpenWeatherClient {
    api_key: String,
    config: ClientConfig,
    probe: Arc<dyn ConnectivityProbe>,
    resources: Mutex<Option<Arc<Resources>>>,
    blocking_runtime: OnceLock<Runtime>,
}

#[derive(Debug)]
struct Resources {
    transport: Box<dyn HttpTransport>,
    gate: Semaphore,
}

pub struct OpenWeatherClientBuilder {
    api_key: String,
    config: ClientConfig,
    transport: Option<Box<dyn HttpTransport>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
}

impl OpenWeatherClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a preconfigured transport instead of the default reqwest one.
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn probe(mut self, probe: impl ConnectivityProbe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    pub fn skip_connectivity_check(self) -> Self {
        self.probe(AssumeReachable)
    }

    /// Validates settings. Performs no network I/O.
    pub fn build(self) -> Result<OpenWeatherClient> {
        if self.api_key.trim().is_empty() {
            return Err(WeatherError::invalid("access token must not be empty"));
        }
        self.config.validate()?;

        let transport: Box<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Box::new(
                ReqwestTransport::new(&self.config.user_agent).map_err(WeatherError::Transport)?,
            ),
        };
        let probe = self.probe.unwrap_or_else(|| {
            Arc::new(TcpProbe::new(self.config.probe_address, self.config.probe_timeout()))
        });

        Ok(OpenWeatherClient {
            api_key: self.api_key,
            config: self.config,
            probe,
            resources: Mutex::new(Some(Arc::new(Resources { transport, gate: Semaphore::new(1) }))),
            blocking_runtime: OnceLock::new(),
        })
    }
}

impl OpenWeatherClient {
    /// Client with default settings, reqwest transport and TCP connectivity probe.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> OpenWeatherClientBuilder {
        OpenWeatherClientBuilder {
            api_key: api_key.into(),
            config: ClientConfig::default(),
            transport: None,
            probe: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current weather for `query`, retrying up to the configured `max_retries`.
    ///
    /// `Ok(None)` means the provider had no answer: retries ran out or it
    /// rejected the request. Use [`fetch_outcome`](Self::fetch_outcome) to
    /// tell the two apart.
    pub async fn fetch_weather(
        &self,
        query: &WeatherQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<WeatherResponse>> {
        self.fetch_weather_with_retries(query, cancel, self.config.max_retries).await
    }

    pub async fn fetch_weather_with_retries(
        &self,
        query: &WeatherQuery,
        cancel: &CancellationToken,
        max_retries: u32,
    ) -> Result<Option<WeatherResponse>> {
        self.fetch_outcome(query, cancel, max_retries).await.map(FetchOutcome::into_response)
    }

    /// Validate, probe connectivity, wait for the gate, then run at most
    /// `max_retries` attempts against the endpoint.
    #[instrument(
        name = "fetch_weather",
        skip_all,
        fields(zip = query.postal_code, country = %query.country_code, max_retries = max_retries)
    )]
    pub async fn fetch_outcome(
        &self,
        query: &WeatherQuery,
        cancel: &CancellationToken,
        max_retries: u32,
    ) -> Result<FetchOutcome> {
        check_request(query, max_retries)?;
        let resources = self.resources()?;

        let reachable = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WeatherError::Cancelled),
            reachable = self.probe.is_reachable() => reachable,
        };
        if !reachable {
            warn!("Connectivity probe failed, not contacting OpenWeather");
            return Err(WeatherError::NetworkUnavailable);
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WeatherError::Cancelled),
            permit = resources.gate.acquire() => permit.map_err(|_| WeatherError::Disposed)?,
        };

        let url = self.config.request_url(&self.api_key, query);
        run_attempts(resources.transport.as_ref(), &url, cancel, max_retries).await
    }

    /// Blocking form of [`fetch_weather`](Self::fetch_weather).
    ///
    /// Drives the async path with a runtime owned by the client. On a plain
    /// thread it runs on the calling thread. A thread that already carries a
    /// runtime context (e.g. inside `spawn_blocking`) cannot nest `block_on`,
    /// so the fetch is driven from a scoped helper thread while the caller waits.
    pub fn fetch_weather_blocking(&self, query: &WeatherQuery) -> Result<Option<WeatherResponse>> {
        self.fetch_weather_blocking_with_retries(query, self.config.max_retries)
    }

    pub fn fetch_weather_blocking_with_retries(
        &self,
        query: &WeatherQuery,
        max_retries: u32,
    ) -> Result<Option<WeatherResponse>> {
        check_request(query, max_retries)?;

        let runtime = self.blocking_runtime()?;
        let cancel = CancellationToken::new();
        let fetch = || runtime.block_on(self.fetch_weather_with_retries(query, &cancel, max_retries));

        if tokio::runtime::Handle::try_current().is_err() {
            return fetch();
        }
        std::thread::scope(|scope| scope.spawn(fetch).join())
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }

    /// Release the transport and close the gate. Safe to call repeatedly.
    ///
    /// A fetch already inside its retry loop finishes normally; callers
    /// still waiting for the gate get [`WeatherError::Disposed`].
    pub fn dispose(&self) {
        let taken = self.resources.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(resources) = taken {
            resources.gate.close();
            debug!("Weather client disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    fn resources(&self) -> Result<Arc<Resources>> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(WeatherError::Disposed)
    }

    fn blocking_runtime(&self) -> Result<&Runtime> {
        if let Some(runtime) = self.blocking_runtime.get() {
            return Ok(runtime);
        }

        // One worker keeps pooled connections serviced between blocking calls.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("weather-client-blocking")
            .enable_all()
            .build()
            .map_err(WeatherError::Runtime)?;

        Ok(self.blocking_runtime.get_or_init(|| runtime))
    }
}

impl fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("api_key", &"<redacted>")
            .field("config", &self.config)
            .field("probe", &self.probe)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for OpenWeatherClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.blocking_runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Argument checks shared by the async and blocking paths; no I/O.
fn check_request(query: &WeatherQuery, max_retries: u32) -> Result<()> {
    query.validate()?;
    if max_retries == 0 {
        return Err(WeatherError::invalid("max_retries must be at least 1"));
    }
    Ok(())
}

async fn run_attempts(
    transport: &dyn HttpTransport,
    url: &str,
    cancel: &CancellationToken,
    max_attempts: u32,
) -> Result<FetchOutcome> {
    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(WeatherError::Cancelled);
        }
        debug!(attempt, max_attempts, "Requesting current weather");

        let reply = match transport.get(url, cancel).await {
            Ok(reply) => reply,
            Err(TransportError::Cancelled) => return Err(WeatherError::Cancelled),
            Err(e) if e.is_timeout() => {
                debug!(attempt, "Transport timed out: {e}");
                continue;
            }
            Err(e) => return Err(WeatherError::Transport(e)),
        };

        if reply.is_timeout_status() {
            debug!(attempt, status = reply.status, "Timeout status from OpenWeather, retrying");
            continue;
        }

        if !reply.is_success() {
            warn!(
                status = reply.status,
                "OpenWeather rejected request: {}",
                truncate_body(&reply.body)
            );
            return Ok(FetchOutcome::Rejected { status: reply.status, body: reply.body });
        }

        if reply.body.trim().is_empty() {
            debug!(attempt, "Empty body from OpenWeather, retrying");
            continue;
        }

        let parsed: WeatherResponse = serde_json::from_str(&reply.body)?;
        info!(attempt, location = %parsed.name, "Fetched current weather");
        return Ok(FetchOutcome::Found(parsed));
    }

    warn!(attempts = max_attempts, "No usable answer from OpenWeather, giving up");
    Ok(FetchOutcome::Exhausted { attempts: max_attempts })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
