//! Engine delegating to a Kroki-compatible rendering server.

use super::{Engine, EngineResult, Layout, Options};
use crate::error::EngineError;
use crate::rasterizer::Rasterizer;
use gvrender_config::Config;
use gvrender_config::config::DEFAULT_SERVER_URL;
use std::time::Duration;
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

/// Maximum accepted response body (10 MB).
const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts DOT source to `{url}/graphviz/svg` and returns the SVG body.
///
/// Only SVG output and the `dot` layout are available this way.
pub struct ServerEngine {
    url: String,
    timeout: Duration,
}

impl Default for ServerEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl ServerEngine {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server.url.trim()).with_timeout(config.server_timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn agent(&self) -> Agent {
        let tls_config = TlsConfig::builder()
            .provider(TlsProvider::NativeTls)
            .root_certs(RootCerts::PlatformVerifier)
            .build();

        Agent::config_builder()
            .tls_config(tls_config)
            .timeout_global(Some(self.timeout))
            .build()
            .into()
    }
}

/// Accept only absolute http(s) URLs with a host.
fn validate_url(url: &str) -> Result<(), EngineError> {
    let parsed = url::Url::parse(url)
        .map_err(|e| EngineError::NetworkError(format!("invalid server URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(EngineError::NetworkError(format!(
                "unsupported URL scheme '{scheme}' for server '{url}'"
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(EngineError::NetworkError(format!(
            "server URL '{url}' has no host"
        )));
    }
    Ok(())
}

/// Run an HTTP exchange, turning a TLS-provider panic into a network error.
fn guarded<T>(f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    // ureq may panic if the TLS provider isn't available at runtime
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or_else(|_| {
        Err(EngineError::NetworkError(
            "HTTP client panicked (TLS provider unavailable?)".to_string(),
        ))
    })
}

impl Engine for ServerEngine {
    fn name(&self) -> &str {
        "server"
    }

    fn init(&self) -> Result<(), EngineError> {
        validate_url(&self.url)?;
        let health = format!("{}/health", self.url);
        guarded(|| {
            let response = self
                .agent()
                .get(&health)
                .call()
                .map_err(|e| EngineError::NetworkError(format!("{health}: {e}")))?;
            crate::debug_info!("ENGINE", "server: {} -> {}", health, response.status());
            Ok(())
        })
    }

    fn execute(
        &self,
        source: &str,
        options: &Options,
        _rasterizer: Option<&dyn Rasterizer>,
    ) -> Result<EngineResult, EngineError> {
        if !options.kind.is_svg() {
            return Err(EngineError::Unsupported(format!(
                "server engine only produces SVG, not {}",
                options.kind
            )));
        }
        if options.layout != Layout::Dot {
            return Err(EngineError::Unsupported(format!(
                "server engine only supports the dot layout, not {}",
                options.layout
            )));
        }

        let endpoint = format!("{}/graphviz/svg", self.url);
        crate::debug_log!("ENGINE", "server: POST {} ({} bytes)", endpoint, source.len());
        guarded(|| {
            let response = self
                .agent()
                .post(&endpoint)
                .header("Content-Type", "text/plain")
                .send(source.as_bytes())
                .map_err(|e| EngineError::NetworkError(format!("{endpoint}: {e}")))?;
            let body = response
                .into_body()
                .with_config()
                .limit(MAX_RESPONSE_SIZE)
                .read_to_string()
                .map_err(|e| EngineError::NetworkError(format!("{endpoint}: {e}")))?;
            if body.trim().is_empty() {
                return Err(EngineError::RenderFailed(
                    "server returned an empty response".to_string(),
                ));
            }
            Ok(EngineResult::Text(body))
        })
    }
}
