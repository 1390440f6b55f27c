use crate::config::AppConfig;
use log::{debug, warn};
use serde_json::Value;
use tour_core::error::HttpError;

/// Blocking HTTP client for the upstream behind `GET /uuid`.
///
/// Every failure is reported as `HttpError` with 502 status, so handlers can
/// return it as is.
#[derive(Clone)]
pub struct UpstreamClient {
    agent: ureq::Agent,
    url: String,
}

impl UpstreamClient {
    pub fn new(config: &AppConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.upstream_timeout)
            .build();

        Self {
            agent,
            url: config.uuid_url.clone(),
        }
    }

    /// Fetches configured URL and parses its body as JSON.
    pub fn fetch_json(&self) -> anyhow::Result<Value> {
        debug!("GET {}", self.url);

        let response = match self.agent.get(&self.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                warn!("upstream {} answered {}", self.url, code);
                return Err(HttpError::bad_gateway(format!("upstream answered {}", code)).into());
            }
            Err(ureq::Error::Transport(transport)) => {
                warn!("upstream {} unreachable: {}", self.url, transport);
                return Err(HttpError::bad_gateway("upstream unreachable").into());
            }
        };

        let body = response
            .into_string()
            .map_err(|e| HttpError::bad_gateway(format!("could not read upstream body: {}", e)))?;

        let value = serde_json::from_str(&body)
            .map_err(|e| HttpError::bad_gateway(format!("upstream body is not JSON: {}", e)))?;
        Ok(value)
    }
}
