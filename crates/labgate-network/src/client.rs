//! HTTP client for the access decision service.
//!
//! Each accepted scan becomes one `POST` with a small JSON document:
//!
//! ```text
//! {"cardUID": "04a2b3c4", "isInside": true, "controllerId": "RASPI_001"}
//! ```
//!
//! A `200` answer carries `{"openDoor": true|false}`. A missing `openDoor`
//! field means denied.
//!
//! # Design Principles
//!
//! - **No automatic retry**: a scan is answered once or treated as denied
//! - **Connection pooling**: one `reqwest::Client` reused for every request
//! - **Bounded**: every request carries the configured timeout

use crate::decision::{Decision, DecisionError, DecisionService};
use labgate_core::constants::DEFAULT_DECISION_TIMEOUT_MS;
use labgate_core::{CardUid, Direction};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`HttpDecisionClient`]
///
/// # Example
///
/// ```
/// use labgate_network::HttpDecisionConfig;
///
/// let config = HttpDecisionConfig::default();
/// assert_eq!(config.timeout.as_millis(), 3000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpDecisionConfig {
    /// Endpoint receiving the POST
    pub url: String,

    /// Identifies this access point to the service
    pub controller_id: String,

    /// Bound on the whole request, connect included
    pub timeout: Duration,
}

impl Default for HttpDecisionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/api/access".to_string(),
            controller_id: "RASPI_001".to_string(),
            timeout: Duration::from_millis(DEFAULT_DECISION_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessRequest<'a> {
    #[serde(rename = "cardUID")]
    card_uid: String,
    is_inside: bool,
    controller_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse {
    #[serde(default)]
    open_door: bool,
}

/// HTTP access decision client
#[derive(Debug, Clone)]
pub struct HttpDecisionClient {
    http: reqwest::Client,
    url: String,
    controller_id: String,
    timeout: Duration,
}

impl HttpDecisionClient {
    /// Build the client. No connection is made until the first decision.
    ///
    /// # Errors
    ///
    /// Returns `DecisionError::Transport` if the TLS backend cannot be set up.
    pub fn new(config: HttpDecisionConfig) -> Result<Self, DecisionError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DecisionError::transport(e.to_string()))?;

        debug!(url = %config.url, controller_id = %config.controller_id, "Creating decision client");

        Ok(Self {
            http,
            url: config.url,
            controller_id: config.controller_id,
            timeout: config.timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_error(&self, error: reqwest::Error) -> DecisionError {
        if error.is_timeout() {
            DecisionError::timeout(self.timeout)
        } else if error.is_decode() {
            DecisionError::invalid_response(error.to_string())
        } else {
            DecisionError::transport(error.to_string())
        }
    }
}

impl DecisionService for HttpDecisionClient {
    async fn decide(&self, uid: &CardUid, direction: Direction) -> Result<Decision, DecisionError> {
        let request = AccessRequest {
            card_uid: uid.to_hex(),
            is_inside: direction.is_inside(),
            controller_id: &self.controller_id,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(uid = %uid, status = status.as_u16(), "Decision service rejected request");
            return Err(DecisionError::Status {
                status: status.as_u16(),
            });
        }

        let body: AccessResponse = response.json().await.map_err(|e| self.map_error(e))?;
        let decision = Decision::from_open_door(body.open_door);

        debug!(uid = %uid, direction = %direction, decision = %decision, "Decision received");
        Ok(decision)
    }
}
