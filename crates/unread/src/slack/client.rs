//! Slack Web API HTTP client
//!
//! Every call is a form-encoded POST carrying the token plus call-specific
//! fields. Uses synchronous HTTP (ureq) to be executor-agnostic; async callers
//! run it on a blocking thread.

use log::error;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

/// The only response content type accepted as a valid API answer
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Authenticated access to the Web API
///
/// Implementations never retry; retry policy belongs to the caller.
pub trait SlackApi: Send + Sync {
    /// Call `method` with `token` and `params`, returning the JSON payload of
    /// a successful (`ok: true`) response.
    fn call(&self, token: &str, method: &str, params: &[(String, String)]) -> Result<Value>;
}

/// Web API client over ureq
pub struct SlackClient {
    base_url: String,
    agent: ureq::Agent,
}

impl SlackClient {
    /// Default Web API base URL
    pub const BASE_URL: &'static str = "https://slack.com/api";

    /// Per-request timeout
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a client for the public Slack API
    pub fn new() -> Self {
        Self::with_base_url(Self::BASE_URL)
    }

    /// Create a client for a custom base URL (trailing slash optional)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::TIMEOUT))
            .http_status_as_error(true)
            .build()
            .into();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

impl Default for SlackClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackApi for SlackClient {
    fn call(&self, token: &str, method: &str, params: &[(String, String)]) -> Result<Value> {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
        form.push(("token", token));
        form.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut response = self
            .agent
            .post(&self.method_url(method))
            .send_form(form)
            .map_err(|e| Error::transport(method, e))?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        check_content_type(method, content_type.as_deref())?;

        let json: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| Error::transport(method, format!("invalid JSON body: {}", e)))?;

        check_envelope(method, params, json)
    }
}

/// Reject anything that isn't exactly the JSON content type, byte for byte
fn check_content_type(method: &str, content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if ct == JSON_CONTENT_TYPE => Ok(()),
        Some(ct) => Err(Error::transport(
            method,
            format!("unexpected content type: {}", ct),
        )),
        None => Err(Error::transport(method, "missing content type")),
    }
}

/// Unwrap the `{ ok, error }` envelope
fn check_envelope(method: &str, params: &[(String, String)], json: Value) -> Result<Value> {
    match json.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(json),
        _ => {
            let code = json
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            // `params` never holds the token
            error!("Slack API call {} failed: {} (params: {:?})", method, code, params);
            Err(Error::Api {
                method: method.to_string(),
                code,
            })
        }
    }
}
