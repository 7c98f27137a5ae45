//! Per-provider API key probes and the dispatcher that routes to them.
//!
//! Each probed provider issues one GET against its capability-listing
//! endpoint and classifies the result into an [`Outcome`]. Providers whose
//! APIs cannot be probed from a browser context never hit the network and
//! classify as [`Outcome::UnverifiableCrossOrigin`]: the key is accepted
//! but unverified. Validators return outcomes, never errors: transport
//! failures are reclassified at this boundary and nothing propagates to the
//! caller as a fault.

use std::{collections::HashMap, time::Duration};

use {async_trait::async_trait, tracing::debug};

use byokay_common::ProviderId;

mod deepseek;
mod gemini;
mod openai;

/// Classification of a single validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The provider confirmed the key on its capability endpoint.
    Valid,
    /// The provider definitively rejected the key, or the user submitted an
    /// empty one. The key must not be persisted.
    Invalid(String),
    /// The probe failed the way a browser cross-origin block fails: an
    /// opaque transport error with no HTTP status. The key is accepted and
    /// persisted but stays unverified.
    UnverifiableCrossOrigin(String),
    /// A genuine network failure (DNS, timeout, offline). The key is not
    /// persisted.
    NetworkError(String),
}

impl Outcome {
    /// True for the outcomes that block persistence and the bulk close.
    #[must_use]
    pub fn is_hard_error(&self) -> bool {
        matches!(self, Self::Invalid(_) | Self::NetworkError(_))
    }

    /// The user-facing detail, when the outcome carries one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(m) | Self::UnverifiableCrossOrigin(m) | Self::NetworkError(m) => Some(m),
        }
    }
}

pub const EMPTY_KEY_MESSAGE: &str = "API key cannot be empty.";

const CLAUDE_NOTICE: &str =
    "Claude cannot be validated in the browser. Key saved; test with an API call.";

const GROK_NOTICE: &str = "Grok (xAI) doesn't allow API validation from browsers or a suitable \
                           endpoint isn't known. Your key has been saved; please test with an \
                           actual API call.";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Seam between the key lifecycle and the network probes, so callers can be
/// tested against scripted outcomes.
#[async_trait]
pub trait KeyValidation: Send + Sync {
    async fn validate(&self, provider: ProviderId, api_key: &str) -> Outcome;
}

// ── Dispatcher ─────────────────────────────────────────────────────────────

/// Routes a `(provider, key)` pair to that provider's validator.
///
/// Holds one HTTP client for all probes plus per-provider base-URL
/// overrides so tests can point a probe at a local server.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    http: reqwest::Client,
    base_urls: HashMap<ProviderId, String>,
}

impl Default for ValidationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationClient {
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_urls: HashMap::new(),
        }
    }

    /// Override the base URL probed for `provider`.
    #[must_use]
    pub fn with_base_url(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, base_url.into());
        self
    }

    fn base_url(&self, provider: ProviderId, default: &'static str) -> &str {
        self.base_urls
            .get(&provider)
            .map_or(default, String::as_str)
    }

    /// Validate `api_key` against `provider`'s policy.
    ///
    /// The empty-key rejection lives here, once, so no validator is reached
    /// with a blank key and behavior is uniform across providers.
    pub async fn validate(&self, provider: ProviderId, api_key: &str) -> Outcome {
        if api_key.trim().is_empty() {
            return Outcome::Invalid(EMPTY_KEY_MESSAGE.to_string());
        }

        let outcome = match provider {
            ProviderId::Openai => {
                let base = self.base_url(provider, openai::DEFAULT_BASE_URL);
                openai::validate(&self.http, base, api_key).await
            },
            // The Anthropic API blocks browser calls entirely; no probe is
            // attempted and the key is accepted unverified.
            ProviderId::Claude => Outcome::UnverifiableCrossOrigin(CLAUDE_NOTICE.to_string()),
            ProviderId::Gemini => {
                let base = self.base_url(provider, gemini::DEFAULT_BASE_URL);
                gemini::validate(&self.http, base, api_key).await
            },
            ProviderId::Deepseek => {
                let base = self.base_url(provider, deepseek::DEFAULT_BASE_URL);
                deepseek::validate(&self.http, base, api_key).await
            },
            // No reliable browser-reachable validation endpoint is known.
            ProviderId::Grok => Outcome::UnverifiableCrossOrigin(GROK_NOTICE.to_string()),
            ProviderId::Llama => Outcome::UnverifiableCrossOrigin(format!(
                "Validation for {} is not implemented. Key saved; please test with an API call.",
                provider.display_name()
            )),
        };

        match &outcome {
            Outcome::Valid => debug!(provider = %provider, "key probe succeeded"),
            Outcome::Invalid(message) => {
                debug!(provider = %provider, detail = %message, "provider rejected key");
            },
            Outcome::UnverifiableCrossOrigin(message) => {
                debug!(provider = %provider, detail = %message, "key accepted unverified");
            },
            Outcome::NetworkError(message) => {
                debug!(provider = %provider, detail = %message, "key probe hit a network failure");
            },
        }
        outcome
    }
}

#[async_trait]
impl KeyValidation for ValidationClient {
    async fn validate(&self, provider: ProviderId, api_key: &str) -> Outcome {
        Self::validate(self, provider, api_key).await
    }
}

// ── Shared response plumbing ───────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Provider-supplied `error.message` from an error response body, falling
/// back to the HTTP reason phrase when the body is absent or not JSON.
async fn provider_error_detail(response: reqwest::Response) -> String {
    let fallback = response
        .status()
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    match response.json::<ApiErrorBody>().await {
        Ok(body) => body.error.and_then(|e| e.message).unwrap_or(fallback),
        Err(_) => fallback,
    }
}
