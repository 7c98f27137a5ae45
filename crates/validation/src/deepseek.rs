//! DeepSeek key probe: bearer-token GET against the models listing.
//!
//! DeepSeek's API does not answer browser calls, so an opaque transport
//! failure classifies as accepted-but-unverified rather than rejection.

use reqwest::StatusCode;
use tracing::debug;

use crate::{Outcome, provider_error_detail};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

const CORS_NOTICE: &str = "DeepSeek doesn't allow API validation from browsers. Your key has \
                           been saved and will be used for API calls.";

pub(crate) async fn validate(http: &reqwest::Client, base_url: &str, api_key: &str) -> Outcome {
    let response = match http
        .get(format!("{base_url}/models"))
        .bearer_auth(api_key)
        .send()
        .await
    {
        Ok(response) => response,
        Err(error) => {
            debug!(error = %error, "deepseek probe transport failure");
            return Outcome::UnverifiableCrossOrigin(CORS_NOTICE.to_string());
        },
    };

    let status = response.status();
    if status.is_success() {
        return match response.json::<serde_json::Value>().await {
            Ok(_) => Outcome::Valid,
            Err(error) => Outcome::NetworkError(format!("Network error during validation: {error}")),
        };
    }

    let detail = provider_error_detail(response).await;
    if status == StatusCode::UNAUTHORIZED {
        return Outcome::Invalid(format!(
            "DeepSeek API key is invalid or not authorized: {detail}"
        ));
    }
    Outcome::Invalid(format!(
        "Validation error ({}): {detail}",
        status.as_u16()
    ))
}
