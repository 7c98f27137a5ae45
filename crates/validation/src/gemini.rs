//! Gemini key probe: the key travels as a query parameter, and the error
//! body is inspected to tell a bad key from a permissions problem.

use reqwest::StatusCode;
use tracing::debug;

use crate::{Outcome, provider_error_detail};

pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CORS_NOTICE: &str = "Could not verify key from browser (potential CORS issue). Key will be \
                           saved; please test with an actual API call.";

pub(crate) async fn validate(http: &reqwest::Client, base_url: &str, api_key: &str) -> Outcome {
    let url = format!("{base_url}/models?key={}", urlencoding::encode(api_key));
    let response = match http.get(url).send().await {
        Ok(response) => response,
        Err(error) => {
            // Gemini's CORS support is inconsistent; an opaque transport
            // failure is classified as accepted-but-unverified.
            debug!(error = %error, "gemini probe transport failure");
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
    let lowered = detail.to_lowercase();
    if status == StatusCode::BAD_REQUEST && lowered.contains("api key not valid") {
        return Outcome::Invalid(
            "Google Gemini API key is not valid. Please check the key and try again.".to_string(),
        );
    }
    if status == StatusCode::FORBIDDEN && lowered.contains("permission denied") {
        return Outcome::Invalid(
            "Google Gemini API key is valid but lacks permissions for this operation, or the API \
             is not enabled."
                .to_string(),
        );
    }
    Outcome::Invalid(format!(
        "Validation error ({}): {detail}",
        status.as_u16()
    ))
}
