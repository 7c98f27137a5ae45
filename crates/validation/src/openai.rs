//! OpenAI key probe: bearer-token GET against the models listing.
//!
//! OpenAI's models endpoint answers browser calls, so an opaque transport
//! failure here is a real network problem, not a cross-origin block.

use reqwest::StatusCode;

use crate::{Outcome, provider_error_detail};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub(crate) async fn validate(http: &reqwest::Client, base_url: &str, api_key: &str) -> Outcome {
    let response = match http
        .get(format!("{base_url}/models"))
        .bearer_auth(api_key)
        .send()
        .await
    {
        Ok(response) => response,
        Err(error) => {
            return Outcome::NetworkError(format!(
                "Network error during OpenAI validation: {error}"
            ));
        },
    };

    let status = response.status();
    if status.is_success() {
        // A 2xx only counts with a parseable body.
        return match response.json::<serde_json::Value>().await {
            Ok(_) => Outcome::Valid,
            Err(error) => {
                Outcome::NetworkError(format!("Network error during OpenAI validation: {error}"))
            },
        };
    }

    if status == StatusCode::UNAUTHORIZED {
        return Outcome::Invalid("OpenAI API key is invalid or lacks permissions.".to_string());
    }

    let detail = provider_error_detail(response).await;
    Outcome::Invalid(format!(
        "OpenAI API Validation Error ({}): {detail}",
        status.as_u16()
    ))
}

#[cfg(test)]
mod tests {
    use {
        axum::{
            Json, Router,
            http::{HeaderMap, StatusCode},
            routing::get,
        },
        byokay_common::ProviderId,
    };

    use crate::{Outcome, ValidationClient};

    async fn serve(app: Router) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, server)
    }

    #[tokio::test]
    async fn success_response_validates_key() {
        let app = Router::new().route(
            "/models",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                assert_eq!(auth, "Bearer sk-test");
                Json(serde_json::json!({"data": []}))
            }),
        );
        let (addr, server) = serve(app).await;

        let client =
            ValidationClient::new().with_base_url(ProviderId::Openai, format!("http://{addr}"));
        let outcome = client.validate(ProviderId::Openai, "sk-test").await;
        server.abort();

        assert_eq!(outcome, Outcome::Valid);
    }

    #[tokio::test]
    async fn unauthorized_is_a_definitive_rejection() {
        let app = Router::new().route(
            "/models",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"error": {"message": "Incorrect API key provided"}})),
                )
            }),
        );
        let (addr, server) = serve(app).await;

        let client =
            ValidationClient::new().with_base_url(ProviderId::Openai, format!("http://{addr}"));
        let outcome = client.validate(ProviderId::Openai, "sk-bad").await;
        server.abort();

        assert_eq!(
            outcome,
            Outcome::Invalid("OpenAI API key is invalid or lacks permissions.".to_string())
        );
    }

    #[tokio::test]
    async fn other_statuses_carry_the_provider_detail() {
        let app = Router::new().route(
            "/models",
            get(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(serde_json::json!({"error": {"message": "Rate limit reached"}})),
                )
            }),
        );
        let (addr, server) = serve(app).await;

        let client =
            ValidationClient::new().with_base_url(ProviderId::Openai, format!("http://{addr}"));
        let outcome = client.validate(ProviderId::Openai, "sk-test").await;
        server.abort();

        match outcome {
            Outcome::Invalid(message) => {
                assert!(message.contains("429"), "got: {message}");
                assert!(message.contains("Rate limit reached"), "got: {message}");
            },
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_without_json_body_falls_back_to_the_reason_phrase() {
        let app = Router::new().route(
            "/models",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance") }),
        );
        let (addr, server) = serve(app).await;

        let client =
            ValidationClient::new().with_base_url(ProviderId::Openai, format!("http://{addr}"));
        let outcome = client.validate(ProviderId::Openai, "sk-test").await;
        server.abort();

        match outcome {
            Outcome::Invalid(message) => {
                assert!(message.contains("503"), "got: {message}");
                assert!(message.contains("Service Unavailable"), "got: {message}");
            },
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_a_network_error() {
        // Bind then immediately drop the listener so the port refuses.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let client =
            ValidationClient::new().with_base_url(ProviderId::Openai, format!("http://{addr}"));
        let outcome = client.validate(ProviderId::Openai, "sk-test").await;

        match outcome {
            Outcome::NetworkError(message) => {
                assert!(
                    message.contains("Network error during OpenAI validation"),
                    "got: {message}"
                );
            },
            other => panic!("expected NetworkError, got {other:?}"),
        }
    }
}
