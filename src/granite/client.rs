//! IBM Granite text-generation client

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::models::{GenerationParameters, GenerationRequest, GenerationResponse, Moderations};
use super::token::BearerTokenCache;
use super::TextGenerator;
use crate::config::GraniteConfig;
use crate::credentials::GraniteCredentials;
use crate::error::{clip, retry_after_secs, PlannerError, Result};
use crate::metrics::METRICS;

const SERVICE: &str = "IBM Granite";

/// Client for `POST {base}/ml/v1/text/generation`
pub struct GraniteClient {
    http: Client,
    config: GraniteConfig,
    project_id: String,
    tokens: Arc<BearerTokenCache>,
}

impl GraniteClient {
    /// Create a client with its own token cache
    pub fn new(config: GraniteConfig, credentials: GraniteCredentials) -> Result<Self> {
        let tokens = Arc::new(BearerTokenCache::new(&config, credentials.api_key)?);
        Self::with_token_cache(config, credentials.project_id, tokens)
    }

    /// Create a client around an existing token cache
    pub fn with_token_cache(
        config: GraniteConfig,
        project_id: String,
        tokens: Arc<BearerTokenCache>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.generation_timeout())
            .build()
            .map_err(|e| PlannerError::Internal(format!("failed to build Granite client: {}", e)))?;

        Ok(Self {
            http,
            config,
            project_id,
            tokens,
        })
    }

    /// Build the request body for one generation call
    pub fn build_request(&self, prompt: &str, max_tokens: u32, temperature: f64) -> GenerationRequest {
        GenerationRequest {
            input: prompt.to_string(),
            parameters: GenerationParameters::new(
                max_tokens,
                temperature,
                self.config.repetition_penalty,
            ),
            model_id: self.config.model_id.clone(),
            project_id: self.project_id.clone(),
            moderations: Moderations::default(),
        }
    }

    /// Confirm the API key can be exchanged for a bearer token
    pub async fn check_connection(&self) -> Result<()> {
        self.tokens.get_token().await.map(|_| ())
    }

    async fn map_failure(&self, response: reqwest::Response) -> PlannerError {
        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("Granite generation failed with status {}", status);

        match status.as_u16() {
            401 => {
                // the token was rejected; force a fresh exchange next time
                self.tokens.invalidate().await;
                PlannerError::Authentication {
                    service: SERVICE,
                    status: Some(401),
                    message: clip(&body),
                }
            }
            403 => PlannerError::Authentication {
                service: SERVICE,
                status: Some(403),
                message: clip(&body),
            },
            429 => PlannerError::RateLimited {
                message: format!("{}: {}", SERVICE, clip(&body)),
                retry_after_secs: retry_after,
            },
            code => PlannerError::Upstream {
                service: SERVICE,
                status: code,
                message: clip(&body),
            },
        }
    }
}

#[async_trait]
impl TextGenerator for GraniteClient {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f64) -> Result<String> {
        let token = self.tokens.get_token().await?;
        let request = self.build_request(prompt, max_tokens, temperature);
        let start = Instant::now();

        debug!(
            "Calling Granite: {} prompt chars, max_new_tokens={}, decoding={:?}",
            prompt.len(),
            max_tokens,
            request.parameters.decoding_method
        );

        let response = self
            .http
            .post(self.config.generation_url())
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                METRICS.record_upstream("granite", false, start.elapsed());
                if e.is_timeout() {
                    PlannerError::Timeout(format!(
                        "Granite generation exceeded {}s",
                        self.config.generation_timeout_secs
                    ))
                } else {
                    PlannerError::Transport {
                        service: SERVICE,
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            METRICS.record_upstream("granite", false, start.elapsed());
            return Err(self.map_failure(response).await);
        }

        let parsed: GenerationResponse = response.json().await.map_err(|e| {
            METRICS.record_upstream("granite", false, start.elapsed());
            PlannerError::Generation(format!("unreadable generation response: {}", e))
        })?;
        METRICS.record_upstream("granite", true, start.elapsed());

        let first = parsed
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| {
                warn!("Granite response had no results");
                PlannerError::Generation("response contained no results".to_string())
            })?;

        let text = first
            .generated_text
            .ok_or_else(|| PlannerError::Generation("result had no generated_text".to_string()))?;

        info!(
            "Granite generated {} chars (stop_reason={})",
            text.len(),
            first.stop_reason.as_deref().unwrap_or("unknown")
        );
        Ok(text.trim().to_string())
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::granite::token::tests::ManualClock;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use secrecy::SecretString;
    use serde_json::json;

    async fn client_for(server: &Server) -> GraniteClient {
        let config = GraniteConfig {
            base_url: server.url(),
            iam_url: format!("{}/identity/token", server.url()),
            ..GraniteConfig::default()
        };
        let tokens = Arc::new(
            BearerTokenCache::with_clock(
                &config,
                SecretString::new("key".into()),
                Arc::new(ManualClock::new(Utc::now())),
            )
            .unwrap(),
        );
        GraniteClient::with_token_cache(config, "proj-1".into(), tokens).unwrap()
    }

    async fn mock_iam(server: &mut Server) -> mockito::Mock {
        server
            .mock("POST", "/identity/token")
            .with_status(200)
            .with_body(r#"{"access_token":"bearer-1","expires_in":3600}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_greedy_payload_has_no_temperature() {
        let server = Server::new_async().await;
        let client = client_for(&server).await;
        let payload = serde_json::to_value(client.build_request("hi", 100, 0.0)).unwrap();

        assert_eq!(payload["parameters"]["decoding_method"], "greedy");
        assert!(payload["parameters"].get("temperature").is_none());
        assert_eq!(payload["parameters"]["min_new_tokens"], 0);
        assert_eq!(payload["model_id"], "ibm/granite-3-8b-instruct");
        assert_eq!(payload["project_id"], "proj-1");
    }

    #[tokio::test]
    async fn test_sample_payload_carries_temperature() {
        let server = Server::new_async().await;
        let client = client_for(&server).await;
        let payload = serde_json::to_value(client.build_request("hi", 100, 0.3)).unwrap();

        assert_eq!(payload["parameters"]["decoding_method"], "sample");
        assert_eq!(payload["parameters"]["temperature"], 0.3);
        assert_eq!(payload["parameters"]["repetition_penalty"], 1.1);
        assert_eq!(payload["moderations"]["hap"]["input"]["enabled"], true);
    }

    #[tokio::test]
    async fn test_generate_returns_first_result() {
        let mut server = Server::new_async().await;
        let _iam = mock_iam(&mut server).await;
        let generation = server
            .mock("POST", "/ml/v1/text/generation")
            .match_query(Matcher::UrlEncoded("version".into(), "2023-05-29".into()))
            .match_header("authorization", "Bearer bearer-1")
            .match_body(Matcher::PartialJson(json!({
                "input": "Plan this",
                "parameters": {"decoding_method": "greedy"}
            })))
            .with_status(200)
            .with_body(r#"{"results":[{"generated_text":"  1. Do it  ","stop_reason":"eos_token"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        let text = client.generate("Plan this", 200, 0.0).await.unwrap();
        assert_eq!(text, "1. Do it");
        generation.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_text_is_valid_but_missing_results_is_not() {
        let mut server = Server::new_async().await;
        let _iam = mock_iam(&mut server).await;
        let empty = server
            .mock("POST", "/ml/v1/text/generation")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":[{"generated_text":""}]}"#)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.generate("p", 10, 0.0).await.unwrap(), "");
        empty.remove_async().await;

        let _no_results = server
            .mock("POST", "/ml/v1/text/generation")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results":[]}"#)
            .create_async()
            .await;
        assert!(matches!(
            client.generate("p", 10, 0.0).await,
            Err(PlannerError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_token() {
        let mut server = Server::new_async().await;
        let iam = server
            .mock("POST", "/identity/token")
            .with_status(200)
            .with_body(r#"{"access_token":"bearer-1","expires_in":3600}"#)
            .expect(2)
            .create_async()
            .await;
        let _generation = server
            .mock("POST", "/ml/v1/text/generation")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("token expired")
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server).await;
        for _ in 0..2 {
            match client.generate("p", 10, 0.0).await {
                Err(PlannerError::Authentication { status, .. }) => assert_eq!(status, Some(401)),
                other => panic!("expected Authentication, got {:?}", other),
            }
        }
        iam.assert_async().await;
    }

    #[tokio::test]
    async fn test_iam_failure_prevents_generation_call() {
        let mut server = Server::new_async().await;
        let _iam = server
            .mock("POST", "/identity/token")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;
        let generation = server
            .mock("POST", "/ml/v1/text/generation")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.generate("p", 10, 0.0).await,
            Err(PlannerError::Authentication { .. })
        ));
        generation.assert_async().await;
    }
}
