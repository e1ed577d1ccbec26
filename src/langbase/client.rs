use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};

/// Client for interacting with Langbase Pipes API.
///
/// Each call is a single HTTP attempt. Retry policy belongs to the caller
/// (see [`crate::pipeline::StepExecutor`]).
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Run a Langbase pipe once, bounded by the configured request timeout.
    pub async fn call_pipe(&self, request: &PipeRequest) -> LangbaseResult<PipeResponse> {
        self.call_pipe_with_timeout(
            request,
            Duration::from_millis(self.request_config.timeout_ms),
        )
        .await
    }

    /// Run a Langbase pipe once with a per-call timeout that replaces the
    /// client default.
    pub async fn call_pipe_with_timeout(
        &self,
        request: &PipeRequest,
        timeout: Duration,
    ) -> LangbaseResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let start = Instant::now();

        debug!(
            pipe = %request.name,
            messages = request.messages.len(),
            "Calling Langbase pipe"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                pipe = %request.name,
                status = status.as_u16(),
                latency_ms = start.elapsed().as_millis(),
                "Langbase pipe call rejected"
            );
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: PipeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LangbaseError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                LangbaseError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                }
            }
        })?;

        info!(
            pipe = %request.name,
            latency_ms = start.elapsed().as_millis(),
            "Langbase pipe call succeeded"
        );

        Ok(pipe_response)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new pipe
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LangbaseResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);

        info!(pipe = %request.name, "Creating Langbase pipe");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(LangbaseError::Http)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: CreatePipeResponse =
            response
                .json()
                .await
                .map_err(|e| LangbaseError::InvalidResponse {
                    message: format!("Failed to parse create pipe response: {}", e),
                })?;

        info!(
            pipe = %pipe_response.name,
            url = %pipe_response.url,
            "Pipe created successfully"
        );

        Ok(pipe_response)
    }

    /// Ensure a JSON-output pipe with the given system prompt exists.
    pub async fn ensure_pipe(
        &self,
        pipe_name: &str,
        description: &str,
        system_prompt: &str,
    ) -> LangbaseResult<()> {
        let request = CreatePipeRequest::new(pipe_name)
            .with_description(description)
            .with_model("openai:gpt-4o")
            .with_upsert(true)
            .with_json_output(true)
            .with_temperature(0.2)
            .with_max_tokens(4000)
            .with_messages(vec![Message::system(system_prompt)]);

        match self.create_pipe(request).await {
            Ok(_) => {
                info!(pipe = %pipe_name, "Pipe ready");
                Ok(())
            }
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
