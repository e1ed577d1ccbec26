//! The external research capability.
//!
//! Everything generative sits behind [`ResearchCapability`], so the pipeline's
//! deterministic parts can be exercised against fakes.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{CapabilityError, CapabilityResult};
use crate::langbase::{LangbaseClient, Message, PipeRequest, ResearchResponse};

/// Answer returned by the research capability.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerWithSources {
    pub answer: String,
    pub sources: Vec<String>,
    /// `None` when the capability did not report a confidence.
    pub confidence: Option<f64>,
}

impl AnswerWithSources {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            confidence: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

impl From<ResearchResponse> for AnswerWithSources {
    fn from(resp: ResearchResponse) -> Self {
        Self {
            answer: resp.answer,
            sources: resp.sources,
            confidence: resp.confidence,
        }
    }
}

/// A blocking question-answering service with citations.
#[async_trait]
pub trait ResearchCapability: Send + Sync {
    /// Answer `question` given `context`, within `timeout`.
    async fn ask(
        &self,
        question: &str,
        context: &str,
        timeout: Duration,
    ) -> CapabilityResult<AnswerWithSources>;
}

/// [`ResearchCapability`] backed by a Langbase pipe.
#[derive(Clone)]
pub struct LangbaseResearcher {
    client: LangbaseClient,
    pipe_name: String,
}

impl LangbaseResearcher {
    pub fn new(client: LangbaseClient, pipe_name: impl Into<String>) -> Self {
        Self {
            client,
            pipe_name: pipe_name.into(),
        }
    }

    fn build_messages(question: &str, context: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        if !context.trim().is_empty() {
            messages.push(Message::user(format!("Context:\n{}", context)));
        }
        messages.push(Message::user(question.to_string()));
        messages
    }
}

#[async_trait]
impl ResearchCapability for LangbaseResearcher {
    async fn ask(
        &self,
        question: &str,
        context: &str,
        timeout: Duration,
    ) -> CapabilityResult<AnswerWithSources> {
        let request = PipeRequest::new(&self.pipe_name, Self::build_messages(question, context));
        let start = Instant::now();

        debug!(pipe = %self.pipe_name, question_len = question.len(), "Asking research pipe");

        // The step budget replaces the HTTP client's default request timeout.
        let call = self.client.call_pipe_with_timeout(&request, timeout);
        let response = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(CapabilityError::from(e)),
            Err(_) => {
                warn!(
                    pipe = %self.pipe_name,
                    timeout_ms = timeout.as_millis(),
                    "Research pipe call timed out"
                );
                return Err(CapabilityError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        if !response.success {
            return Err(CapabilityError::Transient {
                message: "pipe reported success=false".to_string(),
            });
        }

        debug!(
            pipe = %self.pipe_name,
            latency_ms = start.elapsed().as_millis(),
            "Research pipe answered"
        );

        Ok(ResearchResponse::from_completion(&response.completion).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_with_context() {
        let messages = LangbaseResearcher::build_messages("Who are they?", "Acme Co");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("Context:"));
        assert_eq!(messages[1].content, "Who are they?");
    }

    #[test]
    fn test_build_messages_without_context() {
        let messages = LangbaseResearcher::build_messages("Who are they?", "   ");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_answer_from_research_response() {
        let answer: AnswerWithSources = ResearchResponse {
            answer: "a".to_string(),
            sources: vec!["s".to_string()],
            confidence: Some(0.4),
        }
        .into();
        assert_eq!(answer, AnswerWithSources::new("a").with_sources(vec!["s".to_string()]).with_confidence(0.4));
    }
}
