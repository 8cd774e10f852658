use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QaConfig;

/// The external question-answering collaborator.
///
/// The bot only needs `ask`; handlers depend on this trait so tests can
/// substitute a stub for the HTTP client.
#[async_trait]
pub trait QaService: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

pub struct QaClient {
    client: reqwest::Client,
    config: QaConfig,
}

impl QaClient {
    pub fn new(config: QaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl QaService for QaClient {
    async fn ask(&self, question: &str) -> Result<String> {
        let url = format!("{}/ask", self.config.base_url.trim_end_matches('/'));

        debug!("Sending question to QA service: {}", url);

        let mut request = self.client.post(&url).json(&AskRequest { question });
        if !self.config.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to QA service")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("QA service error ({}): {}", status, error_body);
        }

        let ask_response: AskResponse = response
            .json()
            .await
            .context("Failed to parse QA service response")?;

        Ok(ask_response.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_wire_shape() {
        let request = AskRequest {
            question: "what is rust?",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "question": "what is rust?" }));
    }

    #[test]
    fn test_ask_response_wire_shape() {
        let response: AskResponse =
            serde_json::from_str(r#"{"answer": "a systems language"}"#).unwrap();
        assert_eq!(response.answer, "a systems language");
    }
}
