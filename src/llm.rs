use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::config::Config;
use crate::error::StageError;
use crate::extract;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TextClient: Send + Sync + Debug {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;

    /// Generate and parse the first balanced JSON object in the response.
    async fn generate_structured(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<serde_json::Value> {
        let instruction = "\n\nRespond ONLY with valid JSON matching the requested structure.";
        let system = format!("{}{}", system.unwrap_or_default(), instruction);
        // Lower temperature for structured output.
        let text = self.generate(prompt, Some(&system), 0.5, 2000).await?;
        extract::first_json_object(&text).map_err(|e: StageError| anyhow!(e))
    }

    /// One independent call per prompt, joined in input order. Any single
    /// failure fails the whole batch.
    async fn batch_generate(
        &self,
        prompts: &[String],
        system: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Vec<String>> {
        try_join_all(
            prompts
                .iter()
                .map(|p| self.generate(p, system, temperature, max_tokens)),
        )
        .await
    }
}

/// Build the configured text backend, or `None` when the pipeline should run
/// in fallback mode for text generation.
pub fn create_text_client(config: &Config) -> Result<Option<Box<dyn TextClient>>> {
    match config.llm.provider.as_str() {
        "none" => Ok(None),
        "sambanova" => match &config.llm.sambanova {
            Some(api) => Ok(Some(Box::new(ChatCompletionsClient::new(
                &api.api_key,
                api.model.as_deref().unwrap_or("Meta-Llama-3.1-70B-Instruct"),
                api.base_url.as_deref().unwrap_or("https://api.sambanova.ai/v1"),
            )?))),
            None => {
                log::warn!("SambaNova selected but not configured; text generation in fallback mode");
                Ok(None)
            }
        },
        "openai" => match &config.llm.openai {
            Some(api) => Ok(Some(Box::new(ChatCompletionsClient::new(
                &api.api_key,
                api.model.as_deref().unwrap_or("gpt-4o-mini"),
                api.base_url.as_deref().unwrap_or("https://api.openai.com/v1"),
            )?))),
            None => {
                log::warn!("OpenAI selected but not configured; text generation in fallback mode");
                Ok(None)
            }
        },
        other => Err(anyhow!("Unknown LLM provider: {}", other)),
    }
}

/// OpenAI-compatible chat completions client. SambaNova and OpenAI share this
/// wire format; only defaults differ.
#[derive(Debug)]
pub struct ChatCompletionsClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl TextClient for ChatCompletionsClient {
    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request_body = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Chat API error: {}", error_text));
        }

        let result: ChatResponse = resp.json().await?;
        if let Some(choice) = result.choices.first() {
            if let Some(content) = &choice.message.content {
                return Ok(content.clone());
            }
        }

        Err(anyhow!("Chat response empty or missing content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_parsing() {
        let json = r#"{
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "FADE IN:"
                },
                "finish_reason": "stop"
            }]
        }"#;

        let result: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some("FADE IN:")
        );
    }

    #[test]
    fn test_chat_response_missing_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant"}}]}"#;
        let result: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(result.choices[0].message.content.is_none());
    }

    #[derive(Debug)]
    struct EchoClient;

    #[async_trait]
    impl TextClient for EchoClient {
        async fn generate(
            &self,
            prompt: &str,
            _system: Option<&str>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String> {
            Ok(format!("echo:{prompt}"))
        }
    }

    #[tokio::test]
    async fn test_batch_generate_preserves_order() {
        let client = EchoClient;
        let prompts: Vec<String> = (0..5).map(|i| format!("p{i}")).collect();
        let results = client.batch_generate(&prompts, None, 0.7, 100).await.unwrap();
        assert_eq!(results, vec!["echo:p0", "echo:p1", "echo:p2", "echo:p3", "echo:p4"]);
    }

    #[tokio::test]
    async fn test_generate_structured_extracts_json() {
        #[derive(Debug)]
        struct JsonClient;

        #[async_trait]
        impl TextClient for JsonClient {
            async fn generate(
                &self,
                _prompt: &str,
                _system: Option<&str>,
                _temperature: f32,
                _max_tokens: u32,
            ) -> Result<String> {
                Ok("Here is the result: {\"title\": \"Cold Open\"}".to_string())
            }
        }

        let value = JsonClient.generate_structured("x", None).await.unwrap();
        assert_eq!(value["title"], "Cold Open");
    }
}
