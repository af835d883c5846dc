use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait EmbeddingClient: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// One independent call per text, joined in input order. Any single
    /// failure fails the whole batch.
    async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        try_join_all(texts.iter().map(|t| self.embed(t))).await
    }
}

pub fn create_embedding_client(config: &Config) -> Result<Option<Box<dyn EmbeddingClient>>> {
    match config.embedding.provider.as_str() {
        "none" => Ok(None),
        "nebius" => match &config.embedding.nebius {
            Some(api) => Ok(Some(Box::new(NebiusClient::new(
                &api.api_key,
                api.model.as_deref().unwrap_or("text-embedding-ada-002"),
                api.base_url.as_deref().unwrap_or("https://api.studio.nebius.ai/v1"),
            )?))),
            None => {
                log::warn!("Nebius selected but not configured; consistency checks disabled");
                Ok(None)
            }
        },
        other => Err(anyhow!("Unknown embedding provider: {}", other)),
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[derive(Debug)]
pub struct NebiusClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl NebiusClient {
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
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for NebiusClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);

        let request_body = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
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
            return Err(anyhow!("Embedding API error: {}", error_text));
        }

        let result: EmbeddingResponse = resp.json().await?;
        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("Embedding response contained no data"))
    }
}
