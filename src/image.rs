use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

use crate::config::Config;

// Image generation can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: None,
            width: 1024,
            height: 576,
            steps: 30,
            guidance_scale: 7.5,
            seed: None,
        }
    }
}

#[async_trait]
pub trait ImageClient: Send + Sync + Debug {
    /// Generate one image; returns raw decoded bytes. Style negatives and
    /// modifiers are pre-composed by the caller.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>>;
}

pub fn create_image_client(config: &Config) -> Result<Option<Box<dyn ImageClient>>> {
    match config.image.provider.as_str() {
        "none" => Ok(None),
        "hyperbolic" => match &config.image.hyperbolic {
            Some(api) => Ok(Some(Box::new(HyperbolicClient::new(
                &api.api_key,
                api.model.as_deref().unwrap_or("SDXL1.0-base"),
                api.base_url.as_deref().unwrap_or("https://api.hyperbolic.xyz/v1"),
            )?))),
            None => {
                log::warn!("Hyperbolic selected but not configured; frames will have no images");
                Ok(None)
            }
        },
        other => Err(anyhow!("Unknown image provider: {}", other)),
    }
}

#[derive(Debug)]
pub struct HyperbolicClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl HyperbolicClient {
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
struct GenerationRequest {
    model_name: String,
    prompt: String,
    height: u32,
    width: u32,
    backend: String,
    num_inference_steps: u32,
    guidance_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<String>,
}

#[async_trait]
impl ImageClient for HyperbolicClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let url = format!("{}/image/generation", self.base_url);

        let request_body = GenerationRequest {
            model_name: self.model.clone(),
            prompt: request.prompt.clone(),
            height: request.height,
            width: request.width,
            backend: "auto".to_string(),
            num_inference_steps: request.steps,
            guidance_scale: request.guidance_scale,
            negative_prompt: request.negative_prompt.clone(),
            seed: request.seed,
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
            return Err(anyhow!("Image API error: {}", error_text));
        }

        let result: GenerationResponse = resp.json().await?;
        let Some(payload) = result.images.first() else {
            return Err(anyhow!("No image returned from API"));
        };

        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| anyhow!("Failed to decode image payload: {}", e))
    }
}
