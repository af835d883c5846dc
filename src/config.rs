use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::schema::{ACT_STRUCTURES, DIALOGUE_STYLES, GENRES, VISUAL_STYLES};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub story: StoryConfig,

    #[serde(default)]
    pub storyboard: StoryboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: default_input(),
            output_folder: default_output(),
            llm: LlmConfig::default(),
            image: ImageConfig::default(),
            embedding: EmbeddingConfig::default(),
            story: StoryConfig::default(),
            storyboard: StoryboardConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// "sambanova", "openai" or "none" (fallback mode)
    #[serde(default = "default_none")]
    pub provider: String,
    pub sambanova: Option<ApiConfig>,
    pub openai: Option<ApiConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_none(),
            sambanova: None,
            openai: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    /// "hyperbolic" or "none"
    #[serde(default = "default_none")]
    pub provider: String,
    pub hyperbolic: Option<ApiConfig>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            provider: default_none(),
            hyperbolic: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// "nebius" or "none"
    #[serde(default = "default_none")]
    pub provider: String,
    pub nebius: Option<ApiConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_none(),
            nebius: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryConfig {
    #[serde(default = "default_genre")]
    pub genre: String,
    #[serde(default = "default_dialogue_style")]
    pub dialogue_style: String,
    #[serde(default = "default_act_structure")]
    pub act_structure: String,
    #[serde(default = "default_num_scenes")]
    pub num_scenes: usize,
    #[serde(default = "default_num_characters")]
    pub num_characters: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            genre: default_genre(),
            dialogue_style: default_dialogue_style(),
            act_structure: default_act_structure(),
            num_scenes: default_num_scenes(),
            num_characters: default_num_characters(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryboardConfig {
    #[serde(default = "default_num_frames")]
    pub num_frames: usize,
    #[serde(default = "default_visual_style")]
    pub visual_style: String,
    #[serde(default = "default_threshold")]
    pub consistency_threshold: f32,
}

impl Default for StoryboardConfig {
    fn default() -> Self {
        Self {
            num_frames: default_num_frames(),
            visual_style: default_visual_style(),
            consistency_threshold: default_threshold(),
        }
    }
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_none() -> String {
    "none".to_string()
}
fn default_genre() -> String {
    "Drama".to_string()
}
fn default_dialogue_style() -> String {
    "Realistic".to_string()
}
fn default_act_structure() -> String {
    "Three-Act".to_string()
}
fn default_num_scenes() -> usize {
    6
}
fn default_num_characters() -> usize {
    3
}
fn default_num_frames() -> usize {
    8
}
fn default_visual_style() -> String {
    "Realistic".to_string()
}
fn default_threshold() -> f32 {
    0.85
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        config.warn_unknown_vocabulary();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    /// Unknown vocabulary values still run (every lookup downstream has a
    /// default), so this only warns.
    fn warn_unknown_vocabulary(&self) {
        if !GENRES.contains(&self.story.genre.as_str()) {
            log::warn!("Unknown genre '{}', using generic defaults", self.story.genre);
        }
        if !DIALOGUE_STYLES.contains(&self.story.dialogue_style.as_str()) {
            log::warn!(
                "Unknown dialogue style '{}', dialogue will use generic phrasing",
                self.story.dialogue_style
            );
        }
        if !ACT_STRUCTURES.contains(&self.story.act_structure.as_str()) {
            log::warn!(
                "Unknown act structure '{}', falling back to Three-Act beats",
                self.story.act_structure
            );
        }
        if !VISUAL_STYLES.contains(&self.storyboard.visual_style.as_str()) {
            log::warn!(
                "Unknown visual style '{}', no style modifiers will apply",
                self.storyboard.visual_style
            );
        }
    }
}
