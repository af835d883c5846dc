use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use futures_util::future::join_all;

use crate::analyzer::StoryAnalyzer;
use crate::characters::CharacterCreator;
use crate::config::Config;
use crate::consistency::ConsistencyManager;
use crate::error::StageError;
use crate::image::{ImageClient, ImageRequest};
use crate::llm::TextClient;
use crate::moments::{self, Moment};
use crate::scenes::{self, SceneWriter};
use crate::schema::{
    CharacterProfile, Scene, ScreenplayMetadata, ScreenplayOutput, StoryInput, StoryboardFrame,
    StoryboardOutput,
};
use crate::visual;

const MIN_PROMPT_LEN: usize = 10;

/// Pipeline progress marker. Storyboard operations require at least
/// `ScreenplayReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Analyzing,
    CharacterCreation,
    SceneWriting,
    ScreenplayReady,
    MomentDetection,
    FrameGeneration,
    StoryboardReady,
}

/// Orchestrates the two generation passes. Backend failures in any single
/// stage degrade that stage to its fallback output instead of aborting;
/// only input validation errors stop the pipeline.
pub struct WorkflowManager {
    config: Config,
    text_client: Option<Box<dyn TextClient>>,
    image_client: Option<Box<dyn ImageClient>>,
    consistency: Option<ConsistencyManager>,
    seed: Option<u64>,
    stage: Stage,
    characters: HashMap<String, CharacterProfile>,
    screenplay: Option<ScreenplayOutput>,
    storyboard: Option<StoryboardOutput>,
}

impl WorkflowManager {
    pub fn new(
        config: Config,
        text_client: Option<Box<dyn TextClient>>,
        image_client: Option<Box<dyn ImageClient>>,
        consistency: Option<ConsistencyManager>,
    ) -> Self {
        Self {
            config,
            text_client,
            image_client,
            consistency,
            seed: None,
            stage: Stage::Idle,
            characters: HashMap::new(),
            screenplay: None,
            storyboard: None,
        }
    }

    /// Fix the RNG seed used by fallback character generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn screenplay(&self) -> Option<&ScreenplayOutput> {
        self.screenplay.as_ref()
    }

    pub async fn generate_screenplay(
        &mut self,
        input: &StoryInput,
    ) -> Result<ScreenplayOutput, StageError> {
        if input.prompt.trim().len() < MIN_PROMPT_LEN {
            return Err(StageError::Validation(format!(
                "story prompt must be at least {MIN_PROMPT_LEN} characters"
            )));
        }

        self.stage = Stage::Analyzing;
        log::info!("Analyzing story prompt ({} chars)", input.prompt.len());
        let client = self.text_client.as_deref();
        let analyzer = StoryAnalyzer::new(client);
        let analysis = match analyzer.analyze(input).await {
            Ok(analysis) => analysis,
            Err(StageError::Generation(e)) | Err(StageError::Parse(e)) => {
                log::warn!("Story analysis degraded to fallback: {e}");
                StoryAnalyzer::new(None).analyze(input).await?
            }
            Err(e) => return Err(e),
        };

        self.stage = Stage::CharacterCreation;
        log::info!("Creating {} characters", self.config.story.num_characters);
        let mut creator = CharacterCreator::new(client, self.seed);
        let characters = match creator
            .create(&analysis, &input.genre, self.config.story.num_characters)
            .await
        {
            Ok(characters) => characters,
            Err(StageError::Generation(e)) | Err(StageError::Parse(e)) => {
                log::warn!("Character creation degraded to fallback: {e}");
                creator.fallback_characters(
                    &analysis,
                    &input.genre,
                    self.config.story.num_characters,
                )
            }
            Err(e) => return Err(e),
        };

        self.stage = Stage::SceneWriting;
        let outlines = analyzer.identify_key_scenes(&analysis, self.config.story.num_scenes);
        log::info!("Writing {} scenes", outlines.len());
        let writer = SceneWriter::new(client);
        let mut scene_list: Vec<Scene> = Vec::with_capacity(outlines.len());
        for outline in &outlines {
            let scene = match writer
                .write_scene(outline, &characters, &input.dialogue_style, &input.genre)
                .await
            {
                Ok(scene) => scene,
                Err(StageError::Generation(e)) | Err(StageError::Parse(e)) => {
                    log::warn!("Scene {} degraded to fallback: {e}", outline.scene_number);
                    writer.fallback_scene(
                        outline,
                        &characters,
                        scenes::parse_location(&outline.location),
                    )
                }
                Err(e) => return Err(e),
            };
            scene_list.push(scene);
        }

        self.characters = characters
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
        let characters = self.pin_character_embeddings(characters).await;

        let title = format!("Untitled {} Project", input.genre);
        let logline = if analysis.logline.is_empty() {
            None
        } else {
            Some(analysis.logline.clone())
        };
        let page_count = ScreenplayOutput::estimate_page_count(&scene_list);
        let screenplay = ScreenplayOutput {
            metadata: ScreenplayMetadata::new(&title, &input.genre, logline),
            characters,
            scenes: scene_list,
            page_count,
        };

        self.stage = Stage::ScreenplayReady;
        self.screenplay = Some(screenplay.clone());
        log::info!(
            "Screenplay ready: {} scenes, ~{} pages",
            screenplay.scenes.len(),
            screenplay.page_count
        );
        Ok(screenplay)
    }

    /// Store each character's visual signature when an embedding backend is
    /// available. A failed store only costs that character its embedding id.
    async fn pin_character_embeddings(
        &mut self,
        mut characters: Vec<CharacterProfile>,
    ) -> Vec<CharacterProfile> {
        let Some(manager) = self.consistency.as_mut() else {
            return characters;
        };

        for character in &mut characters {
            let metadata = serde_json::json!({
                "age": character.age,
                "role": character.role,
            });
            match manager
                .store_character(&character.name, &character.visual_description, metadata)
                .await
            {
                Ok(id) => character.embedding_id = Some(id),
                Err(e) => log::warn!("Could not pin embedding for {}: {e}", character.name),
            }
        }

        self.characters = characters
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
        characters
    }

    pub async fn generate_storyboard(&mut self) -> Result<StoryboardOutput, StageError> {
        if self.stage < Stage::ScreenplayReady {
            return Err(StageError::Validation(
                "a screenplay must be generated before the storyboard".to_string(),
            ));
        }
        let Some(screenplay) = self.screenplay.clone() else {
            return Err(StageError::Validation(
                "a screenplay must be generated before the storyboard".to_string(),
            ));
        };
        let screenplay_text = screenplay.to_formatted_text();
        if screenplay_text.trim().is_empty() {
            return Err(StageError::Validation("screenplay text is empty".to_string()));
        }

        self.stage = Stage::MomentDetection;
        let num_frames = self.config.storyboard.num_frames;
        log::info!("Selecting up to {num_frames} key moments");
        let moments = moments::identify_key_moments(&screenplay_text, num_frames);

        self.stage = Stage::FrameGeneration;
        let visual_style = self.config.storyboard.visual_style.clone();
        let cast = self.frame_cast(&moments).await;
        let frames_dir = Path::new(&self.config.output_folder).join("frames");

        let mut planned: Vec<StoryboardFrame> = Vec::with_capacity(moments.len());
        for moment in &moments {
            let camera_angle = moments::suggest_camera_angle(moment);
            let visual_prompt =
                visual::generate_visual_prompt(moment, &visual_style, camera_angle, &cast);
            planned.push(StoryboardFrame {
                frame_number: moment.frame_number,
                scene_reference: moment.scene_number,
                description: moment.description.clone(),
                camera_angle: camera_angle.to_string(),
                visual_prompt,
                image_path: None,
                image_url: None,
            });
        }

        if let Some(client) = self.image_client.as_deref() {
            fs::create_dir_all(&frames_dir).map_err(|e| StageError::Config(e.to_string()))?;
            log::info!("Rendering {} frames", planned.len());

            let renders = join_all(planned.iter().map(|frame| {
                let (prompt, negative_prompt) = visual::split_negative(&frame.visual_prompt);
                let request = ImageRequest {
                    prompt,
                    negative_prompt,
                    ..ImageRequest::default()
                };
                async move { client.generate_image(&request).await }
            }))
            .await;

            for (frame, render) in planned.iter_mut().zip(renders) {
                match render {
                    Ok(bytes) => {
                        let path = frames_dir.join(format!("frame_{:03}.png", frame.frame_number));
                        match fs::write(&path, bytes) {
                            Ok(()) => frame.image_path = Some(path.display().to_string()),
                            Err(e) => log::warn!(
                                "Could not write frame {}: {e}",
                                frame.frame_number
                            ),
                        }
                    }
                    // One bad frame never sinks the storyboard.
                    Err(e) => log::warn!("Frame {} failed: {e}", frame.frame_number),
                }
            }
        }

        let storyboard = StoryboardOutput {
            screenplay_title: screenplay.metadata.title.clone(),
            frames: planned,
            visual_style,
            created_at: Utc::now(),
        };

        self.stage = Stage::StoryboardReady;
        self.storyboard = Some(storyboard.clone());
        log::info!("Storyboard ready: {} frames", storyboard.frames.len());
        Ok(storyboard)
    }

    /// Cast list for prompt assembly. Pinned characters use their stored
    /// description so frames stay on the embedded look even when the roster
    /// drifts from it; each lookup bumps the character's frame counter, and
    /// drift past the configured similarity threshold is logged once.
    async fn frame_cast(&mut self, moments: &[Moment]) -> Vec<CharacterProfile> {
        let mut cast: Vec<CharacterProfile> = self.characters.values().cloned().collect();
        let Some(manager) = self.consistency.as_mut() else {
            return cast;
        };

        let threshold = self.config.storyboard.consistency_threshold;
        let mut checked: HashSet<String> = HashSet::new();
        for moment in moments {
            for name in &moment.characters {
                if !manager.contains(name) {
                    continue;
                }
                let stored = match manager.character_description(name, Some(&moment.description)) {
                    Ok(stored) => stored,
                    Err(e) => {
                        log::warn!("Consistency lookup failed for {name}: {e}");
                        continue;
                    }
                };
                let Some(profile) = cast
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                else {
                    continue;
                };
                if checked.insert(ConsistencyManager::character_id(name)) {
                    match manager
                        .validate_consistency(name, &profile.visual_description, threshold)
                        .await
                    {
                        Ok((true, _)) => {}
                        Ok((false, similarity)) => log::warn!(
                            "{name} drifted from the pinned look (similarity {similarity:.2} < {threshold:.2})"
                        ),
                        Err(e) => log::warn!("Consistency check failed for {name}: {e}"),
                    }
                }
                profile.visual_description = stored;
            }
        }
        cast
    }

    /// Write the screenplay as formatted text plus a JSON sidecar.
    pub fn export_screenplay(&self) -> Result<PathBuf, StageError> {
        let screenplay = self
            .screenplay
            .as_ref()
            .ok_or_else(|| StageError::Validation("no screenplay to export".to_string()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = Path::new(&self.config.output_folder);
        fs::create_dir_all(base).map_err(|e| StageError::Config(e.to_string()))?;

        let text_path = base.join(format!("screenplay_{stamp}.txt"));
        fs::write(&text_path, screenplay.to_formatted_text())
            .map_err(|e| StageError::Config(e.to_string()))?;

        let json_path = base.join(format!("screenplay_{stamp}.json"));
        let json = serde_json::to_string_pretty(screenplay)
            .map_err(|e| StageError::Parse(e.to_string()))?;
        fs::write(&json_path, json).map_err(|e| StageError::Config(e.to_string()))?;

        log::info!("Exported screenplay to {}", text_path.display());
        Ok(text_path)
    }

    pub fn export_storyboard(&self) -> Result<PathBuf, StageError> {
        let storyboard = self
            .storyboard
            .as_ref()
            .ok_or_else(|| StageError::Validation("no storyboard to export".to_string()))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = Path::new(&self.config.output_folder);
        fs::create_dir_all(base).map_err(|e| StageError::Config(e.to_string()))?;

        let path = base.join(format!("storyboard_{stamp}.json"));
        let json = serde_json::to_string_pretty(storyboard)
            .map_err(|e| StageError::Parse(e.to_string()))?;
        fs::write(&path, json).map_err(|e| StageError::Config(e.to_string()))?;

        log::info!("Exported storyboard to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    fn config() -> Config {
        serde_yaml_ng::from_str("{}").unwrap()
    }

    fn input() -> StoryInput {
        StoryInput {
            prompt: "A detective discovers the killer is his future self".to_string(),
            genre: "Thriller".to_string(),
            dialogue_style: "Realistic".to_string(),
            act_structure: "Three-Act".to_string(),
        }
    }

    fn manager() -> WorkflowManager {
        WorkflowManager::new(config(), None, None, None).with_seed(7)
    }

    #[tokio::test]
    async fn test_short_prompt_rejected() {
        let mut workflow = manager();
        let mut input = input();
        input.prompt = "Too short".to_string();
        let err = workflow.generate_screenplay(&input).await.unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));
        assert_eq!(workflow.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_storyboard_requires_screenplay() {
        let mut workflow = manager();
        let err = workflow.generate_storyboard().await.unwrap_err();
        assert!(matches!(err, StageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fallback_end_to_end() {
        let mut workflow = manager();
        let screenplay = workflow.generate_screenplay(&input()).await.unwrap();

        // Defaults: 6 scenes over 3 acts, 3 characters, 2 pages per scene.
        assert_eq!(screenplay.scenes.len(), 6);
        assert_eq!(screenplay.page_count, 12);
        assert_eq!(screenplay.characters.len(), 3);
        assert_eq!(screenplay.metadata.title, "Untitled Thriller Project");
        assert_eq!(workflow.stage(), Stage::ScreenplayReady);

        let storyboard = workflow.generate_storyboard().await.unwrap();
        assert!(!storyboard.frames.is_empty());
        assert!(storyboard.frames.len() <= 6);
        // Ascending frame numbers, no images without a backend.
        for (idx, frame) in storyboard.frames.iter().enumerate() {
            assert_eq!(frame.frame_number, idx as u32 + 1);
            assert!(frame.image_path.is_none());
            assert!(!frame.visual_prompt.is_empty());
        }
        assert_eq!(workflow.stage(), Stage::StoryboardReady);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_fallback() {
        #[derive(Debug)]
        struct FailingClient;

        #[async_trait]
        impl TextClient for FailingClient {
            async fn generate(
                &self,
                _prompt: &str,
                _system: Option<&str>,
                _temperature: f32,
                _max_tokens: u32,
            ) -> Result<String> {
                Err(anyhow!("backend unavailable"))
            }
        }

        let mut workflow =
            WorkflowManager::new(config(), Some(Box::new(FailingClient)), None, None).with_seed(7);
        let screenplay = workflow.generate_screenplay(&input()).await.unwrap();
        assert_eq!(screenplay.scenes.len(), 6);
        assert!(!screenplay.characters.is_empty());
    }

    #[tokio::test]
    async fn test_pinned_cast_is_checked_during_frame_generation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        use crate::embedding::EmbeddingClient;

        #[derive(Debug)]
        struct CountingEmbedder(Arc<AtomicUsize>);

        #[async_trait]
        impl EmbeddingClient for CountingEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let embeds = Arc::new(AtomicUsize::new(0));
        let consistency = ConsistencyManager::open(
            Box::new(CountingEmbedder(embeds.clone())),
            &dir.path().join("embeddings.json"),
        )
        .unwrap();

        let mut config = config();
        config.output_folder = dir.path().display().to_string();
        let mut workflow =
            WorkflowManager::new(config, None, None, Some(consistency)).with_seed(7);

        let screenplay = workflow.generate_screenplay(&input()).await.unwrap();
        assert!(screenplay.characters.iter().all(|c| c.embedding_id.is_some()));
        let after_pin = embeds.load(Ordering::SeqCst);
        assert_eq!(after_pin, screenplay.characters.len());

        // Frame generation re-embeds each pinned character named in a frame
        // for the similarity check against the stored look.
        workflow.generate_storyboard().await.unwrap();
        assert!(embeds.load(Ordering::SeqCst) > after_pin);
    }

    #[tokio::test]
    async fn test_export_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.output_folder = dir.path().display().to_string();

        let mut workflow = WorkflowManager::new(config, None, None, None).with_seed(7);
        workflow.generate_screenplay(&input()).await.unwrap();
        workflow.generate_storyboard().await.unwrap();

        let screenplay_path = workflow.export_screenplay().unwrap();
        assert!(screenplay_path.exists());
        let storyboard_path = workflow.export_storyboard().unwrap();
        assert!(storyboard_path.exists());

        let json = std::fs::read_to_string(storyboard_path).unwrap();
        let parsed: StoryboardOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.screenplay_title, "Untitled Thriller Project");
    }
}
