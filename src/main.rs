use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sceneforge::consistency::ConsistencyManager;
use sceneforge::schema::StoryInput;
use sceneforge::{embedding, image, llm, Config, WorkflowManager};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load Config. On a first run, write one with defaults so the user
    // has something to fill API keys into; the defaults run fallback-only.
    if !Path::new("config.yml").exists() {
        Config::default().save()?;
        println!("Created config.yml with defaults. Add provider API keys to enable backends.");
    }
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid backend settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 2. Initialize backends. Any of these may come back as None, in which
    // case the affected stages run in fallback mode.
    let text_client = llm::create_text_client(&config)?;
    let image_client = image::create_image_client(&config)?;
    let consistency = match embedding::create_embedding_client(&config)? {
        Some(client) => {
            let path = Path::new(&config.output_folder).join("character_embeddings.json");
            Some(ConsistencyManager::open(client, &path)?)
        }
        None => None,
    };

    // 3. Collect story prompts
    let prompts = collect_story_files(&config.input_folder)?;
    if prompts.is_empty() {
        println!(
            "No .txt story prompts found in '{}'. Add one and run again.",
            config.input_folder
        );
        return Ok(());
    }

    // 4. Run the pipeline per prompt
    let mut manager = WorkflowManager::new(config.clone(), text_client, image_client, consistency);
    for path in prompts {
        let prompt = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        println!("Processing {}...", path.display());

        let input = StoryInput {
            prompt,
            genre: config.story.genre.clone(),
            dialogue_style: config.story.dialogue_style.clone(),
            act_structure: config.story.act_structure.clone(),
        };

        let screenplay = manager.generate_screenplay(&input).await?;
        println!(
            "  Screenplay: {} scenes, {} characters, ~{} pages",
            screenplay.scenes.len(),
            screenplay.characters.len(),
            screenplay.page_count
        );
        let screenplay_path = manager.export_screenplay()?;
        println!("  Wrote {}", screenplay_path.display());

        let storyboard = manager.generate_storyboard().await?;
        println!("  Storyboard: {} frames", storyboard.frames.len());
        let storyboard_path = manager.export_storyboard()?;
        println!("  Wrote {}", storyboard_path.display());
    }

    Ok(())
}

/// All .txt files in the input folder, in name order.
fn collect_story_files(input_folder: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(input_folder)
        .with_context(|| format!("Failed to read input folder '{}'", input_folder))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}
