use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenes;

pub const GENRES: [&str; 8] = [
    "Drama", "Comedy", "Thriller", "Sci-Fi", "Horror", "Romance", "Action", "Mystery",
];

pub const DIALOGUE_STYLES: [&str; 5] =
    ["Realistic", "Stylized", "Period-Specific", "Witty", "Minimal"];

pub const ACT_STRUCTURES: [&str; 3] = ["Three-Act", "Five-Act", "Hero's Journey"];

pub const VISUAL_STYLES: [&str; 5] = ["Realistic", "Illustrated", "Noir", "Anime", "Sketch"];

pub const CAMERA_ANGLES: [&str; 9] = [
    "Wide Shot",
    "Medium Shot",
    "Close-Up",
    "Extreme Close-Up",
    "POV (Point of View)",
    "Over the Shoulder",
    "Bird's Eye View",
    "Low Angle",
    "High Angle",
];

pub const DEFAULT_AUTHOR: &str = "SceneForge";

/// User input for one generation run. Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryInput {
    pub prompt: String,
    pub genre: String,
    pub dialogue_style: String,
    pub act_structure: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoryAnalysis {
    pub main_theme: String,
    pub conflict: String,
    pub protagonist: String,
    pub antagonist: String,
    pub setting: String,
    pub key_plot_points: Vec<String>,
    pub suggested_acts: Vec<String>,
    pub tone: String,
    pub pacing: String,
    pub logline: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CharacterProfile {
    pub name: String,
    pub age: Option<u32>,
    /// "protagonist", "antagonist" or "supporting"
    pub role: String,
    pub description: String,
    pub personality_traits: Vec<String>,
    pub visual_description: String,
    pub motivation: Option<String>,
    pub arc: Option<String>,
    pub embedding_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SceneLocation {
    /// "INT", "EXT" or "INT/EXT"
    pub setting: String,
    pub location: String,
    /// "DAY", "NIGHT", "DAWN", "DUSK" or "CONTINUOUS"
    pub time: String,
}

impl Default for SceneLocation {
    fn default() -> Self {
        Self {
            setting: "INT".to_string(),
            location: "LOCATION".to_string(),
            time: "DAY".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DialogueLine {
    pub character: String,
    pub line: String,
    pub parenthetical: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Scene {
    pub scene_number: u32,
    pub location: SceneLocation,
    pub action: String,
    pub dialogue: Vec<DialogueLine>,
    pub page_number: Option<u32>,
}

/// Planned scene slot produced by act distribution, consumed by the writer.
#[derive(Debug, Clone)]
pub struct SceneOutline {
    pub scene_number: u32,
    pub act: String,
    pub purpose: String,
    pub setting: String,
    pub tone: String,
    pub location: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScreenplayMetadata {
    pub title: String,
    pub author: String,
    pub draft: String,
    pub created_at: DateTime<Utc>,
    pub genre: String,
    pub logline: Option<String>,
}

impl ScreenplayMetadata {
    pub fn new(title: &str, genre: &str, logline: Option<String>) -> Self {
        Self {
            title: title.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            draft: "First Draft".to_string(),
            created_at: Utc::now(),
            genre: genre.to_string(),
            logline,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScreenplayOutput {
    pub metadata: ScreenplayMetadata,
    pub characters: Vec<CharacterProfile>,
    pub scenes: Vec<Scene>,
    pub page_count: u32,
}

impl ScreenplayOutput {
    /// Rough industry estimate of two pages per scene.
    pub fn estimate_page_count(scenes: &[Scene]) -> u32 {
        scenes.len() as u32 * 2
    }

    /// Render the screenplay as industry-format plain text: title page,
    /// character list, then per-scene heading/action/dialogue blocks in
    /// ascending scene order.
    pub fn to_formatted_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        lines.push(self.metadata.title.to_uppercase());
        lines.push(format!("\nby {}", self.metadata.author));
        lines.push(format!("\n{}", self.metadata.draft));
        lines.push(format!("\n{}", self.metadata.created_at.format("%B %d, %Y")));
        lines.push(format!("\n{}\n", "=".repeat(60)));

        if !self.characters.is_empty() {
            lines.push("\nCHARACTERS:\n".to_string());
            for character in &self.characters {
                let age = character
                    .age
                    .map(|a| format!(", {a}"))
                    .unwrap_or_default();
                lines.push(format!(
                    "  {}{} - {}",
                    character.name.to_uppercase(),
                    age,
                    character.description
                ));
            }
            lines.push(format!("\n{}\n", "=".repeat(60)));
        }

        for scene in &self.scenes {
            lines.push(String::new());
            lines.push(scenes::format_scene(scene));
        }

        lines.join("\n")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryboardFrame {
    pub frame_number: u32,
    /// Points at a Scene.scene_number; not enforced as a foreign key.
    pub scene_reference: u32,
    pub description: String,
    pub camera_angle: String,
    pub visual_prompt: String,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoryboardOutput {
    pub screenplay_title: String,
    pub frames: Vec<StoryboardFrame>,
    pub visual_style: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_screenplay() -> ScreenplayOutput {
        let scenes = vec![
            Scene {
                scene_number: 1,
                location: SceneLocation {
                    setting: "INT".to_string(),
                    location: "COFFEE SHOP".to_string(),
                    time: "DAY".to_string(),
                },
                action: "A quiet morning.".to_string(),
                dialogue: vec![DialogueLine {
                    character: "ALEX".to_string(),
                    line: "Something is off today.".to_string(),
                    parenthetical: Some("uneasy".to_string()),
                }],
                page_number: None,
            },
            Scene {
                scene_number: 2,
                location: SceneLocation {
                    setting: "EXT".to_string(),
                    location: "CITY STREET".to_string(),
                    time: "NIGHT".to_string(),
                },
                action: "Rain pours down.".to_string(),
                dialogue: vec![],
                page_number: None,
            },
        ];
        let page_count = ScreenplayOutput::estimate_page_count(&scenes);
        ScreenplayOutput {
            metadata: ScreenplayMetadata::new("Broken Mirror", "Thriller", None),
            characters: vec![],
            scenes,
            page_count,
        }
    }

    #[test]
    fn test_formatted_text_contains_headings_in_order() {
        let text = sample_screenplay().to_formatted_text();
        let first = text.find("1. INT. COFFEE SHOP - DAY").unwrap();
        let second = text.find("2. EXT. CITY STREET - NIGHT").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_formatted_text_title_page() {
        let text = sample_screenplay().to_formatted_text();
        assert!(text.starts_with("BROKEN MIRROR"));
        assert!(text.contains("by SceneForge"));
        assert!(text.contains("First Draft"));
    }

    #[test]
    fn test_page_count_estimator() {
        let screenplay = sample_screenplay();
        assert_eq!(screenplay.page_count, 4);
    }
}
