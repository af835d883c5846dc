use crate::error::StageError;
use crate::extract;
use crate::llm::TextClient;
use crate::prompts;
use crate::schema::{SceneOutline, StoryAnalysis, StoryInput};

/// Turns a story prompt into a structured narrative analysis, via the text
/// backend when one is configured or a fixed fallback record otherwise.
pub struct StoryAnalyzer<'a> {
    client: Option<&'a dyn TextClient>,
}

impl<'a> StoryAnalyzer<'a> {
    pub fn new(client: Option<&'a dyn TextClient>) -> Self {
        Self { client }
    }

    pub async fn analyze(&self, input: &StoryInput) -> Result<StoryAnalysis, StageError> {
        let mut analysis = match self.client {
            Some(client) => {
                let prompt = prompts::story_analysis_prompt(
                    &input.prompt,
                    &input.genre,
                    &input.act_structure,
                );
                let response = client
                    .generate(&prompt, Some(prompts::SYSTEM_PROMPT_CREATIVE), 0.7, 2000)
                    .await
                    .map_err(StageError::generation)?;
                parse_analysis(&response)
            }
            None => self.fallback_analysis(input),
        };

        finalize_analysis(&mut analysis, input);
        Ok(analysis)
    }

    /// Deterministic analysis used when no backend is available or a
    /// generation attempt failed.
    pub fn fallback_analysis(&self, input: &StoryInput) -> StoryAnalysis {
        let prompt = input.prompt.to_lowercase();

        let protagonist = ["detective", "hero", "protagonist", "character", "person", "woman", "man"]
            .iter()
            .find(|kw| prompt.contains(*kw))
            .map(|kw| {
                let mut chars = kw.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .unwrap_or_else(|| "Main Character".to_string());

        StoryAnalysis {
            main_theme: "Personal journey and transformation".to_string(),
            conflict: "Internal and external challenges".to_string(),
            protagonist,
            antagonist: "Forces of opposition".to_string(),
            setting: infer_setting(&input.genre).to_string(),
            key_plot_points: basic_plot_points(&input.act_structure),
            ..Default::default()
        }
    }

    /// Distribute `num_scenes` evenly across the acts. Integer division;
    /// remainder scenes are dropped rather than redistributed.
    pub fn identify_key_scenes(&self, analysis: &StoryAnalysis, num_scenes: usize) -> Vec<SceneOutline> {
        let acts = &analysis.suggested_acts;
        if acts.is_empty() {
            return Vec::new();
        }

        let scenes_per_act = num_scenes / acts.len();
        let mut outlines = Vec::new();
        let mut scene_number = 1u32;

        for (act_idx, _act) in acts.iter().enumerate() {
            let act_name = format!("Act {}", act_idx + 1);

            for i in 0..scenes_per_act {
                let plot_idx = act_idx * scenes_per_act + i;
                let purpose = analysis
                    .key_plot_points
                    .get(plot_idx)
                    .cloned()
                    .unwrap_or_else(|| format!("Develop {act_name}"));

                outlines.push(SceneOutline {
                    scene_number,
                    act: act_name.clone(),
                    purpose,
                    setting: analysis.setting.clone(),
                    tone: analysis.tone.clone(),
                    location: format!("INT. {} - DAY", analysis.setting.to_uppercase()),
                });
                scene_number += 1;
            }
        }

        outlines
    }
}

/// Label-pattern extraction over free-form analysis text. Missing labels
/// leave fields empty; this never fails.
pub fn parse_analysis(text: &str) -> StoryAnalysis {
    StoryAnalysis {
        main_theme: extract::field(text, &["Main Theme", "Theme"]),
        conflict: extract::field(text, &["Central Conflict", "Conflict"]),
        protagonist: extract::field(text, &["Protagonist"]),
        antagonist: extract::field(text, &["Antagonist"]),
        setting: extract::field(text, &["Setting"]),
        key_plot_points: extract::list_items(text),
        ..Default::default()
    }
}

/// Applied to every analysis regardless of origin: structure beats, logline
/// and genre-derived tone/pacing.
fn finalize_analysis(analysis: &mut StoryAnalysis, input: &StoryInput) {
    analysis.suggested_acts = suggested_acts(&input.act_structure);
    analysis.tone = infer_tone(&input.genre).to_string();
    analysis.pacing = "moderate".to_string();

    let protagonist = non_empty(&analysis.protagonist, "A character");
    let conflict = non_empty(&analysis.conflict, "great challenges");
    let theme = non_empty(&analysis.main_theme, "transformation");
    analysis.logline = format!("{protagonist} must overcome {conflict} in a story about {theme}.");
}

fn non_empty<'s>(value: &'s str, default: &'s str) -> &'s str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

pub fn suggested_acts(act_structure: &str) -> Vec<String> {
    let beats: &[&str] = match act_structure {
        "Five-Act" => &[
            "Act 1: Exposition - Introduce characters and setting",
            "Act 2: Rising Action - Conflict emerges and develops",
            "Act 3: Climax - Peak of dramatic tension",
            "Act 4: Falling Action - Consequences unfold",
            "Act 5: Denouement - Resolution and conclusion",
        ],
        "Hero's Journey" => &[
            "Ordinary World - Establish protagonist's normal life",
            "Call to Adventure - Inciting incident",
            "Refusal of the Call - Initial resistance",
            "Meeting the Mentor - Guidance received",
            "Crossing the Threshold - Commit to journey",
            "Tests, Allies, Enemies - Face challenges",
            "Approach to Inmost Cave - Prepare for ordeal",
            "Ordeal - Face greatest fear",
            "Reward - Gain something from ordeal",
            "The Road Back - Return journey begins",
            "Resurrection - Final test",
            "Return with Elixir - Transformed return",
        ],
        // Three-Act is also the fallback for unknown structures.
        _ => &[
            "Act 1: Setup - Introduce protagonist, world, and conflict",
            "Act 2: Confrontation - Escalate conflict, protagonist faces obstacles",
            "Act 3: Resolution - Climax and resolution of conflict",
        ],
    };
    beats.iter().map(|b| b.to_string()).collect()
}

fn basic_plot_points(act_structure: &str) -> Vec<String> {
    let points: &[&str] = match act_structure {
        "Five-Act" => &[
            "Exposition - Setup",
            "Complication - Conflict emerges",
            "Climax - Peak tension",
            "Reversal - Consequences",
            "Denouement - Resolution",
        ],
        "Hero's Journey" => &[
            "Call to Adventure",
            "Crossing Threshold",
            "Tests and Trials",
            "Ordeal",
            "Return Transformed",
        ],
        _ => &[
            "Opening - Introduce protagonist and world",
            "Inciting Incident - Event that starts the story",
            "First Plot Point - Protagonist commits to journey",
            "Midpoint - Major revelation or reversal",
            "Low Point - All seems lost",
            "Climax - Final confrontation",
            "Resolution - Tie up loose ends",
        ],
    };
    points.iter().map(|p| p.to_string()).collect()
}

fn infer_setting(genre: &str) -> &'static str {
    match genre {
        "Thriller" => "Contemporary urban environment",
        "Sci-Fi" => "Futuristic or alternate reality setting",
        "Horror" => "Isolated or eerie location",
        "Romance" => "Intimate contemporary setting",
        "Action" => "Dynamic, multiple locations",
        "Mystery" => "Atmospheric location with secrets",
        "Comedy" => "Everyday relatable setting",
        "Drama" => "Realistic contemporary setting",
        _ => "Contemporary setting",
    }
}

fn infer_tone(genre: &str) -> &'static str {
    match genre {
        "Thriller" => "tense",
        "Sci-Fi" => "contemplative",
        "Horror" => "dark",
        "Romance" => "emotional",
        "Action" => "intense",
        "Mystery" => "mysterious",
        "Comedy" => "lighthearted",
        _ => "dramatic",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    fn input(act_structure: &str) -> StoryInput {
        StoryInput {
            prompt: "A detective discovers the killer is his future self".to_string(),
            genre: "Thriller".to_string(),
            dialogue_style: "Realistic".to_string(),
            act_structure: act_structure.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fallback_act_counts() {
        let analyzer = StoryAnalyzer::new(None);
        for (structure, expected) in [("Three-Act", 3), ("Five-Act", 5), ("Hero's Journey", 12)] {
            let analysis = analyzer.analyze(&input(structure)).await.unwrap();
            assert_eq!(analysis.suggested_acts.len(), expected, "{structure}");
        }
    }

    #[tokio::test]
    async fn test_fallback_detects_protagonist_keyword() {
        let analyzer = StoryAnalyzer::new(None);
        let analysis = analyzer.analyze(&input("Three-Act")).await.unwrap();
        assert_eq!(analysis.protagonist, "Detective");
        assert_eq!(analysis.tone, "tense");
        assert!(analysis.logline.contains("Detective must overcome"));
    }

    #[test]
    fn test_parse_analysis_extracts_labels() {
        let text = "Main Theme: Identity and fate\n\
                    Conflict: A man hunting himself\n\
                    Protagonist: Detective Reyes\n\
                    Antagonist: His future self\n\
                    Setting: Rain-soaked metropolis\n\
                    Key Plot Points:\n\
                    1. The first body\n\
                    2. The impossible fingerprint\n";
        let analysis = parse_analysis(text);
        assert_eq!(analysis.main_theme, "Identity and fate");
        assert_eq!(analysis.protagonist, "Detective Reyes");
        assert_eq!(analysis.key_plot_points.len(), 2);
        assert_eq!(analysis.key_plot_points[1], "The impossible fingerprint");
    }

    #[test]
    fn test_parse_analysis_missing_labels_stay_empty() {
        let analysis = parse_analysis("The model rambled about nothing useful.");
        assert_eq!(analysis.main_theme, "");
        assert_eq!(analysis.antagonist, "");
        assert!(analysis.key_plot_points.is_empty());
    }

    #[tokio::test]
    async fn test_llm_path_parses_response() {
        #[derive(Debug)]
        struct FixedClient;

        #[async_trait]
        impl TextClient for FixedClient {
            async fn generate(
                &self,
                _prompt: &str,
                _system: Option<&str>,
                _temperature: f32,
                _max_tokens: u32,
            ) -> Result<String> {
                Ok("Main Theme: Trust\nProtagonist: Mara Voss\nSetting: Orbital station".to_string())
            }
        }

        let client = FixedClient;
        let analyzer = StoryAnalyzer::new(Some(&client));
        let analysis = analyzer.analyze(&input("Five-Act")).await.unwrap();
        assert_eq!(analysis.protagonist, "Mara Voss");
        assert_eq!(analysis.suggested_acts.len(), 5);
        // Missing labels never fail the call.
        assert_eq!(analysis.conflict, "");
    }

    #[tokio::test]
    async fn test_identify_key_scenes_distribution() {
        let analyzer = StoryAnalyzer::new(None);
        let analysis = analyzer.analyze(&input("Three-Act")).await.unwrap();

        // 10 scenes over 3 acts: 3 per act, remainder dropped.
        let outlines = analyzer.identify_key_scenes(&analysis, 10);
        assert_eq!(outlines.len(), 9);
        assert_eq!(outlines[0].scene_number, 1);
        assert_eq!(outlines[8].scene_number, 9);
        assert_eq!(outlines[0].act, "Act 1");
        assert_eq!(outlines[8].act, "Act 3");
        // Positional purposes come from plot points while they last.
        assert_eq!(outlines[0].purpose, analysis.key_plot_points[0]);
        assert_eq!(outlines[8].purpose, "Develop Act 3");
    }
}
