use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::error::StageError;
use crate::extract;
use crate::llm::TextClient;
use crate::prompts;
use crate::schema::{CharacterProfile, DialogueLine, Scene, SceneLocation, SceneOutline};

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(INT/EXT|INT|EXT)\.?\s*(.+?)\s*-\s*(DAY|NIGHT|DAWN|DUSK|CONTINUOUS)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static LOCATION_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(INT/EXT|INT|EXT)\.?\s*(.+)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static SCENE_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(?:\d+\.?\s*)?(INT/EXT|INT|EXT)\.?\s+.+\s+-\s+(DAY|NIGHT|DAWN|DUSK|CONTINUOUS)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

/// Writes individual scenes from outlines, either through the text backend
/// or with a minimal deterministic fallback.
pub struct SceneWriter<'a> {
    client: Option<&'a dyn TextClient>,
}

impl<'a> SceneWriter<'a> {
    pub fn new(client: Option<&'a dyn TextClient>) -> Self {
        Self { client }
    }

    pub async fn write_scene(
        &self,
        outline: &SceneOutline,
        characters: &[CharacterProfile],
        dialogue_style: &str,
        genre: &str,
    ) -> Result<Scene, StageError> {
        let location = parse_location(&outline.location);
        let act = if outline.act.is_empty() {
            infer_act(outline.scene_number)
        } else {
            outline.act.as_str()
        };

        match self.client {
            Some(client) => {
                let prompt = prompts::scene_prompt(
                    outline.scene_number,
                    act,
                    &outline.location,
                    &location.time,
                    &outline.purpose,
                    &character_summaries(characters),
                    dialogue_style,
                    genre,
                );
                let text = client
                    .generate(&prompt, Some(prompts::SYSTEM_PROMPT_CREATIVE), 0.75, 2000)
                    .await
                    .map_err(StageError::generation)?;
                Ok(parse_scene_text(&text, outline.scene_number, location))
            }
            None => Ok(self.fallback_scene(outline, characters, location)),
        }
    }

    /// Placeholder scene: one action line built from the outline, plus a
    /// stock two-line exchange when at least two characters exist.
    pub fn fallback_scene(
        &self,
        outline: &SceneOutline,
        characters: &[CharacterProfile],
        location: SceneLocation,
    ) -> Scene {
        let action = format!(
            "The scene takes place in {}. {}",
            location.location.to_lowercase(),
            outline.purpose
        );

        let mut dialogue = Vec::new();
        if characters.len() >= 2 {
            dialogue.push(DialogueLine {
                character: characters[0].name.to_uppercase(),
                line: "We need to discuss what happens next.".to_string(),
                parenthetical: None,
            });
            dialogue.push(DialogueLine {
                character: characters[1].name.to_uppercase(),
                line: "I understand. What do you propose?".to_string(),
                parenthetical: None,
            });
        }

        Scene {
            scene_number: outline.scene_number,
            location,
            action,
            dialogue,
            page_number: None,
        }
    }

    pub async fn generate_dialogue(
        &self,
        context: &str,
        characters: &[CharacterProfile],
        style: &str,
        tone: &str,
        num_exchanges: usize,
    ) -> Result<Vec<DialogueLine>, StageError> {
        match self.client {
            Some(client) => {
                let prompt = prompts::dialogue_prompt(
                    context,
                    &character_summaries(characters),
                    style,
                    tone,
                    num_exchanges,
                );
                let text = client
                    .generate(&prompt, Some(prompts::SYSTEM_PROMPT_CREATIVE), 0.85, 1500)
                    .await
                    .map_err(StageError::generation)?;
                Ok(parse_dialogue_text(&text))
            }
            None => Ok(fallback_dialogue(characters, num_exchanges)),
        }
    }
}

/// Parse "INT. OFFICE - DAY" style headings. Falls back to splitting on the
/// last dash, then to the default location when nothing matches.
pub fn parse_location(location_str: &str) -> SceneLocation {
    let trimmed = location_str.trim();

    if let Some(caps) = LOCATION_RE.captures(trimmed) {
        return SceneLocation {
            setting: caps[1].to_uppercase(),
            location: caps[2].trim().to_uppercase(),
            time: caps[3].to_uppercase(),
        };
    }

    let mut result = SceneLocation::default();
    if let Some((head, tail)) = trimmed.rsplit_once('-') {
        result.time = tail.trim().to_uppercase();
        if let Some(caps) = LOCATION_PREFIX_RE.captures(head.trim()) {
            result.setting = caps[1].to_uppercase();
            result.location = caps[2].trim().to_uppercase();
        }
    }
    result
}

pub fn is_scene_heading(line: &str) -> bool {
    SCENE_HEADING_RE.is_match(line)
}

/// Line-scan a generated scene into action and dialogue. All-caps short lines
/// are character cues; a "(x)" line after a cue is a parenthetical; the next
/// line after a cue is that character's dialogue. Scene headings are dropped
/// and action paragraphs are joined with blank lines.
pub fn parse_scene_text(text: &str, scene_number: u32, location: SceneLocation) -> Scene {
    let mut action_lines: Vec<String> = Vec::new();
    let mut dialogue: Vec<DialogueLine> = Vec::new();

    let mut current_action: Vec<&str> = Vec::new();
    let mut current_character: Option<String> = None;
    let mut current_parenthetical: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();

        if stripped.is_empty() || is_scene_heading(stripped) {
            continue;
        }

        if extract::is_all_caps(stripped) && stripped.len() < 30 {
            if !current_action.is_empty() {
                action_lines.push(current_action.join(" "));
                current_action.clear();
            }
            current_character = Some(stripped.to_string());
            current_parenthetical = None;
            continue;
        }

        if stripped.starts_with('(') && stripped.ends_with(')') {
            current_parenthetical = Some(stripped[1..stripped.len() - 1].to_string());
            continue;
        }

        match current_character.take() {
            Some(character) => {
                dialogue.push(DialogueLine {
                    character,
                    line: stripped.to_string(),
                    parenthetical: current_parenthetical.take(),
                });
            }
            None => current_action.push(stripped),
        }
    }

    if !current_action.is_empty() {
        action_lines.push(current_action.join(" "));
    }

    Scene {
        scene_number,
        location,
        action: action_lines.join("\n\n"),
        dialogue,
        page_number: None,
    }
}

pub fn parse_dialogue_text(text: &str) -> Vec<DialogueLine> {
    let mut dialogue = Vec::new();
    let mut current_character: Option<String> = None;
    let mut current_parenthetical: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if extract::is_all_caps(stripped) {
            current_character = Some(stripped.to_string());
            current_parenthetical = None;
            continue;
        }

        if stripped.starts_with('(') && stripped.ends_with(')') {
            current_parenthetical = Some(stripped[1..stripped.len() - 1].to_string());
            continue;
        }

        if let Some(character) = current_character.clone() {
            dialogue.push(DialogueLine {
                character,
                line: stripped.to_string(),
                parenthetical: current_parenthetical.take(),
            });
        }
    }

    dialogue
}

/// Stock exchange lines handed round-robin to the cast.
pub fn fallback_dialogue(characters: &[CharacterProfile], num_exchanges: usize) -> Vec<DialogueLine> {
    const TEMPLATES: [&str; 5] = [
        "What do you think we should do?",
        "I'm not sure that's the right approach.",
        "We need to consider all our options.",
        "Time is running out.",
        "I have an idea that might work.",
    ];

    if characters.is_empty() {
        return Vec::new();
    }

    TEMPLATES
        .iter()
        .take(num_exchanges)
        .enumerate()
        .map(|(i, template)| DialogueLine {
            character: characters[i % characters.len()].name.to_uppercase(),
            line: template.to_string(),
            parenthetical: None,
        })
        .collect()
}

/// Industry-format scene block: numbered uppercase heading, action paragraph,
/// then dialogue with cue/parenthetical/line indentation.
pub fn format_scene(scene: &Scene) -> String {
    let mut lines: Vec<String> = Vec::new();

    let heading = format!(
        "{}. {}. {} - {}",
        scene.scene_number, scene.location.setting, scene.location.location, scene.location.time
    );
    lines.push(heading.to_uppercase());
    lines.push(String::new());

    if !scene.action.is_empty() {
        lines.push(scene.action.clone());
        lines.push(String::new());
    }

    for dialogue in &scene.dialogue {
        lines.push(format!("{}{}", " ".repeat(20), dialogue.character.to_uppercase()));
        if let Some(parenthetical) = &dialogue.parenthetical {
            lines.push(format!("{}({parenthetical})", " ".repeat(15)));
        }
        for wrapped in wrap_dialogue(&dialogue.line, 60) {
            lines.push(format!("{}{wrapped}", " ".repeat(10)));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Greedy word wrap; words longer than the width get their own line.
pub fn wrap_dialogue(text: &str, max_width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_length = 0;

    for word in text.split_whitespace() {
        let word_length = word.len() + 1;
        if current_length + word_length > max_width && !current.is_empty() {
            lines.push(current.join(" "));
            current = vec![word];
            current_length = word.len();
        } else {
            current.push(word);
            current_length += word_length;
        }
    }

    if !current.is_empty() {
        lines.push(current.join(" "));
    }

    lines
}

/// Scenes 1-3 sit in Act 1, 4-7 in Act 2, the rest in Act 3.
pub fn infer_act(scene_number: u32) -> &'static str {
    match scene_number {
        1..=3 => "Act 1",
        4..=7 => "Act 2",
        _ => "Act 3",
    }
}

/// One line per character: "Name: description (first three traits)".
pub fn character_summaries(characters: &[CharacterProfile]) -> String {
    characters
        .iter()
        .map(|c| {
            let mut summary = format!("{}: {}", c.name, c.description);
            if !c.personality_traits.is_empty() {
                let traits: Vec<&str> = c
                    .personality_traits
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                summary.push_str(&format!(" ({})", traits.join(", ")));
            }
            summary
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str) -> CharacterProfile {
        CharacterProfile {
            name: name.to_string(),
            age: Some(30),
            role: "supporting".to_string(),
            description: "A test character".to_string(),
            personality_traits: vec!["calm".to_string(), "direct".to_string()],
            visual_description: String::new(),
            motivation: None,
            arc: None,
            embedding_id: None,
        }
    }

    #[test]
    fn test_parse_location_strict() {
        let loc = parse_location("INT. COFFEE SHOP - DAY");
        assert_eq!(loc.setting, "INT");
        assert_eq!(loc.location, "COFFEE SHOP");
        assert_eq!(loc.time, "DAY");

        let loc = parse_location("int/ext warehouse - night");
        assert_eq!(loc.setting, "INT/EXT");
        assert_eq!(loc.location, "WAREHOUSE");
        assert_eq!(loc.time, "NIGHT");
    }

    #[test]
    fn test_parse_location_fallbacks() {
        // Dash split with a recognizable prefix.
        let loc = parse_location("EXT rooftop garden - midnight");
        assert_eq!(loc.setting, "EXT");
        assert_eq!(loc.location, "ROOFTOP GARDEN");
        assert_eq!(loc.time, "MIDNIGHT");

        // Nothing matches: full defaults.
        let loc = parse_location("somewhere vague");
        assert_eq!(loc, SceneLocation::default());
    }

    #[test]
    fn test_parse_scene_text_line_scan() {
        let text = "INT. COFFEE SHOP - DAY\n\n\
            Rain streaks the windows. MARA sits alone.\n\n\
            MARA\n\
            (quietly)\n\
            I know you followed me here.\n\n\
            DORIAN\n\
            Would you believe it was a coincidence?\n\n\
            She doesn't answer. The espresso machine hisses.\n";

        let scene = parse_scene_text(text, 3, SceneLocation::default());
        assert_eq!(scene.scene_number, 3);
        assert_eq!(scene.dialogue.len(), 2);
        assert_eq!(scene.dialogue[0].character, "MARA");
        assert_eq!(scene.dialogue[0].parenthetical.as_deref(), Some("quietly"));
        assert_eq!(scene.dialogue[0].line, "I know you followed me here.");
        assert_eq!(scene.dialogue[1].parenthetical, None);
        // Heading dropped, two action paragraphs joined with a blank line.
        assert!(!scene.action.contains("COFFEE SHOP - DAY"));
        assert!(scene.action.contains("Rain streaks the windows."));
        assert!(scene.action.contains("\n\nShe doesn't answer."));
    }

    #[test]
    fn test_fallback_scene_and_dialogue() {
        let writer = SceneWriter::new(None);
        let outline = SceneOutline {
            scene_number: 2,
            act: "Act 1".to_string(),
            purpose: "Inciting Incident".to_string(),
            setting: "City".to_string(),
            tone: "tense".to_string(),
            location: "INT. OFFICE - NIGHT".to_string(),
        };
        let characters = vec![character("Mara"), character("Dorian")];

        let scene = writer.fallback_scene(&outline, &characters, parse_location(&outline.location));
        assert_eq!(scene.action, "The scene takes place in office. Inciting Incident");
        assert_eq!(scene.dialogue.len(), 2);
        assert_eq!(scene.dialogue[0].character, "MARA");

        let dialogue = fallback_dialogue(&characters, 5);
        assert_eq!(dialogue.len(), 5);
        assert_eq!(dialogue[0].character, "MARA");
        assert_eq!(dialogue[1].character, "DORIAN");
        assert_eq!(dialogue[2].character, "MARA");
    }

    #[test]
    fn test_format_scene_layout() {
        let scene = Scene {
            scene_number: 1,
            location: parse_location("INT. OFFICE - DAY"),
            action: "The office is empty.".to_string(),
            dialogue: vec![DialogueLine {
                character: "Mara".to_string(),
                line: "Hello?".to_string(),
                parenthetical: Some("calling out".to_string()),
            }],
            page_number: None,
        };

        let text = format_scene(&scene);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1. INT. OFFICE - DAY");
        assert!(lines.contains(&"The office is empty."));
        assert!(lines.contains(&format!("{}MARA", " ".repeat(20)).as_str()));
        assert!(lines.contains(&format!("{}(calling out)", " ".repeat(15)).as_str()));
        assert!(lines.contains(&format!("{}Hello?", " ".repeat(10)).as_str()));
    }

    #[test]
    fn test_wrap_dialogue_width() {
        let text = "This is a deliberately long line of dialogue that must be wrapped \
                    at sixty characters because screenplay dialogue columns are narrow.";
        let wrapped = wrap_dialogue(text, 60);
        assert!(wrapped.len() > 1);
        assert!(wrapped.iter().all(|l| l.len() <= 60));
        assert_eq!(wrapped.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_infer_act_boundaries() {
        assert_eq!(infer_act(1), "Act 1");
        assert_eq!(infer_act(3), "Act 1");
        assert_eq!(infer_act(4), "Act 2");
        assert_eq!(infer_act(7), "Act 2");
        assert_eq!(infer_act(8), "Act 3");
    }

    #[test]
    fn test_character_summaries_traits_capped() {
        let mut c = character("Mara");
        c.personality_traits = vec![
            "calm".to_string(),
            "direct".to_string(),
            "wry".to_string(),
            "tired".to_string(),
        ];
        let summary = character_summaries(&[c]);
        assert_eq!(summary, "Mara: A test character (calm, direct, wry)");
    }
}
