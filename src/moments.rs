use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::extract;

static SCENE_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\d+\.?\s*(?:INT/EXT|INT|EXT)\.?\s+.+?\s+-\s+(?:DAY|NIGHT|DAWN|DUSK|CONTINUOUS)",
    )
    .case_insensitive(true)
    .build()
    .expect("valid regex")
});

static SETTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"(?:INT/EXT|INT|EXT)\.?\s+(.+?)\s+-\s+(?:DAY|NIGHT|DAWN|DUSK|CONTINUOUS)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

const ACTION_WEIGHTS: [(&str, f32); 14] = [
    ("fight", 3.0),
    ("chase", 2.5),
    ("explosion", 2.5),
    ("crash", 2.0),
    ("runs", 1.5),
    ("enters", 1.0),
    ("reveals", 2.0),
    ("discovers", 2.0),
    ("opens", 1.5),
    ("looks", 1.0),
    ("watches", 1.0),
    ("fire", 2.0),
    ("blood", 2.0),
    ("kiss", 2.0),
];

const EMOTIONAL_WEIGHTS: [(&str, f32); 8] = [
    ("tears", 1.5),
    ("screams", 1.5),
    ("laughs", 1.0),
    ("cries", 1.5),
    ("shouts", 1.0),
    ("whispers", 1.0),
    ("smiles", 0.5),
    ("frowns", 0.5),
];

// Ties resolve to the earlier bucket.
const TONE_KEYWORDS: [(&str, &[&str]); 6] = [
    ("tense", &["danger", "threat", "chase", "fight", "urgent", "panic"]),
    ("dramatic", &["confrontation", "revelation", "tears", "shout", "argument"]),
    ("mysterious", &["shadow", "dark", "hidden", "secret", "whisper"]),
    ("romantic", &["kiss", "embrace", "love", "tender", "gentle"]),
    ("action", &["explosion", "crash", "run", "leap", "strike"]),
    ("peaceful", &["calm", "quiet", "serene", "gentle", "soft"]),
];

const NON_CHARACTER_CUES: [&str; 7] =
    ["INT", "EXT", "DAY", "NIGHT", "CONTINUOUS", "CUT TO", "FADE IN"];

/// A scene picked for the storyboard, with the scoring evidence attached.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Moment {
    pub frame_number: u32,
    pub scene_number: u32,
    pub description: String,
    pub emotional_tone: String,
    pub characters: Vec<String>,
    pub setting: String,
    pub importance: f32,
}

#[derive(Debug)]
struct ScoredScene {
    scene_number: u32,
    content: String,
    description: String,
    tone: String,
    characters: Vec<String>,
    setting: String,
    score: f32,
}

/// Scores all scenes in a formatted screenplay for visual importance and
/// selects the top `num_frames`, re-sorted into narrative order.
pub fn identify_key_moments(screenplay_text: &str, num_frames: usize) -> Vec<Moment> {
    let mut scenes = parse_scenes(screenplay_text);
    let total_scenes = scenes.len();

    for scene in &mut scenes {
        scene.score = score_scene(scene, total_scenes);
    }

    // Stable sort keeps narrative order among equal scores.
    scenes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scenes.truncate(num_frames);
    scenes.sort_by_key(|s| s.scene_number);

    scenes
        .into_iter()
        .enumerate()
        .map(|(idx, scene)| Moment {
            frame_number: idx as u32 + 1,
            scene_number: scene.scene_number,
            description: scene.description,
            emotional_tone: scene.tone,
            characters: scene.characters,
            setting: scene.setting,
            importance: scene.score,
        })
        .collect()
}

/// Split the screenplay on numbered scene headings. Scenes are renumbered
/// sequentially from 1 in order of appearance.
fn parse_scenes(screenplay_text: &str) -> Vec<ScoredScene> {
    let headings: Vec<regex::Match> = SCENE_HEADING_RE.find_iter(screenplay_text).collect();
    let mut scenes = Vec::with_capacity(headings.len());

    for (idx, heading) in headings.iter().enumerate() {
        let content_start = heading.end();
        let content_end = headings
            .get(idx + 1)
            .map(|next| next.start())
            .unwrap_or(screenplay_text.len());
        let content = &screenplay_text[content_start..content_end];

        scenes.push(ScoredScene {
            scene_number: idx as u32 + 1,
            content: content.to_string(),
            description: extract_description(content),
            tone: infer_tone(content),
            characters: extract_characters(content),
            setting: extract_setting(heading.as_str()),
            score: 0.0,
        });
    }

    scenes
}

fn score_scene(scene: &ScoredScene, total_scenes: usize) -> f32 {
    score_content(
        &scene.content.to_lowercase(),
        scene.scene_number,
        total_scenes,
        scene.characters.len(),
    )
}

fn score_content(
    content_lower: &str,
    scene_number: u32,
    total_scenes: usize,
    num_characters: usize,
) -> f32 {
    let mut score = 0.0;

    for (keyword, weight) in ACTION_WEIGHTS {
        if content_lower.contains(keyword) {
            score += weight;
        }
    }
    for (keyword, weight) in EMOTIONAL_WEIGHTS {
        if content_lower.contains(keyword) {
            score += weight * 0.7;
        }
    }

    if num_characters >= 2 {
        score += 1.5;
    }

    let total = total_scenes as f32;
    let num = scene_number as f32;
    if scene_number == 1 {
        score += 2.0;
    } else if scene_number as usize == total_scenes {
        score += 2.5;
    } else if num <= total * 0.25 {
        score += 1.0;
    } else if num >= total * 0.75 {
        score += 1.5;
    }

    if content_lower.len() > 500 {
        score += 1.0;
    }

    score
}

/// First three action lines before any character cue, truncated to 200 chars.
fn extract_description(content: &str) -> String {
    let mut action_lines = Vec::new();

    for line in content.trim().lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if extract::is_all_caps(stripped) {
            break;
        }
        action_lines.push(stripped);
        if action_lines.len() >= 3 {
            break;
        }
    }

    let mut description = action_lines.join(" ");
    if description.len() > 200 {
        let cut = description
            .char_indices()
            .take_while(|(i, _)| *i <= 197)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        description.truncate(cut);
        description.push_str("...");
    }

    if description.is_empty() {
        "Scene action".to_string()
    } else {
        description
    }
}

fn infer_tone(content: &str) -> String {
    let content_lower = content.to_lowercase();

    let mut best_tone = "dramatic";
    let mut best_count = 0;
    for (tone, keywords) in TONE_KEYWORDS {
        let count = keywords
            .iter()
            .filter(|kw| content_lower.contains(*kw))
            .count();
        if count > best_count {
            best_tone = tone;
            best_count = count;
        }
    }

    best_tone.to_string()
}

fn extract_characters(content: &str) -> Vec<String> {
    let mut characters: Vec<String> = Vec::new();

    for line in content.lines() {
        let stripped = line.trim();
        if extract::is_all_caps(stripped)
            && (2..=30).contains(&stripped.len())
            && !NON_CHARACTER_CUES.contains(&stripped)
            && !characters.iter().any(|c| c == stripped)
        {
            characters.push(stripped.to_string());
        }
    }

    characters
}

fn extract_setting(heading: &str) -> String {
    SETTING_RE
        .captures(heading)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_else(|| "LOCATION".to_string())
}

/// Camera angle keyed off the moment's description and cast size.
pub fn suggest_camera_angle(moment: &Moment) -> &'static str {
    let description = moment.description.to_lowercase();

    if ["fight", "chase", "runs", "explosion"]
        .iter()
        .any(|w| description.contains(w))
    {
        return "Wide Shot";
    }
    if ["tears", "whispers", "kiss", "cries"]
        .iter()
        .any(|w| description.contains(w))
    {
        return "Close-Up";
    }
    if ["discovers", "reveals", "realizes"]
        .iter()
        .any(|w| description.contains(w))
    {
        return "Medium Shot";
    }

    if moment.characters.len() >= 2 {
        return if moment.characters.len() > 2 {
            "Medium Shot"
        } else {
            "Over the Shoulder"
        };
    }

    "Medium Shot"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screenplay(num_scenes: usize) -> String {
        let mut text = String::new();
        for n in 1..=num_scenes {
            text.push_str(&format!("{n}. INT. OFFICE {n} - DAY\n\n"));
            if n == 2 {
                text.push_str("A fight breaks out as the chase reaches the rooftop.\n\n");
                text.push_str("MARA\nStop running!\n\nDORIAN\nNever.\n\n");
            } else {
                text.push_str("Someone looks out the window.\n\n");
            }
        }
        text
    }

    #[test]
    fn test_identify_key_moments_count_and_order() {
        let moments = identify_key_moments(&screenplay(6), 3);
        assert_eq!(moments.len(), 3);

        // Narrative order with sequential frame numbers.
        let frame_numbers: Vec<u32> = moments.iter().map(|m| m.frame_number).collect();
        assert_eq!(frame_numbers, vec![1, 2, 3]);
        let scene_numbers: Vec<u32> = moments.iter().map(|m| m.scene_number).collect();
        let mut sorted = scene_numbers.clone();
        sorted.sort_unstable();
        assert_eq!(scene_numbers, sorted);

        // Scene 2 carries fight and chase keywords plus two characters.
        assert!(moments.iter().any(|m| m.scene_number == 2));
    }

    #[test]
    fn test_identify_key_moments_fewer_scenes_than_frames() {
        let moments = identify_key_moments(&screenplay(2), 8);
        assert_eq!(moments.len(), 2);
    }

    #[test]
    fn test_scene_parsing_fields() {
        let moments = identify_key_moments(&screenplay(3), 8);
        let second = moments.iter().find(|m| m.scene_number == 2).unwrap();
        assert_eq!(second.setting, "OFFICE 2");
        assert_eq!(second.characters, vec!["MARA", "DORIAN"]);
        assert!(second.description.starts_with("A fight breaks out"));
        assert_eq!(second.emotional_tone, "tense");
    }

    #[test]
    fn test_tone_default_and_tie_order() {
        assert_eq!(infer_tone("Nothing notable happens here."), "dramatic");
        // "chase" hits tense; "crash" hits action; tense wins a 1-1 tie.
        assert_eq!(infer_tone("A chase ends in a crash."), "tense");
    }

    #[test]
    fn test_description_truncation() {
        let long_line = "x".repeat(300);
        let description = extract_description(&long_line);
        assert_eq!(description.len(), 200);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_extract_characters_excludes_cues() {
        let content = "FADE IN\n\nMARA\nHello.\n\nCUT TO\n\nMARA\nAgain.\n";
        assert_eq!(extract_characters(content), vec!["MARA"]);
    }

    #[test]
    fn test_suggest_camera_angles() {
        let mut moment = Moment {
            frame_number: 1,
            scene_number: 1,
            description: "A fight on the rooftop".to_string(),
            emotional_tone: "tense".to_string(),
            characters: vec![],
            setting: "ROOFTOP".to_string(),
            importance: 0.0,
        };
        assert_eq!(suggest_camera_angle(&moment), "Wide Shot");

        moment.description = "She cries alone".to_string();
        assert_eq!(suggest_camera_angle(&moment), "Close-Up");

        moment.description = "He reveals the truth".to_string();
        assert_eq!(suggest_camera_angle(&moment), "Medium Shot");

        moment.description = "They talk".to_string();
        moment.characters = vec!["A".to_string(), "B".to_string()];
        assert_eq!(suggest_camera_angle(&moment), "Over the Shoulder");

        moment.characters.push("C".to_string());
        assert_eq!(suggest_camera_angle(&moment), "Medium Shot");

        moment.characters.clear();
        assert_eq!(suggest_camera_angle(&moment), "Medium Shot");
    }
}
