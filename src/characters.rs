use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use regex::{Regex, RegexBuilder};

use crate::error::StageError;
use crate::extract;
use crate::llm::TextClient;
use crate::prompts;
use crate::schema::{CharacterProfile, StoryAnalysis};

static CHUNK_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*(?:\d+\.|Character \d+|#{1,3})\s*").expect("valid regex"));

static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"Age\s*:\s*(\d+)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"Role\s*:\s*(protagonist|antagonist|supporting)")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static TRAIT_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+(?:\s+\w+)?)").expect("valid regex"));

/// Builds the character roster, from the text backend when available or from
/// genre vocabularies otherwise. Seedable so fallback output is reproducible.
pub struct CharacterCreator<'a> {
    client: Option<&'a dyn TextClient>,
    rng: StdRng,
}

impl<'a> CharacterCreator<'a> {
    pub fn new(client: Option<&'a dyn TextClient>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { client, rng }
    }

    pub async fn create(
        &mut self,
        analysis: &StoryAnalysis,
        genre: &str,
        num_characters: usize,
    ) -> Result<Vec<CharacterProfile>, StageError> {
        match self.client {
            Some(client) => {
                let analysis_json = serde_json::to_string_pretty(analysis)
                    .map_err(|e| StageError::Parse(e.to_string()))?;
                let prompt = prompts::character_prompt(&analysis_json, genre, num_characters);
                let response = client
                    .generate(&prompt, Some(prompts::SYSTEM_PROMPT_CREATIVE), 0.8, 2500)
                    .await
                    .map_err(StageError::generation)?;

                let characters = parse_characters(&response);
                if characters.is_empty() {
                    return Err(StageError::Parse(
                        "no usable character profiles in response".to_string(),
                    ));
                }
                Ok(characters)
            }
            None => Ok(self.fallback_characters(analysis, genre, num_characters)),
        }
    }

    /// Roster assembled from fixed vocabularies: a protagonist, an antagonist
    /// when the analysis names one and room allows, then supporting fill.
    pub fn fallback_characters(
        &mut self,
        analysis: &StoryAnalysis,
        genre: &str,
        num_characters: usize,
    ) -> Vec<CharacterProfile> {
        let mut characters = Vec::new();

        let protagonist_name = if analysis.protagonist.chars().any(|c| c.is_alphabetic()) {
            title_case(&analysis.protagonist)
        } else {
            "Alex Morgan".to_string()
        };
        let motivation = if analysis.main_theme.trim().is_empty() {
            "To overcome the challenge".to_string()
        } else {
            analysis.main_theme.clone()
        };

        characters.push(CharacterProfile {
            name: protagonist_name.clone(),
            age: self.pick(&[28, 32, 35, 38, 42]),
            role: "protagonist".to_string(),
            description: format!(
                "The determined {} at the center of the story",
                protagonist_name.to_lowercase()
            ),
            personality_traits: genre_traits(genre, "protagonist"),
            visual_description: self.visual_description(genre),
            motivation: Some(motivation),
            arc: Some("From doubt to confidence and understanding".to_string()),
            embedding_id: None,
        });

        if !analysis.antagonist.trim().is_empty() && num_characters > 1 {
            characters.push(CharacterProfile {
                name: self.generate_name(),
                age: self.pick(&[35, 40, 45, 50]),
                role: "antagonist".to_string(),
                description: "The force opposing the protagonist".to_string(),
                personality_traits: genre_traits(genre, "antagonist"),
                visual_description: self.visual_description(genre),
                motivation: Some("To achieve their goal at any cost".to_string()),
                arc: Some("Escalating conflict with protagonist".to_string()),
                embedding_id: None,
            });
        }

        while characters.len() < num_characters {
            characters.push(CharacterProfile {
                name: self.generate_name(),
                age: self.pick(&[25, 30, 35, 40]),
                role: "supporting".to_string(),
                description: "A key supporting character in the story".to_string(),
                personality_traits: genre_traits(genre, "supporting"),
                visual_description: self.visual_description(genre),
                motivation: Some("To help or hinder the protagonist".to_string()),
                arc: Some("Growth through the story".to_string()),
                embedding_id: None,
            });
        }

        characters
    }

    fn pick(&mut self, ages: &[u32]) -> Option<u32> {
        ages.choose(&mut self.rng).copied()
    }

    fn visual_description(&mut self, genre: &str) -> String {
        let builds = ["tall", "average height", "athletic", "slender", "stocky"];
        let hair_colors = [
            "dark hair",
            "blonde hair",
            "red hair",
            "gray hair",
            "brown hair",
        ];
        let features = [
            "sharp features",
            "kind eyes",
            "strong presence",
            "distinctive appearance",
        ];

        let build = builds[self.rng.random_range(0..builds.len())];
        let hair = hair_colors[self.rng.random_range(0..hair_colors.len())];
        let feature = features[self.rng.random_range(0..features.len())];

        let style = match genre {
            "Thriller" => "professional attire, often a leather jacket",
            "Drama" => "casual but thoughtful clothing",
            "Comedy" => "colorful, expressive wardrobe",
            "Sci-Fi" => "practical, futuristic clothing",
            "Horror" => "practical, worn clothing",
            _ => "contemporary clothing",
        };

        format!(
            "{}, {hair}, {feature}, typically wears {style}",
            capitalize(build)
        )
    }

    fn generate_name(&mut self) -> String {
        let first_names = [
            "Alex", "Jordan", "Morgan", "Casey", "Riley", "Taylor", "Sam", "Jamie",
        ];
        let last_names = [
            "Chen", "Garcia", "Smith", "Johnson", "Williams", "Martinez", "Davis", "Rodriguez",
        ];
        format!(
            "{} {}",
            first_names[self.rng.random_range(0..first_names.len())],
            last_names[self.rng.random_range(0..last_names.len())]
        )
    }
}

/// Split a free-form response into per-character chunks and extract the
/// labeled fields from each. Chunks under 50 characters or without a usable
/// name are discarded.
pub fn parse_characters(response: &str) -> Vec<CharacterProfile> {
    let mut characters = Vec::new();

    for chunk in CHUNK_SPLIT_RE.split(response) {
        if chunk.trim().len() < 50 {
            continue;
        }

        let name = extract::field(chunk, &["Name", "Character"]);
        let name = name.split(',').next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }

        let age = AGE_RE
            .captures(chunk)
            .and_then(|caps| caps[1].parse::<u32>().ok());
        let role = ROLE_RE
            .captures(chunk)
            .map(|caps| caps[1].to_lowercase())
            .unwrap_or_else(|| "supporting".to_string());

        let traits_text = extract::section(chunk, r"Personality Traits?", &["Visual", "Motivation"]);
        let personality_traits: Vec<String> = TRAIT_WORD_RE
            .captures_iter(&traits_text)
            .map(|caps| caps[1].trim().to_string())
            .filter(|t| t.len() > 2)
            .take(5)
            .collect();

        let motivation = extract::section(chunk, "Motivation", &["Arc"]);
        let arc = extract::section(chunk, r"(?:Character )?Arc", &[]);

        characters.push(CharacterProfile {
            name,
            age,
            role,
            description: extract::section(chunk, "Description", &["Personality", "Visual"]),
            personality_traits,
            visual_description: extract::section(chunk, "Visual Description", &["Motivation", "Arc"]),
            motivation: if motivation.is_empty() { None } else { Some(motivation) },
            arc: if arc.is_empty() { None } else { Some(arc) },
            embedding_id: None,
        });
    }

    characters
}

fn genre_traits(genre: &str, role: &str) -> Vec<String> {
    let traits: &[&str] = match (genre, role) {
        ("Thriller", "protagonist") => &["determined", "intelligent", "cautious", "resourceful"],
        ("Thriller", "antagonist") => &["cunning", "ruthless", "calculating", "mysterious"],
        ("Thriller", "supporting") => &["loyal", "skeptical", "brave", "insightful"],
        ("Drama", "protagonist") => &["complex", "emotional", "conflicted", "passionate"],
        ("Drama", "antagonist") => &["flawed", "stubborn", "proud", "defensive"],
        ("Drama", "supporting") => &["empathetic", "wise", "patient", "understanding"],
        ("Comedy", "protagonist") => &["optimistic", "awkward", "endearing", "witty"],
        ("Comedy", "antagonist") => &["pompous", "oblivious", "competitive", "eccentric"],
        ("Comedy", "supporting") => &["quirky", "supportive", "humorous", "lovable"],
        ("Sci-Fi", "protagonist") => &["curious", "adaptable", "logical", "visionary"],
        ("Sci-Fi", "antagonist") => &["ambitious", "cold", "technological", "powerful"],
        ("Sci-Fi", "supporting") => &["knowledgeable", "inventive", "analytical", "cautious"],
        ("Horror", "protagonist") => &["brave", "traumatized", "protective", "desperate"],
        ("Horror", "antagonist") => &["terrifying", "relentless", "supernatural", "evil"],
        ("Horror", "supporting") => &["fearful", "doubtful", "vulnerable", "resilient"],
        _ => &["complex", "interesting", "motivated"],
    };
    traits.iter().map(|t| t.to_string()).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|w| capitalize(&w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}
