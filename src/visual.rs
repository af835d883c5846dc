use crate::moments::Moment;
use crate::schema::{CharacterProfile, CAMERA_ANGLES};

struct StyleModifier {
    prefix: &'static str,
    quality: &'static str,
    lighting: &'static str,
    negative: &'static str,
}

fn style_modifier(visual_style: &str) -> Option<StyleModifier> {
    match visual_style {
        "Realistic" => Some(StyleModifier {
            prefix: "Cinematic photograph",
            quality: "photorealistic, film still, 4k quality",
            lighting: "natural cinematic lighting",
            negative: "cartoon, anime, illustration, painting, drawing",
        }),
        "Noir" => Some(StyleModifier {
            prefix: "Film noir style",
            quality: "black and white, high contrast, dramatic shadows",
            lighting: "dramatic chiaroscuro lighting, venetian blind shadows",
            negative: "color, bright, cheerful, soft lighting",
        }),
        "Illustrated" => Some(StyleModifier {
            prefix: "Digital illustration",
            quality: "concept art style, detailed artwork",
            lighting: "painterly lighting",
            negative: "photograph, photorealistic, 3d render",
        }),
        "Anime" => Some(StyleModifier {
            prefix: "Anime style illustration",
            quality: "anime art, cel-shaded, vibrant colors",
            lighting: "anime lighting style",
            negative: "photograph, realistic, western art style",
        }),
        "Sketch" => Some(StyleModifier {
            prefix: "Storyboard sketch",
            quality: "pencil drawing, loose sketch, storyboard art",
            lighting: "sketch shading",
            negative: "photograph, colored, finished artwork",
        }),
        _ => None,
    }
}

fn lighting_preset(tone: &str) -> &'static str {
    match tone {
        "tense" => "harsh lighting, deep shadows, high contrast",
        "dramatic" => "dramatic three-point lighting, rim lighting",
        "mysterious" => "low-key lighting, shadows, dim ambiance",
        "romantic" => "soft warm lighting, golden hour glow",
        "action" => "dynamic lighting, motion-enhanced",
        "peaceful" => "soft natural lighting, gentle diffusion",
        "dark" => "low-key lighting, minimal fill light",
        "lighthearted" => "bright even lighting, cheerful ambiance",
        _ => "natural lighting",
    }
}

/// Composition phrases parallel to [`CAMERA_ANGLES`].
const COMPOSITIONS: [&str; 9] = [
    "rule of thirds, environmental context, establishing shot composition",
    "centered framing, balanced composition, waist-up framing",
    "tight framing, facial focus, shallow depth of field",
    "extreme detail focus, macro composition",
    "subjective camera angle, first-person perspective",
    "over-shoulder framing, conversational composition",
    "top-down perspective, overhead angle",
    "upward camera angle, dramatic power composition",
    "downward camera angle, vulnerable framing",
];

fn composition_rule(camera_angle: &str) -> &'static str {
    CAMERA_ANGLES
        .iter()
        .position(|angle| angle.eq_ignore_ascii_case(camera_angle))
        .map(|i| COMPOSITIONS[i])
        .unwrap_or("balanced composition")
}

fn tone_descriptor(tone: &str) -> &'static str {
    match tone {
        "tense" => "tense atmosphere, high contrast",
        "dramatic" => "dramatic mood, cinematic",
        "mysterious" => "mysterious ambiance, shadows",
        "romantic" => "warm and intimate atmosphere",
        "action" => "dynamic energy, motion blur",
        "peaceful" => "calm and serene mood",
        "dark" => "dark and moody atmosphere",
        "lighthearted" => "bright and cheerful mood",
        _ => "cinematic atmosphere",
    }
}

/// Deterministic prompt assembly for one storyboard frame: style prefix,
/// description, setting, cast, camera, lighting, composition, quality tags,
/// with the style's negative prompt appended after a `|` separator.
pub fn generate_visual_prompt(
    moment: &Moment,
    visual_style: &str,
    camera_angle: &str,
    characters: &[CharacterProfile],
) -> String {
    let style = style_modifier(visual_style);
    let mut parts: Vec<String> = Vec::new();

    if let Some(style) = &style {
        parts.push(style.prefix.to_string());
    }

    let description = if moment.description.is_empty() {
        "A scene from the story"
    } else {
        &moment.description
    };
    parts.push(description.to_string());
    parts.push(format!("in {}", moment.setting));

    let cast = format_character_descriptions(&moment.characters, characters);
    if !cast.is_empty() {
        parts.push(format!("featuring {cast}"));
    }

    parts.push(camera_angle.to_lowercase());

    let lighting = style
        .as_ref()
        .map(|s| s.lighting)
        .unwrap_or_else(|| lighting_preset(&moment.emotional_tone));
    parts.push(lighting.to_string());
    parts.push(composition_rule(camera_angle).to_string());

    if let Some(style) = &style {
        parts.push(style.quality.to_string());
    }

    parts.push(tone_descriptor(&moment.emotional_tone).to_string());
    parts.push("highly detailed, professional quality".to_string());

    let mut prompt = parts.join(", ");
    if let Some(style) = &style {
        prompt.push_str(&format!(" | Negative: {}", style.negative));
    }
    prompt
}

/// Resolve the moment's character names to visual descriptions, joined with
/// "and" (two names) or an Oxford comma (three or more).
pub fn format_character_descriptions(
    names: &[String],
    characters: &[CharacterProfile],
) -> String {
    if names.is_empty() {
        return String::new();
    }

    let descriptions: Vec<String> = names
        .iter()
        .map(|name| {
            characters
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .filter(|c| !c.visual_description.is_empty())
                .map(|c| c.visual_description.clone())
                .unwrap_or_else(|| format!("character {name}"))
        })
        .collect();

    match descriptions.len() {
        1 => descriptions[0].clone(),
        2 => format!("{} and {}", descriptions[0], descriptions[1]),
        n => format!(
            "{}, and {}",
            descriptions[..n - 1].join(", "),
            descriptions[n - 1]
        ),
    }
}

/// Split a generated prompt back into its positive and negative halves for
/// image backends that take them as separate fields.
pub fn split_negative(prompt: &str) -> (String, Option<String>) {
    match prompt.split_once(" | Negative: ") {
        Some((positive, negative)) => (positive.to_string(), Some(negative.to_string())),
        None => (prompt.to_string(), None),
    }
}
