//! Prompt templates for the three generation stages. Plain string assembly,
//! no logic beyond substitution.

pub const SYSTEM_PROMPT_CREATIVE: &str = "You are a screenwriting and visual storytelling \
assistant with expert knowledge of industry-standard screenplay formatting, story structure, \
character development and cinematography. Respond with professional, properly formatted, \
specific output.";

pub fn story_analysis_prompt(prompt: &str, genre: &str, act_structure: &str) -> String {
    format!(
        "Analyze the following story prompt and extract the key elements for screenplay \
development.\n\n\
Story Prompt: {prompt}\n\
Genre: {genre}\n\
Act Structure: {act_structure}\n\n\
Provide a structured analysis with these labeled fields:\n\
1. Main Theme: the core theme or message\n\
2. Conflict: the central conflict\n\
3. Protagonist: the main character\n\
4. Antagonist: who or what opposes the protagonist\n\
5. Setting: where and when the story takes place\n\
6. Key Plot Points: the major story beats, as a numbered list"
    )
}

pub fn character_prompt(analysis: &str, genre: &str, num_characters: usize) -> String {
    format!(
        "Based on the story analysis below, create detailed character profiles for the \
screenplay.\n\n\
Story Analysis:\n{analysis}\n\n\
Genre: {genre}\n\n\
For each character provide labeled fields:\n\
1. Name: full name\n\
2. Age: approximate age\n\
3. Role: protagonist/antagonist/supporting\n\
4. Description: one-sentence character description\n\
5. Personality Traits: 3-5 key traits\n\
6. Visual Description: physical appearance for storyboard generation (build, hair, \
clothing, distinctive features)\n\
7. Motivation: what drives this character\n\
8. Character Arc: how this character changes\n\n\
Make characters authentic and appropriate for the {genre} genre.\n\n\
Create exactly {num_characters} main characters."
    )
}

#[allow(clippy::too_many_arguments)]
pub fn scene_prompt(
    scene_number: u32,
    act: &str,
    location: &str,
    time: &str,
    purpose: &str,
    characters: &str,
    dialogue_style: &str,
    genre: &str,
) -> String {
    format!(
        "Write a compelling screenplay scene with industry-standard formatting.\n\n\
Scene Details:\n\
- Scene Number: {scene_number}\n\
- Act: {act}\n\
- Location: {location}\n\
- Time: {time}\n\
- Purpose: {purpose}\n\n\
Characters in Scene:\n{characters}\n\n\
Dialogue Style: {dialogue_style}\n\
Genre: {genre}\n\n\
Include a scene heading (INT/EXT. LOCATION - TIME), action lines, character dialogue with \
proper formatting, and parentheticals where needed. Keep the scene focused and visual; \
every line of dialogue should reveal character or advance the plot."
    )
}

pub fn dialogue_prompt(
    context: &str,
    characters: &str,
    dialogue_style: &str,
    tone: &str,
    num_exchanges: usize,
) -> String {
    format!(
        "Generate authentic screenplay dialogue for this scene.\n\n\
Characters:\n{characters}\n\n\
Scene Context:\n{context}\n\n\
Dialogue Style: {dialogue_style}\n\
Emotional Tone: {tone}\n\n\
Dialogue should sound natural to each character, reveal personality and advance the plot. \
Avoid on-the-nose lines and exposition dumps.\n\n\
Format as:\n\
CHARACTER NAME\n\
(parenthetical if needed)\n\
Dialogue line\n\n\
Generate approximately {num_exchanges} exchanges."
    )
}
