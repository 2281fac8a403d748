//! Motion prompts sent with each generation request.

use animo_models::MotionStyle;

/// Constraints applied to every style.
pub const BASE_PROMPT: &str = "Use the provided image as the single source of truth. \
Do not add new people, objects, text, logos, or background elements. \
Do not change identity, face, clothing, or environment. \
Keep motion subtle, natural, and realistic.";

pub fn style_instruction(style: MotionStyle) -> &'static str {
    match style {
        MotionStyle::FriendlyWave => "Add a gentle friendly wave. Keep it minimal and natural.",
        MotionStyle::Playful => "Add subtle playful motion (small joyful micro-movements).",
        MotionStyle::WarmHug => "Add a calm warm hug gesture. Keep it subtle and tasteful.",
        MotionStyle::SweetKiss => {
            "Add a very subtle sweet kiss gesture. Keep it tasteful and minimal."
        }
        MotionStyle::NaturalWalk => "Add calm lifelike motion as if slowly walking through time.",
        MotionStyle::BlossomingFlowers => {
            "Add gentle blossoming flowers or soft particles around the subject. Do not cover faces."
        }
        MotionStyle::Mystery => "Choose the best fitting subtle motion for the photo.",
    }
}

pub fn build_prompt(style: MotionStyle) -> String {
    format!("{} {}", BASE_PROMPT, style_instruction(style))
}
