//! Output framing and motion style definitions.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a style string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct StyleParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Output aspect ratio.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
pub enum AspectRatio {
    /// Landscape 1280×720
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Portrait 720×1280
    #[serde(rename = "9:16")]
    Portrait,
    /// Square 960×960
    #[serde(rename = "1:1")]
    Square,
    /// Feed portrait 960×1200
    #[serde(rename = "4:5")]
    Feed,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Square,
        AspectRatio::Feed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Feed => "4:5",
        }
    }

    /// Target pixel size `(width, height)` for prepared images.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1280, 720),
            AspectRatio::Portrait => (720, 1280),
            AspectRatio::Square => (960, 960),
            AspectRatio::Feed => (960, 1200),
        }
    }

    /// Parse user input, falling back to 16:9 for anything unrecognized.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for AspectRatio {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| StyleParseError {
                kind: "aspect ratio",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested motion character of the generated video.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MotionStyle {
    /// Let the provider pick a fitting subtle motion
    #[default]
    Mystery,
    FriendlyWave,
    Playful,
    WarmHug,
    SweetKiss,
    NaturalWalk,
    BlossomingFlowers,
}

impl MotionStyle {
    pub const ALL: [MotionStyle; 7] = [
        MotionStyle::Mystery,
        MotionStyle::FriendlyWave,
        MotionStyle::Playful,
        MotionStyle::WarmHug,
        MotionStyle::SweetKiss,
        MotionStyle::NaturalWalk,
        MotionStyle::BlossomingFlowers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionStyle::Mystery => "mystery",
            MotionStyle::FriendlyWave => "friendly_wave",
            MotionStyle::Playful => "playful",
            MotionStyle::WarmHug => "warm_hug",
            MotionStyle::SweetKiss => "sweet_kiss",
            MotionStyle::NaturalWalk => "natural_walk",
            MotionStyle::BlossomingFlowers => "blossoming_flowers",
        }
    }

    /// Parse user input, falling back to `mystery` for anything unrecognized.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for MotionStyle {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| StyleParseError {
                kind: "motion style",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for MotionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
