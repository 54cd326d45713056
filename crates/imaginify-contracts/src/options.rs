use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Classic,
        AspectRatio::ClassicPortrait,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Classic => "4:3",
            AspectRatio::ClassicPortrait => "3:4",
        }
    }

    /// Pixel dimensions with the long edge fixed at `long_edge`.
    pub fn dims(self, long_edge: u32) -> (u32, u32) {
        let (w, h) = match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Landscape => (16, 9),
            AspectRatio::Portrait => (9, 16),
            AspectRatio::Classic => (4, 3),
            AspectRatio::ClassicPortrait => (3, 4),
        };
        if w >= h {
            (long_edge, (long_edge * h / w).max(1))
        } else {
            ((long_edge * w / h).max(1), long_edge)
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim().replace('/', ":");
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.label() == value)
            .ok_or_else(|| {
                format!(
                    "Unsupported aspect ratio '{}'. Choose one of: {}.",
                    raw.trim(),
                    Self::ALL.map(AspectRatio::label).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtStyle {
    VanGogh,
    Anime,
    Cyberpunk,
    Impressionism,
    PopArt,
    Steampunk,
    Minimalist,
    Abstract,
    Photorealistic,
    Watercolor,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 10] = [
        ArtStyle::VanGogh,
        ArtStyle::Anime,
        ArtStyle::Cyberpunk,
        ArtStyle::Impressionism,
        ArtStyle::PopArt,
        ArtStyle::Steampunk,
        ArtStyle::Minimalist,
        ArtStyle::Abstract,
        ArtStyle::Photorealistic,
        ArtStyle::Watercolor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArtStyle::VanGogh => "Van Gogh",
            ArtStyle::Anime => "Anime",
            ArtStyle::Cyberpunk => "Cyberpunk",
            ArtStyle::Impressionism => "Impressionism",
            ArtStyle::PopArt => "Pop Art",
            ArtStyle::Steampunk => "Steampunk",
            ArtStyle::Minimalist => "Minimalist",
            ArtStyle::Abstract => "Abstract",
            ArtStyle::Photorealistic => "Photorealistic",
            ArtStyle::Watercolor => "Watercolor",
        }
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArtStyle {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_style_key(raw);
        Self::ALL
            .into_iter()
            .find(|style| normalize_style_key(style.name()) == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown style '{}'. Choose one of: {}.",
                    raw.trim(),
                    Self::ALL.map(ArtStyle::name).join(", ")
                )
            })
    }
}

fn normalize_style_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Which page of the editor is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    #[default]
    Generate,
    Edit,
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditorMode::Generate => "generate",
            EditorMode::Edit => "edit",
        })
    }
}

impl FromStr for EditorMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate" | "prompt" => Ok(EditorMode::Generate),
            "edit" | "result" => Ok(EditorMode::Edit),
            other => Err(format!("Unknown mode '{other}'. Use 'generate' or 'edit'.")),
        }
    }
}
