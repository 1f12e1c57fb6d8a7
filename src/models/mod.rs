use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
}

/// A generated story as returned by the generation service.
///
/// Built only from a response that passed validation, never filled in
/// piece by piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullStory {
    pub title: String,
    pub hook: String,
    pub introduction: String,
    pub chapters: Vec<Chapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoryRequest {
    pub theme: String,
    pub style: String,
}

impl StoryRequest {
    pub fn is_empty(&self) -> bool {
        self.theme.is_empty() && self.style.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StylePreset {
    #[serde(rename = "Misterio Rural")]
    MisterioRural,
    #[serde(rename = "Realismo Mágico")]
    RealismoMagico,
    #[serde(rename = "Terror Folclórico")]
    TerrorFolclorico,
    #[serde(rename = "Drama Emotivo")]
    DramaEmotivo,
    #[serde(rename = "Aventura de Supervivencia")]
    AventuraDeSupervivencia,
    #[serde(rename = "Fábula Oscura")]
    FabulaOscura,
    #[serde(rename = "Suspenso Psicológico")]
    SuspensoPsicologico,
    #[serde(rename = "Melancólico y Poético")]
    MelancolicoYPoetico,
}

impl StylePreset {
    pub const ALL: [StylePreset; 8] = [
        StylePreset::MisterioRural,
        StylePreset::RealismoMagico,
        StylePreset::TerrorFolclorico,
        StylePreset::DramaEmotivo,
        StylePreset::AventuraDeSupervivencia,
        StylePreset::FabulaOscura,
        StylePreset::SuspensoPsicologico,
        StylePreset::MelancolicoYPoetico,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StylePreset::MisterioRural => "Misterio Rural",
            StylePreset::RealismoMagico => "Realismo Mágico",
            StylePreset::TerrorFolclorico => "Terror Folclórico",
            StylePreset::DramaEmotivo => "Drama Emotivo",
            StylePreset::AventuraDeSupervivencia => "Aventura de Supervivencia",
            StylePreset::FabulaOscura => "Fábula Oscura",
            StylePreset::SuspensoPsicologico => "Suspenso Psicológico",
            StylePreset::MelancolicoYPoetico => "Melancólico y Poético",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|preset| preset.label() == label)
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Style selection in progress while the user is on the style view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleDraft {
    pub preset: Option<StylePreset>,
    pub custom: String,
}

impl StyleDraft {
    /// Trimmed custom text wins over the preset; `None` when neither is set.
    pub fn resolve(&self) -> Option<String> {
        let custom = self.custom.trim();
        if !custom.is_empty() {
            return Some(custom.to_string());
        }
        self.preset.map(|preset| preset.label().to_string())
    }
}

/// Identity of one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GenerationToken(Uuid);

impl GenerationToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GenerationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Section of a story shown by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingCursor {
    /// Hook and introduction, shown together.
    #[default]
    Introduction,
    Chapter(usize),
}

/// Outcome of a next/previous step in the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(ReadingCursor),
    StartOfStory,
    EndOfStory,
}

impl ReadingCursor {
    pub fn next(self, chapter_count: usize) -> Navigation {
        match self {
            ReadingCursor::Introduction if chapter_count > 0 => {
                Navigation::Moved(ReadingCursor::Chapter(0))
            }
            ReadingCursor::Introduction => Navigation::EndOfStory,
            ReadingCursor::Chapter(index) if index + 1 < chapter_count => {
                Navigation::Moved(ReadingCursor::Chapter(index + 1))
            }
            ReadingCursor::Chapter(_) => Navigation::EndOfStory,
        }
    }

    pub fn previous(self) -> Navigation {
        match self {
            ReadingCursor::Introduction => Navigation::StartOfStory,
            ReadingCursor::Chapter(0) => Navigation::Moved(ReadingCursor::Introduction),
            ReadingCursor::Chapter(index) => Navigation::Moved(ReadingCursor::Chapter(index - 1)),
        }
    }

    pub fn is_last(self, chapter_count: usize) -> bool {
        matches!(self.next(chapter_count), Navigation::EndOfStory)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid story section '{0}'")]
pub struct InvalidSection(pub String);

/// Parses `intro` or a zero-based chapter index.
impl FromStr for ReadingCursor {
    type Err = InvalidSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "intro" => Ok(ReadingCursor::Introduction),
            other => other
                .parse::<usize>()
                .map(ReadingCursor::Chapter)
                .map_err(|_| InvalidSection(s.to_string())),
        }
    }
}

impl fmt::Display for ReadingCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingCursor::Introduction => f.write_str("intro"),
            ReadingCursor::Chapter(index) => write!(f, "{}", index),
        }
    }
}
