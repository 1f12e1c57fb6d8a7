use crate::config::Config;
use crate::error::{GenerationError, ServiceFailure};
use crate::models::{Chapter, FullStory};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

pub const CHAPTER_COUNT: usize = 6;
pub const HOOK_WORDS: u32 = 200;
pub const INTRODUCTION_WORDS: u32 = 300;
pub const CHAPTER_WORDS: u32 = 600;

/// Something that can turn a theme and a style into a story.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate(&self, theme: &str, style: &str) -> Result<FullStory, GenerationError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    thinking_budget: u32,
    strict_chapter_count: bool,
}

impl GeminiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        if config.api_key.is_none() {
            tracing::warn!("no GEMINI_API_KEY or API_KEY set; story generation will fail");
        }

        Ok(GeminiClient {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
            strict_chapter_count: config.strict_chapter_count,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }

    fn request_body(&self, theme: &str, style: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_prompt(theme, style) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": story_schema(),
                "temperature": self.temperature,
                "thinkingConfig": { "thinkingBudget": self.thinking_budget }
            }
        })
    }
}

#[async_trait]
impl StoryGenerator for GeminiClient {
    async fn generate(&self, theme: &str, style: &str) -> Result<FullStory, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;

        tracing::info!(model = %self.model, "requesting story");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(theme, style))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(ServiceFailure::Status {
                status: status.as_u16(),
                message: service_error_message(&response_text),
            }
            .into());
        }

        let envelope: GenerateContentResponse =
            serde_json::from_str(&response_text).map_err(ServiceFailure::UnreadableEnvelope)?;

        let text = envelope.text().ok_or(GenerationError::EmptyResponse)?;
        let story = parse_story(&text, self.strict_chapter_count)?;

        tracing::info!(
            title = %story.title,
            chapters = story.chapters.len(),
            "story generated"
        );
        Ok(story)
    }
}

/// Instruction sent to the model. Theme and style go in verbatim.
pub fn build_prompt(theme: &str, style: &str) -> String {
    format!(
        "Actúa como un narrador experto que crea historias completas.\n\
         \n\
         TEMA: \"{theme}\"\n\
         ESTILO: \"{style}\"\n\
         \n\
         REGLAS:\n\
         1. Escribe todo el texto únicamente en español.\n\
         2. Extensión:\n\
         \x20  - Gancho (hook): unas {hook} palabras.\n\
         \x20  - Introducción: unas {intro} palabras.\n\
         \x20  - Exactamente {count} capítulos de unas {chapter} palabras cada uno.\n\
         3. Ambientación: elige una región rural, del interior, periférica o aislada que sea coherente con el tema, \
         y descríbela en setting_description. Usa los elementos culturales y del entorno de esa zona.\n\
         4. Tono: aplica el estilo \"{style}\" para crear una atmósfera marcada.\n\
         5. Lenguaje sencillo, directo, fluido y emotivo. Nada de lenguaje académico.\n\
         6. No menciones el número de palabras ni el proceso de escritura dentro del texto.\n\
         7. Si aparecen animales, deben ser propios de la región.\n\
         \n\
         Devuelve la historia completa como JSON estructurado.",
        theme = theme,
        style = style,
        hook = HOOK_WORDS,
        intro = INTRODUCTION_WORDS,
        count = CHAPTER_COUNT,
        chapter = CHAPTER_WORDS,
    )
}

/// Structured-output schema the service is told to follow.
pub fn story_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "Título de la historia."
            },
            "setting_description": {
                "type": "STRING",
                "description": "Breve descripción de la región rural o aislada elegida y de sus elementos culturales."
            },
            "hook": {
                "type": "STRING",
                "description": format!("El gancho de la historia (unas {} palabras).", HOOK_WORDS)
            },
            "introduction": {
                "type": "STRING",
                "description": format!("La introducción (unas {} palabras).", INTRODUCTION_WORDS)
            },
            "chapters": {
                "type": "ARRAY",
                "description": format!("Los {} capítulos de la historia, en orden.", CHAPTER_COUNT),
                "minItems": CHAPTER_COUNT,
                "maxItems": CHAPTER_COUNT,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING", "description": "Título del capítulo." },
                        "content": {
                            "type": "STRING",
                            "description": format!("Texto del capítulo (unas {} palabras).", CHAPTER_WORDS)
                        }
                    },
                    "required": ["title", "content"]
                }
            }
        },
        "required": ["title", "hook", "introduction", "chapters", "setting_description"]
    })
}

/// Wire shape of the story JSON. Every schema field is required here even
/// though `FullStory` keeps the setting optional.
#[derive(Debug, Deserialize)]
struct StoryPayload {
    title: String,
    hook: String,
    introduction: String,
    setting_description: String,
    chapters: Vec<Chapter>,
}

/// Parses and validates the model's JSON text.
///
/// Word counts are advisory and never checked. The chapter count is only
/// enforced when `strict_chapter_count` is set; otherwise any non-empty
/// list is accepted.
pub fn parse_story(text: &str, strict_chapter_count: bool) -> Result<FullStory, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let payload: StoryPayload = serde_json::from_str(text)?;

    if payload.chapters.is_empty() {
        return Err(GenerationError::malformed("story has no chapters"));
    }
    if payload.chapters.len() != CHAPTER_COUNT {
        if strict_chapter_count {
            return Err(GenerationError::malformed(format!(
                "expected {} chapters, got {}",
                CHAPTER_COUNT,
                payload.chapters.len()
            )));
        }
        tracing::warn!(
            expected = CHAPTER_COUNT,
            got = payload.chapters.len(),
            "story chapter count differs from the requested one"
        );
    }

    Ok(FullStory {
        title: payload.title,
        hook: payload.hook,
        introduction: payload.introduction,
        chapters: payload.chapters,
        setting_description: Some(payload.setting_description),
    })
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    /// Thought summaries are not part of the answer.
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

/// Pulls `error.message` out of a Google API error body, falling back to
/// the raw body.
fn service_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
