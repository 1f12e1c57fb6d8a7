//! The story wizard: one value that owns everything the user has entered
//! and everything the generation service returned, plus the pure
//! transitions between phases.
//!
//! ```text
//! Idle --theme--> CollectingStyle --style--> Generating --ok--> Reading
//!  ^                 |      ^                    |
//!  +------back-------+      +------retry---- Failed <--err--+
//! ```
//!
//! `reset` goes back to `Idle` from anywhere.

use crate::error::{GenerationError, WizardError};
use crate::models::{FullStory, GenerationToken, Navigation, ReadingCursor, StoryRequest, StyleDraft, StylePreset};
use serde::Serialize;
use std::time::Instant;

/// Message shown on the failure view whatever went wrong underneath.
pub const FAILURE_MESSAGE: &str =
    "Hubo un problema al conectar con la musa creativa. Por favor intenta de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    CollectingStyle,
    Generating,
    Reading,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::CollectingStyle => "collecting style",
            Phase::Generating => "generating",
            Phase::Reading => "reading",
            Phase::Failed => "failed",
        }
    }
}

/// Phase-specific data. Holding the story and the error inside the
/// variants keeps `Reading` and `Failed` from ever being entered without
/// them.
#[derive(Debug, Clone)]
enum State {
    Idle,
    CollectingStyle,
    Generating {
        token: GenerationToken,
        started: Instant,
    },
    Reading {
        story: FullStory,
        cursor: ReadingCursor,
    },
    Failed {
        message: String,
    },
}

/// What the caller must run after a successful style submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub token: GenerationToken,
    pub theme: String,
    pub style: String,
}

#[derive(Debug, Clone)]
pub struct StoryWizard {
    state: State,
    request: StoryRequest,
    draft: StyleDraft,
}

impl Default for StoryWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl StoryWizard {
    pub fn new() -> Self {
        StoryWizard {
            state: State::Idle,
            request: StoryRequest::default(),
            draft: StyleDraft::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::CollectingStyle => Phase::CollectingStyle,
            State::Generating { .. } => Phase::Generating,
            State::Reading { .. } => Phase::Reading,
            State::Failed { .. } => Phase::Failed,
        }
    }

    pub fn request(&self) -> &StoryRequest {
        &self.request
    }

    pub fn draft(&self) -> &StyleDraft {
        &self.draft
    }

    pub fn story(&self) -> Option<&FullStory> {
        match &self.state {
            State::Reading { story, .. } => Some(story),
            _ => None,
        }
    }

    pub fn cursor(&self) -> Option<ReadingCursor> {
        match self.state {
            State::Reading { cursor, .. } => Some(cursor),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            State::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn in_flight(&self) -> Option<GenerationToken> {
        match self.state {
            State::Generating { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn generating_since(&self) -> Option<Instant> {
        match self.state {
            State::Generating { started, .. } => Some(started),
            _ => None,
        }
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), WizardError> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(WizardError::WrongPhase {
                action,
                phase: phase.as_str(),
            })
        }
    }

    pub fn submit_theme(&mut self, theme: &str) -> Result<(), WizardError> {
        self.expect_phase(Phase::Idle, "submit theme")?;
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(WizardError::EmptyTheme);
        }

        self.request.theme = theme.to_string();
        self.state = State::CollectingStyle;
        tracing::debug!(theme_len = theme.len(), "theme accepted");
        Ok(())
    }

    /// Picks a preset and clears any typed style.
    pub fn select_preset(&mut self, preset: StylePreset) -> Result<(), WizardError> {
        self.expect_phase(Phase::CollectingStyle, "select style")?;
        self.draft.preset = Some(preset);
        self.draft.custom.clear();
        Ok(())
    }

    /// Replaces the typed style. The selected preset is kept so that
    /// clearing the text falls back to it.
    pub fn set_custom_style(&mut self, text: &str) -> Result<(), WizardError> {
        self.expect_phase(Phase::CollectingStyle, "type style")?;
        self.draft.custom = text.to_string();
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), WizardError> {
        self.expect_phase(Phase::CollectingStyle, "go back")?;
        self.clear();
        Ok(())
    }

    /// Moves to `Generating` and hands out the ticket for the one request
    /// allowed in flight.
    pub fn submit_style(&mut self) -> Result<GenerationTicket, WizardError> {
        if let State::Generating { .. } = self.state {
            return Err(WizardError::GenerationInFlight);
        }
        self.expect_phase(Phase::CollectingStyle, "submit style")?;
        let style = self.draft.resolve().ok_or(WizardError::StyleUnresolved)?;

        let token = GenerationToken::new();
        self.request.style = style.clone();
        self.state = State::Generating {
            token,
            started: Instant::now(),
        };
        tracing::info!(%token, style = %style, "starting story generation");

        Ok(GenerationTicket {
            token,
            theme: self.request.theme.clone(),
            style,
        })
    }

    /// Applies the outcome of the generation identified by `token`.
    ///
    /// Outcomes for any other token (a reset or a newer attempt happened in
    /// between) are dropped with `StaleResult`.
    pub fn complete(
        &mut self,
        token: GenerationToken,
        outcome: Result<FullStory, GenerationError>,
    ) -> Result<Phase, WizardError> {
        if self.in_flight() != Some(token) {
            tracing::debug!(%token, "discarding result of a superseded generation");
            return Err(WizardError::StaleResult);
        }

        self.state = match outcome {
            Ok(story) => {
                tracing::info!(%token, chapters = story.chapters.len(), "story ready");
                State::Reading {
                    story,
                    cursor: ReadingCursor::Introduction,
                }
            }
            Err(err) => {
                tracing::warn!(%token, kind = err.kind(), error = %err, "story generation failed");
                State::Failed {
                    message: FAILURE_MESSAGE.to_string(),
                }
            }
        };
        Ok(self.phase())
    }

    /// Back to the style view, keeping the theme and the last style choice.
    pub fn retry(&mut self) -> Result<(), WizardError> {
        self.expect_phase(Phase::Failed, "retry")?;
        self.state = State::CollectingStyle;
        Ok(())
    }

    /// Back to `Idle` from any phase. An in-flight generation is forgotten;
    /// its result will be stale when it arrives.
    pub fn reset(&mut self) {
        if let Some(token) = self.in_flight() {
            tracing::info!(%token, "reset while generating");
        }
        tracing::debug!(phase = self.phase().as_str(), had_request = !self.request.is_empty(), "wizard reset");
        self.clear();
    }

    fn clear(&mut self) {
        self.state = State::Idle;
        self.request = StoryRequest::default();
        self.draft = StyleDraft::default();
    }

    pub fn next_section(&mut self) -> Result<Navigation, WizardError> {
        self.navigate(|cursor, chapters| cursor.next(chapters), "next section")
    }

    pub fn previous_section(&mut self) -> Result<Navigation, WizardError> {
        self.navigate(|cursor, _| cursor.previous(), "previous section")
    }

    pub fn open_section(&mut self, target: ReadingCursor) -> Result<(), WizardError> {
        self.expect_phase(Phase::Reading, "open section")?;
        if let State::Reading { story, cursor } = &mut self.state {
            if let ReadingCursor::Chapter(index) = target {
                if index >= story.chapters.len() {
                    return Err(WizardError::SectionOutOfRange(index));
                }
            }
            *cursor = target;
        }
        Ok(())
    }

    fn navigate(
        &mut self,
        step: impl FnOnce(ReadingCursor, usize) -> Navigation,
        action: &'static str,
    ) -> Result<Navigation, WizardError> {
        let phase = self.phase();
        match &mut self.state {
            State::Reading { story, cursor } => {
                let navigation = step(*cursor, story.chapters.len());
                if let Navigation::Moved(target) = navigation {
                    *cursor = target;
                }
                Ok(navigation)
            }
            _ => Err(WizardError::WrongPhase {
                action,
                phase: phase.as_str(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chapter;

    fn story(chapters: usize) -> FullStory {
        FullStory {
            title: "La niebla".to_string(),
            hook: "Nadie volvió del páramo.".to_string(),
            introduction: "El pueblo dormía.".to_string(),
            chapters: (0..chapters)
                .map(|i| Chapter {
                    title: format!("Capítulo {}", i + 1),
                    content: format!("Contenido {}", i + 1),
                })
                .collect(),
            setting_description: Some("Un valle andino".to_string()),
        }
    }

    fn collecting(theme: &str) -> StoryWizard {
        let mut wizard = StoryWizard::new();
        wizard.submit_theme(theme).unwrap();
        wizard
    }

    fn generating() -> (StoryWizard, GenerationTicket) {
        let mut wizard = collecting("Un faro sin farero");
        wizard.select_preset(StylePreset::MisterioRural).unwrap();
        let ticket = wizard.submit_style().unwrap();
        (wizard, ticket)
    }

    fn reading(chapters: usize) -> StoryWizard {
        let (mut wizard, ticket) = generating();
        wizard.complete(ticket.token, Ok(story(chapters))).unwrap();
        wizard
    }

    fn assert_clean_idle(wizard: &StoryWizard) {
        assert_eq!(wizard.phase(), Phase::Idle);
        assert!(wizard.request().is_empty());
        assert!(wizard.story().is_none());
        assert!(wizard.error().is_none());
        assert!(wizard.in_flight().is_none());
        assert_eq!(wizard.draft(), &StyleDraft::default());
    }

    #[test]
    fn starts_idle_and_empty() {
        assert_clean_idle(&StoryWizard::new());
    }

    #[test]
    fn theme_moves_to_style_collection() {
        let wizard = collecting("  Un relojero en un faro  ");
        assert_eq!(wizard.phase(), Phase::CollectingStyle);
        assert_eq!(wizard.request().theme, "Un relojero en un faro");
    }

    #[test]
    fn blank_theme_is_rejected() {
        let mut wizard = StoryWizard::new();
        assert_eq!(wizard.submit_theme(""), Err(WizardError::EmptyTheme));
        assert_eq!(wizard.submit_theme(" \n\t "), Err(WizardError::EmptyTheme));
        assert_clean_idle(&wizard);
    }

    #[test]
    fn back_returns_to_idle() {
        let mut wizard = collecting("tema");
        wizard.select_preset(StylePreset::DramaEmotivo).unwrap();
        wizard.back().unwrap();
        assert_clean_idle(&wizard);
    }

    #[test]
    fn typed_style_wins_and_clearing_it_restores_the_preset() {
        let mut wizard = collecting("tema");
        wizard.select_preset(StylePreset::TerrorFolclorico).unwrap();
        wizard.set_custom_style("Cyberpunk noir en los Andes").unwrap();
        assert_eq!(wizard.draft().resolve().as_deref(), Some("Cyberpunk noir en los Andes"));

        wizard.set_custom_style("").unwrap();
        let ticket = wizard.submit_style().unwrap();
        assert_eq!(ticket.style, "Terror Folclórico");
        assert_eq!(wizard.request().style, "Terror Folclórico");
    }

    #[test]
    fn selecting_a_preset_clears_typed_style() {
        let mut wizard = collecting("tema");
        wizard.set_custom_style("gótico").unwrap();
        wizard.select_preset(StylePreset::FabulaOscura).unwrap();
        assert_eq!(wizard.submit_style().unwrap().style, "Fábula Oscura");
    }

    #[test]
    fn unresolved_style_is_rejected() {
        let mut wizard = collecting("tema");
        wizard.set_custom_style("   ").unwrap();
        assert_eq!(wizard.submit_style(), Err(WizardError::StyleUnresolved));
        assert_eq!(wizard.phase(), Phase::CollectingStyle);
    }

    #[test]
    fn style_submission_hands_out_a_ticket() {
        let (wizard, ticket) = generating();
        assert_eq!(wizard.phase(), Phase::Generating);
        assert_eq!(wizard.in_flight(), Some(ticket.token));
        assert_eq!(ticket.theme, "Un faro sin farero");
        assert_eq!(ticket.style, "Misterio Rural");
        assert!(wizard.generating_since().is_some());
    }

    #[test]
    fn second_submission_while_generating_is_rejected() {
        let (mut wizard, ticket) = generating();
        assert_eq!(wizard.submit_style(), Err(WizardError::GenerationInFlight));
        assert_eq!(wizard.in_flight(), Some(ticket.token));
    }

    #[test]
    fn success_moves_to_reading_with_chapters_in_order() {
        let wizard = reading(6);
        assert_eq!(wizard.phase(), Phase::Reading);
        let story = wizard.story().unwrap();
        assert_eq!(story.chapters.len(), 6);
        assert_eq!(story.chapters[0].title, "Capítulo 1");
        assert_eq!(story.chapters[5].title, "Capítulo 6");
        assert_eq!(wizard.cursor(), Some(ReadingCursor::Introduction));
        assert!(wizard.error().is_none());
    }

    #[test]
    fn every_failure_kind_shows_the_same_message() {
        let failures = [
            GenerationError::MissingCredential,
            GenerationError::EmptyResponse,
            GenerationError::malformed("missing field `chapters`"),
        ];
        for failure in failures {
            let (mut wizard, ticket) = generating();
            assert_eq!(wizard.complete(ticket.token, Err(failure)), Ok(Phase::Failed));
            assert_eq!(wizard.error(), Some(FAILURE_MESSAGE));
            assert!(wizard.story().is_none());
        }
    }

    #[test]
    fn retry_keeps_theme_and_style() {
        let (mut wizard, ticket) = generating();
        wizard
            .complete(ticket.token, Err(GenerationError::EmptyResponse))
            .unwrap();
        wizard.retry().unwrap();
        assert_eq!(wizard.phase(), Phase::CollectingStyle);
        assert_eq!(wizard.request().theme, "Un faro sin farero");
        assert_eq!(wizard.request().style, "Misterio Rural");

        let again = wizard.submit_style().unwrap();
        assert_ne!(again.token, ticket.token);
        assert_eq!(again.style, "Misterio Rural");
    }

    #[test]
    fn resubmission_clears_the_previous_error() {
        let (mut wizard, ticket) = generating();
        wizard
            .complete(ticket.token, Err(GenerationError::EmptyResponse))
            .unwrap();
        wizard.retry().unwrap();
        wizard.submit_style().unwrap();
        assert!(wizard.error().is_none());
    }

    #[test]
    fn reset_from_any_phase_is_clean() {
        let mut from_reading = reading(6);
        from_reading.reset();
        assert_clean_idle(&from_reading);

        let (mut from_failed, ticket) = generating();
        from_failed
            .complete(ticket.token, Err(GenerationError::EmptyResponse))
            .unwrap();
        from_failed.reset();
        assert_clean_idle(&from_failed);

        let (mut from_generating, _) = generating();
        from_generating.reset();
        assert_clean_idle(&from_generating);
    }

    #[test]
    fn late_result_after_reset_is_discarded() {
        let (mut wizard, ticket) = generating();
        wizard.reset();
        assert_eq!(
            wizard.complete(ticket.token, Ok(story(6))),
            Err(WizardError::StaleResult)
        );
        assert_clean_idle(&wizard);
    }

    #[test]
    fn result_of_an_older_attempt_does_not_touch_the_newer_one() {
        let (mut wizard, old) = generating();
        wizard.reset();
        wizard.submit_theme("otro tema").unwrap();
        wizard.set_custom_style("épico").unwrap();
        let new = wizard.submit_style().unwrap();

        assert_eq!(
            wizard.complete(old.token, Err(GenerationError::EmptyResponse)),
            Err(WizardError::StaleResult)
        );
        assert_eq!(wizard.in_flight(), Some(new.token));
        assert_eq!(wizard.complete(new.token, Ok(story(6))), Ok(Phase::Reading));
    }

    #[test]
    fn transitions_outside_their_phase_are_rejected() {
        let mut wizard = StoryWizard::new();
        assert!(matches!(wizard.retry(), Err(WizardError::WrongPhase { .. })));
        assert!(matches!(wizard.back(), Err(WizardError::WrongPhase { .. })));
        assert!(matches!(wizard.submit_style(), Err(WizardError::WrongPhase { .. })));
        assert!(matches!(wizard.next_section(), Err(WizardError::WrongPhase { .. })));

        let mut wizard = reading(6);
        assert!(matches!(wizard.submit_theme("x"), Err(WizardError::WrongPhase { .. })));
        assert_eq!(wizard.phase(), Phase::Reading);
    }

    #[test]
    fn previous_from_first_chapter_lands_on_the_introduction() {
        let mut wizard = reading(6);
        assert_eq!(
            wizard.next_section(),
            Ok(Navigation::Moved(ReadingCursor::Chapter(0)))
        );
        assert_eq!(
            wizard.previous_section(),
            Ok(Navigation::Moved(ReadingCursor::Introduction))
        );
        assert_eq!(wizard.previous_section(), Ok(Navigation::StartOfStory));
        assert_eq!(wizard.cursor(), Some(ReadingCursor::Introduction));
    }

    #[test]
    fn next_from_last_chapter_signals_end_of_story() {
        let mut wizard = reading(6);
        wizard.open_section(ReadingCursor::Chapter(5)).unwrap();
        assert_eq!(wizard.next_section(), Ok(Navigation::EndOfStory));
        assert_eq!(wizard.cursor(), Some(ReadingCursor::Chapter(5)));
    }

    #[test]
    fn opening_a_missing_chapter_is_rejected() {
        let mut wizard = reading(6);
        assert_eq!(
            wizard.open_section(ReadingCursor::Chapter(6)),
            Err(WizardError::SectionOutOfRange(6))
        );
        assert_eq!(wizard.cursor(), Some(ReadingCursor::Introduction));
    }
}
