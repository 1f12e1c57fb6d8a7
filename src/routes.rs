use crate::error::WizardError;
use crate::models::{ReadingCursor, StylePreset};
use crate::services::epub;
use crate::services::session::Session;
use crate::services::wizard::StoryWizard;
use crate::views;
use axum::{
    Router,
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use http::header;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
}

type ActionResult = Result<Redirect, Response>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/state", get(wizard_state))
        .route("/theme", post(submit_theme))
        .route("/style", post(submit_style))
        .route("/back", post(back))
        .route("/retry", post(retry))
        .route("/reset", post(reset))
        .route("/read/next", post(next_section))
        .route("/read/previous", post(previous_section))
        .route("/read/section", post(open_section))
        .route("/story.epub", get(download_epub))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

/// Current page with a 422 for bad input or a 409 for an action the
/// current phase does not allow.
fn rejected(err: WizardError, wizard: &StoryWizard) -> Response {
    let status = if err.is_input_error() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CONFLICT
    };
    tracing::debug!(error = %err, phase = wizard.phase().as_str(), "action rejected");
    (status, Html(views::render(wizard))).into_response()
}

async fn apply(
    state: &AppState,
    action: impl FnOnce(&mut StoryWizard) -> Result<(), WizardError>,
) -> ActionResult {
    state
        .session
        .with_wizard(|wizard| action(&mut *wizard).map_err(|err| rejected(err, &*wizard)))
        .await?;
    Ok(Redirect::to("/"))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.session.with_wizard(|wizard| views::render(wizard)).await)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn wizard_state(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state
        .session
        .with_wizard(|wizard| {
            serde_json::json!({
                "phase": wizard.phase(),
                "request": wizard.request(),
                "draft": wizard.draft(),
                "story": wizard.story(),
                "section": wizard.cursor().map(|cursor| cursor.to_string()),
                "error": wizard.error(),
            })
        })
        .await;
    Json(snapshot)
}

#[derive(Debug, Deserialize)]
struct ThemeForm {
    #[serde(default)]
    theme: String,
}

async fn submit_theme(State(state): State<AppState>, Form(form): Form<ThemeForm>) -> ActionResult {
    apply(&state, |wizard| wizard.submit_theme(&form.theme)).await
}

#[derive(Debug, Deserialize)]
struct StyleForm {
    preset: Option<String>,
    #[serde(default)]
    custom: String,
}

async fn submit_style(State(state): State<AppState>, Form(form): Form<StyleForm>) -> ActionResult {
    let preset = match form.preset.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(label) => match StylePreset::from_label(label) {
            Some(preset) => Some(preset),
            None => {
                tracing::debug!(label, "unknown style preset");
                return Err(state
                    .session
                    .with_wizard(|wizard| rejected(WizardError::StyleUnresolved, wizard))
                    .await);
            }
        },
    };

    match state.session.submit_style(preset, &form.custom).await {
        Ok(()) => Ok(Redirect::to("/")),
        Err(err) => Err(state
            .session
            .with_wizard(|wizard| rejected(err, wizard))
            .await),
    }
}

async fn back(State(state): State<AppState>) -> ActionResult {
    apply(&state, StoryWizard::back).await
}

async fn retry(State(state): State<AppState>) -> ActionResult {
    apply(&state, StoryWizard::retry).await
}

async fn reset(State(state): State<AppState>) -> Redirect {
    state.session.reset().await;
    Redirect::to("/")
}

async fn next_section(State(state): State<AppState>) -> ActionResult {
    apply(&state, |wizard| wizard.next_section().map(|_| ())).await
}

async fn previous_section(State(state): State<AppState>) -> ActionResult {
    apply(&state, |wizard| wizard.previous_section().map(|_| ())).await
}

#[derive(Debug, Deserialize)]
struct SectionForm {
    section: String,
}

async fn open_section(State(state): State<AppState>, Form(form): Form<SectionForm>) -> ActionResult {
    apply(&state, |wizard| {
        let target: ReadingCursor = form.section.parse()?;
        wizard.open_section(target)
    })
    .await
}

async fn download_epub(State(state): State<AppState>) -> Response {
    let Some(story) = state.session.with_wizard(|wizard| wizard.story().cloned()).await else {
        return (StatusCode::NOT_FOUND, "no story to export").into_response();
    };

    match epub::build_epub(&story) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/epub+zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", epub::file_name(&story)),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "epub export failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
