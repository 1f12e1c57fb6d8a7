//! Server-rendered pages. Each function only reads the wizard; all
//! changes go through the form actions in `routes`.

use crate::models::{FullStory, ReadingCursor, StyleDraft, StylePreset};
use crate::services::wizard::{Phase, StoryWizard};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::time::Duration;

pub const LOADING_MESSAGES: [&str; 9] = [
    "Seleccionando una región adecuada...",
    "Definiendo el gancho narrativo...",
    "Escribiendo la introducción...",
    "Desarrollando los personajes...",
    "Escribiendo Capítulo 1...",
    "Añadiendo conflicto en Capítulo 3...",
    "Preparando el clímax...",
    "Revisando la extensión de las palabras...",
    "Finalizando detalles...",
];

pub const LOADING_MESSAGE_PERIOD: Duration = Duration::from_millis(3500);

/// Status line shown after `elapsed` time spent generating.
pub fn loading_message(elapsed: Duration) -> &'static str {
    let step = (elapsed.as_millis() / LOADING_MESSAGE_PERIOD.as_millis()) as usize;
    LOADING_MESSAGES[step % LOADING_MESSAGES.len()]
}

const STYLE: &str = r#"
    body { font-family: Georgia, serif; background: #faf7f2; color: #2b2622; margin: 0; }
    main { max-width: 760px; margin: 0 auto; padding: 40px 24px 96px; }
    h1, h2, h3 { font-family: Arial, sans-serif; }
    textarea, input[type=text] { width: 100%; box-sizing: border-box; padding: 16px; font-size: 1.1em; border: 2px solid #e7e1d8; border-radius: 12px; }
    textarea { min-height: 160px; }
    button { background: #b4532a; color: white; border: 0; border-radius: 10px; padding: 10px 22px; font-size: 1em; cursor: pointer; }
    button.quiet { background: transparent; color: #6b625a; }
    .presets { display: grid; grid-template-columns: repeat(4, 1fr); gap: 10px; margin: 24px 0; }
    .presets label { background: white; border: 2px solid #e7e1d8; border-radius: 10px; padding: 10px; font-family: Arial, sans-serif; font-size: 0.9em; }
    .theme-box { background: white; border: 1px solid #e7e1d8; border-radius: 14px; padding: 16px 20px; font-style: italic; }
    .layout { display: flex; gap: 32px; }
    nav.index { width: 240px; flex-shrink: 0; font-family: Arial, sans-serif; font-size: 0.9em; }
    nav.index form { margin: 0; }
    nav.index button { background: transparent; color: #4a433d; padding: 6px 0; text-align: left; }
    nav.index button.active { color: #b4532a; font-weight: bold; }
    .pager { display: flex; justify-content: space-between; align-items: center; margin-top: 48px; border-top: 1px solid #e7e1d8; padding-top: 24px; }
    .error { background: #fdecea; color: #8a1f11; border-radius: 14px; padding: 28px; text-align: center; }
    .muted { color: #8c837a; }
"#;

fn page(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    {head_extra}
    <style>{STYLE}</style>
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = text(title),
        head_extra = head_extra,
        STYLE = STYLE,
        body = body
    )
}

/// Renders whatever the wizard is currently showing.
pub fn render(wizard: &StoryWizard) -> String {
    match wizard.phase() {
        Phase::Idle => theme_view(),
        Phase::CollectingStyle => style_view(&wizard.request().theme, wizard.draft()),
        Phase::Generating => {
            let elapsed = wizard
                .generating_since()
                .map(|started| started.elapsed())
                .unwrap_or_default();
            loading_view(elapsed)
        }
        Phase::Reading => match (wizard.story(), wizard.cursor()) {
            (Some(story), Some(cursor)) => reading_view(story, cursor),
            _ => theme_view(),
        },
        Phase::Failed => failed_view(wizard.error().unwrap_or("Algo salió mal.")),
    }
}

fn theme_view() -> String {
    page(
        "Narrador AI",
        "",
        r#"<h1>Narrador AI</h1>
<p class="muted">Dame un título, una idea o un pequeño resumen. Yo crearé una historia completa para ti.</p>
<form method="post" action="/theme">
    <textarea name="theme" placeholder="Ej: Un relojero que vive en un faro y descubre que el tiempo se ha detenido..."></textarea>
    <p><button type="submit">Continuar</button></p>
</form>"#,
    )
}

fn style_view(theme: &str, draft: &StyleDraft) -> String {
    let presets: String = StylePreset::ALL
        .iter()
        .map(|preset| {
            let checked = if draft.preset == Some(*preset) { " checked" } else { "" };
            format!(
                r#"<label><input type="radio" name="preset" value="{}"{}> {}</label>"#,
                attr(preset.label()),
                checked,
                text(preset.label())
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ");

    let body = format!(
        r#"<h3 class="muted">Tu idea</h3>
<div class="theme-box">"{theme}"</div>
<h2>¿Qué estilo quieres que use?</h2>
<p class="muted">Esto definirá la atmósfera, el tono y las emociones de la narración.</p>
<form method="post" action="/style">
    <div class="presets">
        {presets}
    </div>
    <h3 class="muted">O describe tu propio estilo</h3>
    <input type="text" name="custom" value="{custom}" placeholder="Ej: Cyberpunk noir en los Andes...">
    <p><button type="submit">Escribir Historia</button></p>
</form>
<form method="post" action="/back"><button class="quiet" type="submit">Volver</button></form>"#,
        theme = text(theme),
        presets = presets,
        custom = attr(&draft.custom),
    );
    page("Elige un estilo", "", &body)
}

fn loading_view(elapsed: Duration) -> String {
    let body = format!(
        r#"<h2>Creando tu historia</h2>
<p>{}</p>
<p class="muted">Esto puede tomar unos momentos. Estoy asegurándome de cumplir con la estructura exacta y el tono perfecto.</p>
<form method="post" action="/reset"><button class="quiet" type="submit">Cancelar</button></form>"#,
        text(loading_message(elapsed))
    );
    page("Creando tu historia", r#"<meta http-equiv="refresh" content="3">"#, &body)
}

fn failed_view(message: &str) -> String {
    let body = format!(
        r#"<div class="error">
    <h2>Error</h2>
    <p>{}</p>
    <form method="post" action="/retry"><button type="submit">Intentar de nuevo</button></form>
</div>
<form method="post" action="/reset"><button class="quiet" type="submit">Empezar de nuevo</button></form>"#,
        text(message)
    );
    page("Error", "", &body)
}

fn paragraphs(content: &str) -> String {
    content
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>", text(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn section_button(section: ReadingCursor, label: &str, active: bool) -> String {
    format!(
        r#"<form method="post" action="/read/section"><input type="hidden" name="section" value="{}"><button type="submit"{}>{}</button></form>"#,
        section,
        if active { r#" class="active""# } else { "" },
        text(label)
    )
}

fn index(story: &FullStory, cursor: ReadingCursor) -> String {
    let mut entries = vec![section_button(
        ReadingCursor::Introduction,
        "Introducción",
        cursor == ReadingCursor::Introduction,
    )];
    for (i, chapter) in story.chapters.iter().enumerate() {
        let section = ReadingCursor::Chapter(i);
        entries.push(section_button(
            section,
            &format!("{}. {}", i + 1, chapter.title),
            cursor == section,
        ));
    }
    format!(
        r#"<nav class="index">
<h3 class="muted">Índice</h3>
{}
<p class="muted">{} capítulos</p>
<p><a href="/story.epub">Descargar EPUB</a></p>
<form method="post" action="/reset"><button type="submit">Crear nueva historia</button></form>
</nav>"#,
        entries.join("\n"),
        story.chapters.len()
    )
}

fn reading_view(story: &FullStory, cursor: ReadingCursor) -> String {
    let section = match cursor {
        ReadingCursor::Introduction => {
            let setting = story
                .setting_description
                .as_deref()
                .map(|s| format!(r#"<p class="muted"><em>Ambientación: {}</em></p>"#, text(s)))
                .unwrap_or_default();
            let start = if story.chapters.is_empty() {
                String::new()
            } else {
                r#"<form method="post" action="/read/next"><button type="submit">Leer Capítulo 1</button></form>"#
                    .to_string()
            };
            format!(
                r#"<p class="muted">Historia Generada</p>
<h1>{title}</h1>
{setting}
<h3>El Gancho</h3>
{hook}
<h3>Introducción</h3>
{introduction}
{start}"#,
                title = text(&story.title),
                setting = setting,
                hook = paragraphs(&story.hook),
                introduction = paragraphs(&story.introduction),
                start = start,
            )
        }
        ReadingCursor::Chapter(i) => match story.chapters.get(i) {
            Some(chapter) => {
                let next = if cursor.is_last(story.chapters.len()) {
                    r#"<strong>Fin de la historia</strong>"#.to_string()
                } else {
                    r#"<form method="post" action="/read/next"><button type="submit">Siguiente Capítulo</button></form>"#
                        .to_string()
                };
                format!(
                    r#"<p class="muted">Capítulo {number}</p>
<h2>{title}</h2>
{content}
<div class="pager">
    <form method="post" action="/read/previous"><button class="quiet" type="submit">Anterior</button></form>
    {next}
</div>"#,
                    number = i + 1,
                    title = text(&chapter.title),
                    content = paragraphs(&chapter.content),
                    next = next,
                )
            }
            None => String::new(),
        },
    };

    let body = format!(
        r#"<div class="layout">
{}
<article>
{}
</article>
</div>"#,
        index(story, cursor),
        section
    );
    page(&story.title, "", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chapter;

    fn reading_wizard() -> StoryWizard {
        let mut wizard = StoryWizard::new();
        wizard.submit_theme("Un <faro> & un reloj").unwrap();
        wizard.select_preset(StylePreset::MelancolicoYPoetico).unwrap();
        let ticket = wizard.submit_style().unwrap();
        let story = FullStory {
            title: "El reloj del faro".to_string(),
            hook: "Se detuvo.\nTodo quedó quieto.".to_string(),
            introduction: "Era invierno.".to_string(),
            chapters: (1..=6)
                .map(|i| Chapter {
                    title: format!("Parte {}", i),
                    content: format!("Texto de la parte {}", i),
                })
                .collect(),
            setting_description: Some("Costa gallega".to_string()),
        };
        wizard.complete(ticket.token, Ok(story)).unwrap();
        wizard
    }

    #[test]
    fn loading_message_rotates_every_period() {
        assert_eq!(loading_message(Duration::ZERO), LOADING_MESSAGES[0]);
        assert_eq!(loading_message(Duration::from_millis(3499)), LOADING_MESSAGES[0]);
        assert_eq!(loading_message(Duration::from_millis(3500)), LOADING_MESSAGES[1]);
        assert_eq!(loading_message(LOADING_MESSAGE_PERIOD * 9), LOADING_MESSAGES[0]);
    }

    #[test]
    fn idle_shows_theme_entry() {
        let html = render(&StoryWizard::new());
        assert!(html.contains(r#"action="/theme""#));
        assert!(html.contains("Narrador AI"));
    }

    #[test]
    fn style_view_escapes_theme_and_lists_presets() {
        let mut wizard = StoryWizard::new();
        wizard.submit_theme("Un <faro> & un reloj").unwrap();
        wizard.select_preset(StylePreset::RealismoMagico).unwrap();
        let html = render(&wizard);
        assert!(html.contains("Un &lt;faro&gt; &amp; un reloj"));
        for preset in StylePreset::ALL {
            assert!(html.contains(preset.label()));
        }
        assert!(html.contains(r#"value="Realismo Mágico" checked"#));
    }

    #[test]
    fn generating_view_refreshes() {
        let mut wizard = StoryWizard::new();
        wizard.submit_theme("tema").unwrap();
        wizard.set_custom_style("noir").unwrap();
        wizard.submit_style().unwrap();
        let html = render(&wizard);
        assert!(html.contains(r#"http-equiv="refresh""#));
        assert!(html.contains("Creando tu historia"));
    }

    #[test]
    fn introduction_shows_hook_setting_and_index() {
        let html = render(&reading_wizard());
        assert!(html.contains("<p>Se detuvo.</p>"));
        assert!(html.contains("<p>Todo quedó quieto.</p>"));
        assert!(html.contains("Ambientación: Costa gallega"));
        assert!(html.contains("Leer Capítulo 1"));
        assert!(html.contains("6. Parte 6"));
        assert!(html.contains(r#"href="/story.epub""#));
    }

    #[test]
    fn last_chapter_shows_end_of_story() {
        let mut wizard = reading_wizard();
        wizard.open_section(ReadingCursor::Chapter(5)).unwrap();
        let html = render(&wizard);
        assert!(html.contains("Capítulo 6"));
        assert!(html.contains("Fin de la historia"));
        assert!(!html.contains("Siguiente Capítulo"));

        wizard.open_section(ReadingCursor::Chapter(0)).unwrap();
        let html = render(&wizard);
        assert!(html.contains("Siguiente Capítulo"));
    }

    #[test]
    fn failure_offers_retry() {
        let mut wizard = StoryWizard::new();
        wizard.submit_theme("tema").unwrap();
        wizard.set_custom_style("noir").unwrap();
        let ticket = wizard.submit_style().unwrap();
        wizard
            .complete(ticket.token, Err(crate::error::GenerationError::EmptyResponse))
            .unwrap();
        let html = render(&wizard);
        assert!(html.contains("musa creativa"));
        assert!(html.contains(r#"action="/retry""#));
    }
}
