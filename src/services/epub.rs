use crate::models::FullStory;
use anyhow::{Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use std::fmt::Display;

fn epub_error(stage: &str, err: impl Display) -> anyhow::Error {
    anyhow!("epub {}: {}", stage, err)
}

/// Packs a story into an EPUB: one title/introduction page, then one page
/// per chapter, in order.
pub fn build_epub(story: &FullStory) -> Result<Vec<u8>> {
    let zip = ZipLibrary::new().map_err(|e| epub_error("zip", e))?;
    let mut builder = EpubBuilder::new(zip).map_err(|e| epub_error("builder", e))?;

    builder
        .metadata("title", story.title.as_str())
        .map_err(|e| epub_error("metadata", e))?
        .metadata("lang", "es")
        .map_err(|e| epub_error("metadata", e))?
        .metadata("generator", "narrador")
        .map_err(|e| epub_error("metadata", e))?;

    if let Some(setting) = &story.setting_description {
        builder
            .metadata("description", setting.as_str())
            .map_err(|e| epub_error("metadata", e))?;
    }

    let opening = opening_page(story);
    builder
        .add_content(
            EpubContent::new("introduccion.xhtml", opening.as_bytes())
                .title("Introducción")
                .reftype(ReferenceType::TitlePage),
        )
        .map_err(|e| epub_error("introduction", e))?;

    for (index, chapter) in story.chapters.iter().enumerate() {
        let page = chapter_page(index, &chapter.title, &chapter.content);
        builder
            .add_content(
                EpubContent::new(format!("capitulo_{}.xhtml", index + 1), page.as_bytes())
                    .title(format!("Capítulo {}: {}", index + 1, chapter.title))
                    .reftype(ReferenceType::Text),
            )
            .map_err(|e| epub_error("chapter", e))?;
    }

    builder.inline_toc();

    let mut bytes = Vec::new();
    builder
        .generate(&mut bytes)
        .map_err(|e| epub_error("generate", e))?;

    tracing::debug!(size = bytes.len(), chapters = story.chapters.len(), "epub built");
    Ok(bytes)
}

/// ASCII file name for the download, derived from the title.
pub fn file_name(story: &FullStory) -> String {
    let mut slug = String::new();
    for c in story.title.chars() {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "historia.epub".to_string()
    } else {
        format!("{}.epub", slug)
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}

fn xhtml(title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"es\">\n\
         <head><meta charset=\"UTF-8\"/><title>{}</title></head>\n\
         <body>\n{}</body>\n</html>\n",
        html_escape::encode_text(title),
        body
    )
}

fn paragraphs(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>\n", html_escape::encode_text(line)))
        .collect()
}

fn opening_page(story: &FullStory) -> String {
    let mut body = format!("<h1>{}</h1>\n", html_escape::encode_text(&story.title));
    if let Some(setting) = &story.setting_description {
        body.push_str(&format!(
            "<p><em>Ambientación: {}</em></p>\n",
            html_escape::encode_text(setting)
        ));
    }
    body.push_str("<h2>El gancho</h2>\n");
    body.push_str(&paragraphs(&story.hook));
    body.push_str("<h2>Introducción</h2>\n");
    body.push_str(&paragraphs(&story.introduction));
    xhtml(&story.title, &body)
}

fn chapter_page(index: usize, title: &str, content: &str) -> String {
    let body = format!(
        "<h2>Capítulo {}</h2>\n<h1>{}</h1>\n{}",
        index + 1,
        html_escape::encode_text(title),
        paragraphs(content)
    );
    xhtml(title, &body)
}
