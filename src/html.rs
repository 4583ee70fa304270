//! Plain-text rendering of puzzle-site pages
//!
//! The site wraps everything worth reading in a single `<main>` element; the
//! rest of the page is navigation and chrome.

use anyhow::{anyhow, Result};
use html2text::render::text_renderer::TrivialDecorator;
use scraper::{Html, Selector};

/// Column width the text is wrapped to
const TEXT_WIDTH: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("no <main> element in the response")]
    MissingMain,
}

/// Returns the text of the page's `<main>` region with link markup stripped.
///
/// When `drop_link` is given, any anchor whose `href` equals it is removed
/// along with its text. Fails with [`PageError::MissingMain`] if the page has
/// no `<main>`.
pub fn main_text(html: &str, drop_link: Option<&str>) -> Result<String> {
    let document = Html::parse_document(html);
    let main_selector = selector("main")?;
    let main = document
        .select(&main_selector)
        .next()
        .ok_or(PageError::MissingMain)?;

    let mut fragment = main.html();
    if let Some(href) = drop_link {
        let anchor = selector("a")?;
        for link in main
            .select(&anchor)
            .filter(|a| a.value().attr("href") == Some(href))
        {
            fragment = fragment.replacen(&link.html(), "", 1);
        }
    }

    let text = html2text::from_read_with_decorator(
        fragment.as_bytes(),
        TEXT_WIDTH,
        TrivialDecorator::new(),
    );
    Ok(text.trim().to_string())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {}", css, e))
}
