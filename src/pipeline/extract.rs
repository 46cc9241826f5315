//! Paper extraction from Scholar alert HTML.
//!
//! Each `<h3>` holding a link is one entry. The link text is the title and
//! the `url` parameter of its redirect wrapper is the paper link. The next
//! two `<div>`s after the heading carry the author line and the snippet.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::pipeline::types::Paper;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("anchor selector is valid"));

static SCHOLAR_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://scholar.google.com/").expect("scholar base url is valid")
});

/// Extract candidate papers from one alert email's HTML, in document order.
///
/// Entries without a title or author line are skipped; this never fails.
pub fn extract_papers(html: &str) -> Vec<Paper> {
    let document = Html::parse_document(html);
    let elements: Vec<ElementRef<'_>> = document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let mut papers = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        if element.value().name() != "h3" {
            continue;
        }
        let Some(anchor) = element.select(&ANCHOR).next() else {
            tracing::debug!("Skipping heading without a link");
            continue;
        };
        let title = normalized_text(anchor);
        if title.is_empty() {
            tracing::debug!("Skipping entry with empty title");
            continue;
        }

        let (first, second) = following_divs(&elements[index + 1..]);
        let first_text = first.map(normalized_text).unwrap_or_default();
        let second_text = second.map(normalized_text).unwrap_or_default();
        let (authors, abstract_text) = if !first_text.is_empty() {
            (first_text, second_text)
        } else {
            (second_text, String::new())
        };
        if authors.is_empty() {
            tracing::debug!(title = %title, "Skipping entry without an author line");
            continue;
        }

        let url = anchor
            .value()
            .attr("href")
            .map(resolve_redirect)
            .unwrap_or_default();

        papers.push(Paper::candidate(title, authors, abstract_text, url));
    }

    tracing::debug!("Extracted {} candidate paper(s)", papers.len());
    papers
}

/// The first two `<div>`s after a heading, stopping at the next `<h3>`.
/// Divs nested inside the first one are not counted separately.
fn following_divs<'a>(rest: &[ElementRef<'a>]) -> (Option<ElementRef<'a>>, Option<ElementRef<'a>>) {
    let mut first: Option<ElementRef<'a>> = None;
    for element in rest {
        match element.value().name() {
            "h3" => break,
            "div" => match first {
                None => first = Some(*element),
                Some(outer) if outer.descendants().any(|node| node == **element) => {}
                Some(_) => return (first, Some(*element)),
            },
            _ => {}
        }
    }
    (first, None)
}

/// Element text with runs of whitespace collapsed to single spaces.
fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recover the direct paper link from a redirect wrapper href.
///
/// Returns the percent-decoded `url` query parameter, or an empty string
/// when the href carries no such parameter.
pub fn resolve_redirect(href: &str) -> String {
    let parsed = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match SCHOLAR_BASE.join(href) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Unparseable link {href:?}: {e}");
                return String::new();
            }
        },
        Err(e) => {
            tracing::warn!("Unparseable link {href:?}: {e}");
            return String::new();
        }
    };

    let Some(target) = parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
    else {
        return String::new();
    };

    // Some wrappers encode the target twice.
    match urlencoding::decode(&target) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::warn!("Could not decode redirect target {target:?}: {e}");
            String::new()
        }
    }
}
