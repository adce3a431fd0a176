use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use thiserror::Error;
use url::Url;

use crate::pipeline::task::{ContentRecord, Heading, MediaKind, MediaRef};
use crate::utils::urls;

/// Failure to turn a fetched body into a content record
///
/// Treated as a permanent failure by the caller: the content itself is
/// malformed, so a retry would fetch the same bytes again.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document body is empty")]
    EmptyDocument,

    #[error("body does not look like HTML")]
    NotHtml,

    #[error("invalid page URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Elements whose text never counts as page content
const NOISE_TAGS: [&str; 4] = ["script", "style", "noscript", "nav"];

/// Elements collected as text blocks
const BLOCK_TAGS: [&str; 5] = ["p", "li", "blockquote", "pre", "figcaption"];

/// Parse an HTML body into a structured content record
///
/// Relative link and media references are resolved against `url`;
/// script/style/nav content is stripped from all text; heading and
/// block order follow document order.
pub fn extract(url: &str, body: &[u8]) -> Result<ContentRecord, ExtractionError> {
    let base = Url::parse(url).map_err(|source| ExtractionError::InvalidBaseUrl {
        url: url.to_string(),
        source,
    })?;

    let html = String::from_utf8_lossy(body);
    let trimmed = html.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyDocument);
    }
    if !trimmed.contains('<') {
        return Err(ExtractionError::NotHtml);
    }

    let document = Html::parse_document(&html);

    let title = select_first_text(&document, "title");
    let text_blocks = extract_text_blocks(&document);
    let headings = extract_headings(&document);
    let links = extract_links(&document, &base);
    let media = extract_media(&document, &base);
    let raw_text_length = extract_raw_text_length(&document);

    Ok(ContentRecord {
        url: base.to_string(),
        title,
        text_blocks,
        headings,
        links,
        media,
        raw_text_length,
    })
}

/// Collect the text of an element, skipping noise-tag subtrees
fn element_text(element: ElementRef) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    normalize_whitespace(&out)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if NOISE_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Block-level content elements, in document order
///
/// An element nested inside another block (a list within a list item,
/// a paragraph inside a blockquote) is covered by its outermost
/// ancestor's text and is not emitted as a block of its own.
fn extract_text_blocks(document: &Html) -> Vec<String> {
    let mut blocks = Vec::new();
    if let Ok(selector) = Selector::parse(&BLOCK_TAGS.join(", ")) {
        for element in document.select(&selector) {
            if has_noise_or_block_ancestor(element) {
                continue;
            }
            let text = element_text(element);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
    }
    blocks
}

fn has_noise_or_block_ancestor(element: ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            let name = ancestor.value().name();
            NOISE_TAGS.contains(&name) || BLOCK_TAGS.contains(&name)
        })
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let mut headings = Vec::new();
    if let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") {
        for element in document.select(&selector) {
            let name = element.value().name();
            let level = name
                .strip_prefix('h')
                .and_then(|d| d.parse::<u8>().ok())
                .unwrap_or(1);
            let text = element_text(element);
            if !text.is_empty() {
                headings.push(Heading { level, text });
            }
        }
    }
    headings
}

/// Absolute, normalized, deduplicated link targets
fn extract_links(document: &Html, base: &Url) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(absolute) = resolve(base, href) {
                links.insert(absolute.to_string());
            }
        }
    }
    links
}

fn extract_media(document: &Html, base: &Url) -> Vec<MediaRef> {
    let sources = [
        ("img[src]", "src", MediaKind::Image),
        ("video[src]", "src", MediaKind::Video),
        ("audio[src]", "src", MediaKind::Audio),
        ("iframe[src]", "src", MediaKind::Embed),
    ];

    let mut media = Vec::new();
    for (selector_str, attr, kind) in sources {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let Some(reference) = element.value().attr(attr) else {
                continue;
            };
            if let Some(absolute) = resolve(base, reference) {
                media.push(MediaRef {
                    url: absolute.to_string(),
                    kind,
                });
            }
        }
    }
    media
}

/// Resolve a possibly relative reference against the page URL
fn resolve(base: &Url, reference: &str) -> Option<Url> {
    let joined = base.join(reference.trim()).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(urls::normalize(joined)),
        _ => None,
    }
}

fn extract_raw_text_length(document: &Html) -> usize {
    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            return element_text(body).chars().count();
        }
    }
    0
}
