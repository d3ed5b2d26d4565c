//! Content extraction and deduplication.
//!
//! Turns fetched markup into an ordered sequence of classified text blocks.
//! The default strategy is the two-level container-hash dedup: repeated
//! whole containers (navigation blocks rendered inside several wrapping
//! divs) are skipped by a hash of their flattened text, then repeated
//! individual text leaves are skipped by exact-string membership.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

use crate::config::DedupMode;
use crate::norm;

/// Elements stripped before any text extraction.
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "nav", "header", "footer"];

/// Classification of an extracted text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    ListItem,
}

/// One classified text span, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub text: String,
}

impl ContentBlock {
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Heading,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: text.into(),
        }
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::ListItem,
            text: text.into(),
        }
    }
}

/// The extracted, deduplicated content of one fetched page.
///
/// Immutable after creation; written to storage at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// URL the page was fetched from.
    pub source_url: String,
    /// When the fetch happened.
    pub fetched_at: DateTime<Utc>,
    /// Ordered classified text blocks.
    pub content_blocks: Vec<ContentBlock>,
}

impl ExtractedDocument {
    /// Serialize the blocks to the flat text form consumed downstream.
    /// Headings keep a bracket marker and list items a dash prefix so
    /// chunking can still see structure.
    pub fn serialize_blocks(&self) -> String {
        let lines: Vec<String> = self
            .content_blocks
            .iter()
            .map(|block| match block.kind {
                BlockKind::Heading => format!("\n[{}]\n", block.text),
                BlockKind::ListItem => format!("- {}", block.text),
                BlockKind::Paragraph => block.text.clone(),
            })
            .collect();
        lines.join("\n")
    }
}

/// Extract classified text from `html` fetched at `source_url`.
pub fn extract(
    html: &str,
    source_url: &Url,
    fetched_at: DateTime<Utc>,
    mode: DedupMode,
) -> ExtractedDocument {
    let document = Html::parse_document(html);
    let content_blocks = match mode {
        DedupMode::ContainerHash => container_hash_blocks(&document),
        DedupMode::Flat => flat_blocks(&document),
    };
    ExtractedDocument {
        source_url: source_url.as_str().to_string(),
        fetched_at,
        content_blocks,
    }
}

/// Two-level dedup: containers in document order, each accepted at most
/// once by text hash; leaves accepted at most once by exact text.
fn container_hash_blocks(document: &Html) -> Vec<ContentBlock> {
    let container_sel = Selector::parse("ul, ol, div, section").unwrap();
    let leaf_sel = Selector::parse("h1, h2, h3, h4, h5, h6, p, li").unwrap();

    let mut seen_containers: HashSet<String> = HashSet::new();
    let mut seen_texts: HashSet<String> = HashSet::new();
    let mut blocks = Vec::new();

    for container in document.select(&container_sel) {
        if has_non_content_ancestor(container) {
            continue;
        }
        let flattened = visible_text(container);
        if !seen_containers.insert(hash_text(&flattened)) {
            continue;
        }

        for leaf in container.select(&leaf_sel) {
            if has_non_content_ancestor(leaf) {
                continue;
            }
            let text = visible_text(leaf);
            if text.is_empty() || seen_texts.contains(&text) {
                continue;
            }
            seen_texts.insert(text.clone());
            blocks.push(classify(leaf.value().name(), text));
        }
    }

    blocks
}

/// Flat strategy: headings and paragraphs straight off the document.
/// Leaf-level dedup still applies so repeated spans never co-occur.
fn flat_blocks(document: &Html) -> Vec<ContentBlock> {
    let flat_sel = Selector::parse("h1, h2, h3, h4, h5, h6, p").unwrap();

    let mut seen_texts: HashSet<String> = HashSet::new();
    let mut blocks = Vec::new();

    for element in document.select(&flat_sel) {
        if has_non_content_ancestor(element) {
            continue;
        }
        let text = visible_text(element);
        if text.is_empty() || seen_texts.contains(&text) {
            continue;
        }
        seen_texts.insert(text.clone());
        blocks.push(classify(element.value().name(), text));
    }

    blocks
}

/// Extract every distinct crawlable link from the page, resolved against
/// the page's final URL. Non-fetchable hrefs are dropped silently.
pub fn discover_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Ok(url) = norm::normalize(href, base_url) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}

fn classify(tag: &str, text: String) -> ContentBlock {
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ContentBlock::heading(text),
        "li" => ContentBlock::list_item(text),
        _ => ContentBlock::paragraph(text),
    }
}

fn is_non_content(tag: &str) -> bool {
    NON_CONTENT_TAGS.contains(&tag)
}

fn has_non_content_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| is_non_content(el.value().name()))
}

/// Flattened, whitespace-normalized text of an element, excluding
/// non-content subtrees.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_non_content(child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_default(html: &str) -> ExtractedDocument {
        extract(
            html,
            &Url::parse("https://example.edu/page").unwrap(),
            Utc::now(),
            DedupMode::ContainerHash,
        )
    }

    #[test]
    fn test_classifies_and_suppresses_duplicate_leaves() {
        let html = "<div><h1>Title</h1><p>Intro paragraph.</p>\
                    <ul><li>Item 1</li><li>Item 1</li></ul></div>\
                    <section><h2>Subtitle</h2><p>Another paragraph.</p></section>";

        let doc = extract_default(html);
        assert_eq!(
            doc.content_blocks,
            vec![
                ContentBlock::heading("Title"),
                ContentBlock::paragraph("Intro paragraph."),
                ContentBlock::list_item("Item 1"),
                ContentBlock::heading("Subtitle"),
                ContentBlock::paragraph("Another paragraph."),
            ]
        );
    }

    #[test]
    fn test_repeated_container_skipped_by_hash() {
        // The same quick-links list rendered in two wrapper divs.
        let menu = "<ul><li>Admissions</li><li>Financial Aid</li></ul>";
        let html = format!("<div id='top'>{menu}</div><div id='bottom'>{menu}</div>");

        let doc = extract_default(&html);
        let admissions = doc
            .content_blocks
            .iter()
            .filter(|b| b.text == "Admissions")
            .count();
        assert_eq!(admissions, 1);
    }

    #[test]
    fn test_non_content_elements_removed() {
        let html = "<div><p>Real content.</p></div>\
                    <nav><ul><li>Home</li></ul></nav>\
                    <footer><div><p>Copyright notice</p></div></footer>\
                    <script>var x = 'ignored';</script>";

        let doc = extract_default(html);
        assert_eq!(doc.content_blocks, vec![ContentBlock::paragraph("Real content.")]);
    }

    #[test]
    fn test_script_text_excluded_from_container_flattening() {
        let html = "<div><p>Visible.</p><style>.a { color: red }</style></div>";
        let doc = extract_default(html);
        assert_eq!(doc.content_blocks, vec![ContentBlock::paragraph("Visible.")]);
    }

    #[test]
    fn test_whitespace_normalized() {
        let html = "<div><p>Spaced\n   out\t text</p></div>";
        let doc = extract_default(html);
        assert_eq!(doc.content_blocks[0].text, "Spaced out text");
    }

    #[test]
    fn test_flat_mode_takes_headings_and_paragraphs() {
        let html = "<div><h1>Title</h1><p>Body text.</p>\
                    <ul><li>List item ignored in flat mode</li></ul></div>";
        let doc = extract(
            html,
            &Url::parse("https://example.edu/").unwrap(),
            Utc::now(),
            DedupMode::Flat,
        );
        assert_eq!(
            doc.content_blocks,
            vec![
                ContentBlock::heading("Title"),
                ContentBlock::paragraph("Body text."),
            ]
        );
    }

    #[test]
    fn test_serialize_blocks_marks_structure() {
        let doc = ExtractedDocument {
            source_url: "https://example.edu/".into(),
            fetched_at: Utc::now(),
            content_blocks: vec![
                ContentBlock::heading("Hours"),
                ContentBlock::paragraph("Open daily."),
                ContentBlock::list_item("Mon 9-5"),
            ],
        };
        assert_eq!(doc.serialize_blocks(), "\n[Hours]\n\nOpen daily.\n- Mon 9-5");
    }

    #[test]
    fn test_discover_links_resolves_and_dedupes() {
        let base = Url::parse("https://example.edu/dept/").unwrap();
        let html = r#"<a href="/about">About</a>
                      <a href="courses.html">Courses</a>
                      <a href="/about#staff">About again</a>
                      <a href="mailto:dean@example.edu">Mail</a>
                      <a href="javascript:void(0)">JS</a>
                      <a href="https://other.org/page">External</a>"#;

        let links = discover_links(html, &base);
        let as_strings: Vec<&str> = links.iter().map(|u| u.as_str()).collect();

        assert_eq!(
            as_strings,
            vec![
                "https://example.edu/about",
                "https://example.edu/dept/courses.html",
                // off-domain link survives discovery; scope filtering is
                // the frontier's job
                "https://other.org/page",
            ]
        );
    }
}
