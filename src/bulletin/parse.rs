//! HTML extraction for the security bulletin pages.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Marker in the title of bulletins that concern extensions.
pub const EXTENSION_BULLETIN_MARKER: &str = "TYPO3-EXT";

/// Placeholder used when an article lacks an affected-version paragraph.
pub const VERSION_NOT_FOUND: &str = "NOT FOUND";

static PAGE_BROWSER: LazyLock<Selector> =
    LazyLock::new(|| selector("div.tx-pagebrowse-pi1 a[href]"));
static ARTICLE_LIST: LazyLock<Selector> = LazyLock::new(|| selector("div.articles"));
static ARTICLE_LINK: LazyLock<Selector> = LazyLock::new(|| selector("h2 > a[href]"));
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static STRONG: LazyLock<Selector> = LazyLock::new(|| selector("strong"));

static TRIPLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+\.\d+)").expect("valid version pattern"));
static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("valid key pattern"));
static AFFECTED_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Affected Versions?:$").expect("valid label pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// One extension mentioned in a bulletin and the affected-version text
/// that goes with it, already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub extension: String,
    pub version: String,
}

/// Links of the paginator on a bulletin index page.
pub fn page_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&PAGE_BROWSER)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Links to extension bulletins listed on an index page.
pub fn article_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(list) = doc.select(&ARTICLE_LIST).next() else {
        return Vec::new();
    };

    list.select(&ARTICLE_LINK)
        .filter(|a| text_of(*a).contains(EXTENSION_BULLETIN_MARKER))
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Extracts the affected extensions from a bulletin article.
///
/// Bulletins titled "Several ..." without a parenthesised key list one
/// `Extension: Title (key)` block per extension; those keys are paired in
/// order with the affected-version paragraphs. Any other bulletin names a
/// single extension in its headline.
pub fn parse_article(html: &str) -> Vec<Advisory> {
    let doc = Html::parse_document(html);
    let Some(headline) = doc.select(&HEADLINE).next().map(text_of) else {
        return Vec::new();
    };

    let affected = affected_versions(&doc);
    let version_at = |i: usize| {
        affected
            .get(i)
            .map(|text| normalize_version(text))
            .unwrap_or_else(|| VERSION_NOT_FOUND.to_string())
    };

    if headline.contains("Several") && !headline.contains('(') {
        return labelled_keys(&doc)
            .into_iter()
            .enumerate()
            .map(|(i, extension)| Advisory {
                extension,
                version: version_at(i),
            })
            .collect();
    }

    match PARENTHESISED.captures(&headline) {
        Some(caps) => vec![Advisory {
            extension: caps[1].trim().to_string(),
            version: version_at(0),
        }],
        None => Vec::new(),
    }
}

/// First `d.d.d` in the text, or an empty string if there is none.
pub fn normalize_version(text: &str) -> String {
    TRIPLET
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Label text of the first `<strong>` inside a paragraph.
fn paragraph_label(p: ElementRef<'_>) -> Option<String> {
    p.select(&STRONG).next().map(|s| text_of(s).trim().to_string())
}

/// Paragraph text following the "Affected Version(s):" label.
fn affected_versions(doc: &Html) -> Vec<String> {
    doc.select(&PARAGRAPH)
        .filter_map(|p| {
            let label = paragraph_label(p)?;
            if !AFFECTED_LABEL.is_match(&label) {
                return None;
            }
            let text = text_of(p);
            let rest = text.split_once(label.as_str()).map(|(_, r)| r)?;
            Some(rest.trim().to_string())
        })
        .collect()
}

/// Keys from `Extension: Title (key)` lines.
fn labelled_keys(doc: &Html) -> Vec<String> {
    doc.select(&PARAGRAPH)
        .filter(|p| paragraph_label(*p).as_deref() == Some("Extension:"))
        .filter_map(|p| {
            let text = text_of(p);
            let (_, rest) = text.split_once("Extension:")?;
            PARENTHESISED
                .captures(rest)
                .map(|caps| caps[1].trim().to_string())
        })
        .collect()
}
