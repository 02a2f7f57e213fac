//! Recursive visitor over a parsed HTML tree.
//!
//! Correctness of the crawl engine's dedup depends on the URL normalization
//! performed here, which is why the walker is part of the core rather than
//! an external collaborator (only HTML *tokenization* — turning bytes into
//! the `scraper`/`html5ever` tree of typed element nodes — is external).

use reqwest::Url;
use scraper::{ElementRef, Html};

use crate::error::CrawlError;

/// A function invoked once per element node of a parsed document. Walkers
/// compose: `compose(w1, w2)` invokes `w1` on each node and then `w2`,
/// propagating the first error, which permits single-pass link+asset
/// extraction instead of walking the tree twice.
pub type Walker<'a> = Box<dyn FnMut(&Url, ElementRef<'_>) -> Result<(), CrawlError> + 'a>;

/// Walk every element node of `document`, calling `walker` on each, in
/// document order. URL parsing failures inside a visitor are the visitor's
/// responsibility to swallow; an `Err` returned by the walker itself aborts
/// the walk (a sink error, per the walker contract).
pub fn walk(document: &Html, base: &Url, walker: &mut Walker<'_>) -> Result<(), CrawlError> {
    for node in document.tree.nodes() {
        if let Some(element) = ElementRef::wrap(node) {
            walker(base, element)?;
        }
    }
    Ok(())
}

/// Compose two walkers into one that runs `a` then `b` on every node,
/// stopping at the first error either one produces.
pub fn compose<'a>(mut a: Walker<'a>, mut b: Walker<'a>) -> Walker<'a> {
    Box::new(move |base, node| {
        a(base, node)?;
        b(base, node)
    })
}

/// Visits `<a href>` elements, handing each normalized destination to `sink`.
/// In-page anchors (`href` starting with `#`) are discarded.
pub fn link_visitor<'a>(
    mut sink: impl FnMut(Url) -> Result<(), CrawlError> + 'a,
) -> Walker<'a> {
    Box::new(move |base, node| {
        if node.value().name() == "a" {
            if let Some(href) = node.value().attr("href") {
                if let Some(url) = normalize_link(base, href) {
                    sink(url)?;
                }
            }
        }
        Ok(())
    })
}

/// Visits `<img src>` and `<link rel="stylesheet" href>` elements, handing
/// each normalized destination to `sink`.
pub fn asset_visitor<'a>(
    mut sink: impl FnMut(Url) -> Result<(), CrawlError> + 'a,
) -> Walker<'a> {
    Box::new(move |base, node| {
        match node.value().name() {
            "img" => {
                if let Some(src) = node.value().attr("src") {
                    if let Some(url) = normalize_link(base, src) {
                        sink(url)?;
                    }
                }
            }
            "link" => {
                if node.value().attr("rel") == Some("stylesheet") {
                    if let Some(href) = node.value().attr("href") {
                        if let Some(url) = normalize_link(base, href) {
                            sink(url)?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    })
}

/// Normalize a raw attribute value relative to `base`.
///
/// Values beginning with `#` are page anchors and are discarded. Values
/// beginning with `/` are resolved against `base` (an absolute-path
/// reference). Anything else must already parse as an absolute URL — a bare
/// relative path like `about.html` has no base to resolve against here and
/// is skipped rather than guessed at, matching a plain URL parse failure.
fn normalize_link(base: &Url, raw: &str) -> Option<Url> {
    if raw.starts_with('#') {
        return None;
    }
    if let Some(rest) = raw.strip_prefix('/') {
        match base.join(&format!("/{rest}")) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!("Failed resolving link {{ base: {base}, raw: {raw}, err: {err} }}.");
                None
            }
        }
    } else {
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!("Skipping unparseable link {{ raw: {raw}, err: {err} }}.");
                None
            }
        }
    }
}
