//! Selector helpers shared by the marketplace extractors.
//!
//! Every helper takes a short list of alternate selectors and returns the
//! first usable match. The selector lists themselves are disposable
//! configuration tracking whatever the sites render today, not logic.

use scraper::{ElementRef, Html, Selector};

fn parse_selector(s: &str) -> Option<Selector> {
    match Selector::parse(s) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::warn!(selector = s, error = ?e, "invalid selector skipped");
            None
        }
    }
}

/// All elements matching the first alternate that matches anything.
pub fn select_items<'a>(doc: &'a Html, alternates: &[&str]) -> Vec<ElementRef<'a>> {
    for s in alternates {
        let Some(sel) = parse_selector(s) else { continue };
        let found: Vec<_> = doc.select(&sel).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// First non-empty text content under any of `alternates`, scoped to `el`.
pub fn first_text(el: &ElementRef<'_>, alternates: &[&str]) -> Option<String> {
    for s in alternates {
        let Some(sel) = parse_selector(s) else { continue };
        for found in el.select(&sel) {
            let text = found.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// First non-empty attribute value under any of `alternates`, scoped to `el`.
pub fn first_attr(el: &ElementRef<'_>, alternates: &[&str], attr: &str) -> Option<String> {
    for s in alternates {
        let Some(sel) = parse_selector(s) else { continue };
        for found in el.select(&sel) {
            if let Some(v) = found.value().attr(attr) {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

/// Attribute on the element itself (for card markups where the result card
/// is the anchor).
pub fn own_attr(el: &ElementRef<'_>, attr: &str) -> Option<String> {
    el.value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Whether any of `alternates` matches anywhere in the document.
pub fn doc_has(doc: &Html, alternates: &[&str]) -> bool {
    alternates
        .iter()
        .any(|s| parse_selector(s).is_some_and(|sel| doc.select(&sel).next().is_some()))
}
