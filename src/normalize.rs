//! # Normalizer
//! Pure conversion from a scraped [`RawCandidate`] into the canonical
//! [`ProductRecord`]. No I/O and no shared mutable state, so everything here
//! is unit-testable against literal strings.
//!
//! Parsing is deliberately forgiving: a field that fails to parse degrades
//! to `None`, it never fails the record. Only a candidate with neither a
//! name nor a price is dropped entirely.

use url::Url;

use crate::fetch::RawCandidate;
use crate::product::{Money, ProductImage, ProductRecord, SourceId};

/// Decode HTML entities, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Parse a free-text price like `"₹1,299"`, `"Rs. 1,29,900.50"` or `"MRP:
/// ₹2,999"` into an amount + currency. Grouping separators are stripped
/// (both western and Indian grouping), and a range takes its first amount.
/// Returns `None` on failure; zero is a valid price, not a sentinel.
pub fn parse_price(text: &str) -> Option<Money> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }

    let lower = t.to_ascii_lowercase();
    let currency = if t.contains('₹') || lower.contains("inr") || lower.contains("rs") {
        "INR"
    } else if t.contains('$') || lower.contains("usd") {
        "USD"
    } else {
        // Every registered source is an Indian storefront.
        "INR"
    };

    static RE_AMOUNT: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE_AMOUNT.get_or_init(|| regex::Regex::new(r"\d+(?:,\d+)*(?:\.\d+)?").unwrap());
    let m = re.find(t)?;
    let amount: f64 = m.as_str().replace(',', "").parse().ok()?;
    Some(Money::new(amount, currency))
}

/// Leading numeric value out of strings like `"4.3 out of 5 stars"` or a
/// bare `"4.3"`. Values outside `[0, 5]` are rejected rather than clamped.
pub fn parse_rating(text: &str) -> Option<f32> {
    static RE_NUM: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE_NUM.get_or_init(|| regex::Regex::new(r"\d+(?:\.\d+)?").unwrap());
    let value: f32 = re.find(text)?.as_str().parse().ok()?;
    (0.0..=5.0).contains(&value).then_some(value)
}

/// Review/rating count out of `"(12,345)"` or `"12,345 ratings"`. Decimal
/// values are rejected: a `"4.3"` that leaked in from a rating field must
/// not become a count of 4.
pub fn parse_count(text: &str) -> Option<u64> {
    static RE_COUNT: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re = RE_COUNT.get_or_init(|| regex::Regex::new(r"\d+(?:,\d+)*").unwrap());
    let m = re.find(text)?;
    if text[m.end()..].starts_with('.') {
        return None;
    }
    m.as_str().replace(',', "").parse().ok()
}

/// Resolve a possibly-relative href against the source's base URL.
fn absolutize(source: SourceId, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = Url::parse(source.base_url()).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(clean_text).filter(|s| !s.is_empty())
}

/// Convert one raw candidate into a canonical record, or drop it when it
/// carries no signal (neither name nor price).
pub fn normalize(raw: &RawCandidate, source: SourceId) -> Option<ProductRecord> {
    let name = non_empty(raw.title.as_deref());
    let price = raw.price_text.as_deref().and_then(parse_price);
    if name.is_none() && price.is_none() {
        return None;
    }

    let list_price = match (&price, raw.list_price_text.as_deref().and_then(parse_price)) {
        (Some(p), Some(lp)) if lp.currency == p.currency && lp.amount > p.amount => Some(lp),
        _ => None,
    };
    let (discount_percent, discount_amount) = match (&price, &list_price) {
        (Some(p), Some(lp)) => {
            let diff = lp.amount - p.amount;
            let percent = (diff / lp.amount * 100.0).round() as u32;
            (Some(percent), Some((diff * 100.0).round() / 100.0))
        }
        _ => (None, None),
    };

    let images = raw
        .images
        .iter()
        .filter_map(|img| {
            Some(ProductImage {
                url: absolutize(source, &img.url)?,
                alt: non_empty(img.alt.as_deref()),
            })
        })
        .collect();

    Some(ProductRecord {
        source,
        name,
        price,
        list_price,
        discount_percent,
        discount_amount,
        rating: raw.rating_text.as_deref().and_then(parse_rating),
        review_count: raw.review_count_text.as_deref().and_then(parse_count),
        link: raw.link.as_deref().and_then(|h| absolutize(source, h)),
        images,
        brand: non_empty(raw.brand.as_deref()),
        category: non_empty(raw.category.as_deref()),
    })
}
