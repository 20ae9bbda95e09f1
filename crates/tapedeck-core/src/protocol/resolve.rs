//! Resolution of URL-based records against their document base.
//!
//! Captured attribute values and stylesheets may carry links relative to the
//! page they were recorded on. The player hosts the document elsewhere, so
//! every such link is made absolute before a message leaves the decoder.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::record::Record;

#[allow(clippy::expect_used)]
static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")]*?)['"]?\s*\)"#).expect("static css url pattern")
});

/// Class the player toggles to emulate `:hover` on replayed elements.
pub const HOVER_CLASS: &str = "-tapedeck-hover";

/// Resolve `value` against `base`. Absolute values are returned unchanged.
pub fn resolve_url(base: &str, value: &str) -> String {
    if value.is_empty() || Url::parse(value).is_ok() {
        return value.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(value)) {
        Ok(u) => u.to_string(),
        Err(e) => {
            tracing::debug!(base, value, error = %e, "url left unresolved");
            value.to_string()
        }
    }
}

/// Rewrite every `url(...)` in `css` against `base`, and `:hover` to the
/// player's hover class.
pub fn resolve_css(base: &str, css: &str) -> String {
    let linked = CSS_URL.replace_all(css, |caps: &Captures<'_>| {
        let target = caps.get(1).map_or("", |m| m.as_str());
        format!("url(\"{}\")", resolve_url(base, target))
    });
    linked.replace(":hover", &format!(".{HOVER_CLASS}"))
}

/// Map URL-based records to their plain counterparts with resolved links.
/// Every other record passes through untouched.
pub fn resolve_record(record: Record) -> Record {
    match record {
        Record::SetNodeAttributeUrlBased {
            id,
            name,
            value,
            base_url,
        } => {
            let value = match name.as_str() {
                "src" | "href" => resolve_url(&base_url, &value),
                "style" => resolve_css(&base_url, &value),
                _ => value,
            };
            Record::SetNodeAttribute { id, name, value }
        }
        Record::SetCssDataUrlBased { id, data, base_url } => Record::SetCssData {
            id,
            data: resolve_css(&base_url, &data),
        },
        Record::CssInsertRuleUrlBased {
            id,
            rule,
            index,
            base_url,
        } => Record::CssInsertRule {
            id,
            rule: resolve_css(&base_url, &rule),
            index,
        },
        other => other,
    }
}
