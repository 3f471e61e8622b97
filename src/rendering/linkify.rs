use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

/// Elements whose text content is never linkified.
const SKIP_TAGS: &[&str] = &["a", "pre", "code"];

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("URL pattern is valid")
});

/// Wrap bare `http(s)://` and `www.` URLs found in text nodes with anchors.
///
/// Expects well-formed, already sanitized HTML where every literal `<` in text
/// is escaped, so each `<` starts a tag, and every `>` inside an attribute
/// value is escaped as `&gt;`, so the first `>` after a `<` ends the tag.
/// ammonia's serializer guarantees both. Text inside `a`, `pre` and `code`
/// elements is left untouched.
pub fn linkify(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut skip_depth = 0usize;
    let mut rest = html;

    while !rest.is_empty() {
        if rest.starts_with('<') {
            let end = rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            let tag = &rest[..end];
            if let Some((name, closing)) = tag_name(tag) {
                if SKIP_TAGS.contains(&name.as_str()) {
                    if closing {
                        skip_depth = skip_depth.saturating_sub(1);
                    } else if !tag.ends_with("/>") {
                        skip_depth += 1;
                    }
                }
            }
            out.push_str(tag);
            rest = &rest[end..];
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            let text = &rest[..end];
            if skip_depth == 0 {
                link_text(text, &mut out);
            } else {
                out.push_str(text);
            }
            rest = &rest[end..];
        }
    }

    out
}

/// Lowercased element name of a tag and whether it is a closing tag.
fn tag_name(tag: &str) -> Option<(String, bool)> {
    let inner = tag.trim_start_matches('<');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(stripped) => (true, stripped),
        None => (false, inner),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() {
        None
    } else {
        Some((name, closing))
    }
}

fn link_text(text: &str, out: &mut String) {
    let mut last = 0;
    for found in URL_PATTERN.find_iter(text) {
        let url = trim_url(found.as_str());
        if !has_host(url) {
            continue;
        }
        out.push_str(&text[last..found.start()]);
        let href = if url.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("www.")) {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        let _ = write!(out, r#"<a href="{href}" rel="nofollow">{url}</a>"#);
        last = found.start() + url.len();
    }
    out.push_str(&text[last..]);
}

/// Cut a match at escaped quotes/brackets and drop trailing punctuation.
fn trim_url(candidate: &str) -> &str {
    let mut url = candidate;
    for entity in ["&quot;", "&#39;", "&lt;", "&gt;"] {
        if let Some(i) = url.find(entity) {
            url = &url[..i];
        }
    }
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')'])
}

fn has_host(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    let host = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .or_else(|| lowered.strip_prefix("www."))
        .unwrap_or("");
    !host.is_empty()
}
