use std::collections::{HashMap, HashSet};

use crate::rendering::linkify::linkify;

/// Tags kept by the cleaner. Anything else is unwrapped (its text survives).
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "br", "code", "div", "em", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span", "strong", "sub", "sup",
    "table", "tbody", "td", "th", "thead", "tr", "u", "ul",
];

/// Attributes allowed on every kept tag.
pub const GENERIC_ATTRIBUTES: &[&str] = &["class", "style"];

/// CSS properties that may survive inside a `style` attribute.
pub const ALLOWED_CSS_PROPERTIES: &[&str] = &[
    "color",
    "background-color",
    "font-weight",
    "font-style",
    "text-decoration",
    "text-align",
];

pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

const LINK_REL: &str = "nofollow noopener noreferrer";

fn tag_attributes() -> HashMap<&'static str, HashSet<&'static str>> {
    HashMap::from([
        ("a", HashSet::from(["href", "title"])),
        ("img", HashSet::from(["src", "alt", "title", "width", "height"])),
        ("td", HashSet::from(["colspan", "rowspan"])),
        ("th", HashSet::from(["colspan", "rowspan"])),
    ])
}

/// Style values that could smuggle a URL or script past the property filter.
fn has_unsafe_css(value: &str) -> bool {
    let lowered = value.to_ascii_lowercase();
    lowered.contains("url(") || lowered.contains("expression(") || lowered.contains("javascript:")
}

fn cleaner() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .tag_attributes(tag_attributes())
        .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
        .filter_style_properties(ALLOWED_CSS_PROPERTIES.iter().copied().collect())
        .url_schemes(ALLOWED_URL_SCHEMES.iter().copied().collect())
        .clean_content_tags(HashSet::from(["script", "style"]))
        .link_rel(Some(LINK_REL))
        .attribute_filter(|_element, attribute, value| {
            if attribute == "style" && has_unsafe_css(value) {
                None
            } else {
                Some(value.into())
            }
        });
    builder
}

/// Clean user-supplied rich text and turn bare URLs into links.
///
/// Runs on every save of a text body, so stored bodies are always safe to
/// embed verbatim.
pub fn sanitize_html(raw: &str) -> String {
    let cleaned = cleaner().clean(raw).to_string();
    linkify(&cleaned)
}
