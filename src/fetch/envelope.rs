//! Search response envelope and content-fragment unescaping.
//!
//! A result page responds with `{"response": {"posts_html": "..."}}`. The
//! fragment arrives escaped; an absent or empty fragment is the source's own
//! end-of-results marker.

use serde::Deserialize;

use super::FetchError;

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    response: Option<SearchResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts_html: Option<String>,
}

/// Extracts and unescapes the posts fragment of page `page`.
///
/// Returns `Ok(None)` when the page carries no content.
///
/// # Errors
///
/// Returns [`FetchError::Envelope`] when `body` is not a JSON envelope.
pub fn posts_fragment(body: &str, page: u32) -> Result<Option<String>, FetchError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|source| FetchError::Envelope { page, source })?;

    let html = envelope
        .response
        .and_then(|r| r.posts_html)
        .filter(|html| !html.trim().is_empty());

    Ok(html.map(|html| unescape_fragment(&html)))
}

/// Undoes backslash escapes and the common HTML entities found in URLs.
#[must_use]
pub fn unescape_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    decode_entities(&out)
}

fn decode_entities(html: &str) -> String {
    const ENTITIES: [(&str, &str); 6] = [
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&#x27;", "'"),
        ("&#47;", "/"),
        ("&#x2F;", "/"),
        ("&amp;", "&"),
    ];

    if !html.contains('&') {
        return html.to_string();
    }
    // `&amp;` last so `&amp;quot;` decodes to `&quot;`, not `"`.
    ENTITIES
        .iter()
        .fold(html.to_string(), |acc, (entity, plain)| acc.replace(entity, plain))
}
