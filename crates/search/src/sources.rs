//! Source extraction helpers shared by the providers.

use pipeline::Source;
use url::Url;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '>', '"', '\'', '*'];

/// Finds `http(s)` URLs in free text, in order of first appearance, without
/// duplicates. Each source is titled with the URL's host.
pub(crate) fn extract_urls(text: &str, limit: usize) -> Vec<Source> {
    let mut sources: Vec<Source> = Vec::new();
    for token in text.split(|c: char| c.is_whitespace() || c == '(' || c == '<' || c == '[') {
        if sources.len() >= limit {
            break;
        }
        let Some(start) = token.find("http://").or_else(|| token.find("https://")) else {
            continue;
        };
        let candidate = token[start..].trim_end_matches(TRAILING_PUNCTUATION);
        let Ok(url) = Url::parse(candidate) else {
            continue;
        };
        let Some(host) = url.host_str() else {
            continue;
        };
        let href = url.to_string();
        if sources.iter().any(|s| s.url == href) {
            continue;
        }
        sources.push(Source::new(host, href));
    }
    sources
}

/// Pushes `source` unless its URL is blank, unparsable or already present.
pub(crate) fn push_unique(sources: &mut Vec<Source>, title: &str, url: &str, limit: usize) {
    if sources.len() >= limit {
        return;
    }
    let Ok(parsed) = Url::parse(url.trim()) else {
        return;
    };
    let href = parsed.to_string();
    if sources.iter().any(|s| s.url == href) {
        return;
    }
    let title = match title.trim() {
        "" => parsed.host_str().unwrap_or_default().to_string(),
        t => t.to_string(),
    };
    sources.push(Source::new(title, href));
}
