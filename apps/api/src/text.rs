use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Entry cap after which the cache is dropped wholesale. Descriptions are
/// re-derived lazily, so a flush only costs recomputation.
const CACHE_MAX_ENTRIES: usize = 4096;

/// Derives display HTML from plain text: blank-line-separated blocks become
/// `<p>` paragraphs, single newlines become `<br>`, markup characters are
/// escaped. Same semantics as Rails' `simple_format`.
pub fn simple_format(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + 16);
    let normalized = text.replace("\r\n", "\n");
    for block in normalized.split("\n\n").filter(|b| !b.trim().is_empty()) {
        html.push_str("<p>");
        let mut first = true;
        for line in block.split('\n') {
            if !first {
                html.push_str("<br>");
            }
            first = false;
            html.push_str(&escape_html(line));
        }
        html.push_str("</p>");
    }
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Memoized derived-HTML cache keyed on a 64-bit hash of the source text.
/// Serializers re-derive HTML for unchanged descriptions on every response;
/// this keeps that a map lookup.
#[derive(Default)]
pub struct HtmlCache {
    inner: Mutex<HashMap<u64, Arc<str>>>,
}

impl HtmlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, source: &str) -> Arc<str> {
        let key = source_key(source);
        let mut cache = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = cache.get(&key) {
            return Arc::clone(cached);
        }
        if cache.len() >= CACHE_MAX_ENTRIES {
            cache.clear();
        }
        let rendered: Arc<str> = Arc::from(simple_format(source));
        cache.insert(key, Arc::clone(&rendered));
        rendered
    }
}

fn source_key(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_text_in_paragraph() {
        assert_eq!(simple_format("hello"), "<p>hello</p>");
    }

    #[test]
    fn blank_line_splits_paragraphs() {
        assert_eq!(
            simple_format("first\n\nsecond"),
            "<p>first</p><p>second</p>"
        );
    }

    #[test]
    fn single_newline_becomes_br() {
        assert_eq!(simple_format("line one\nline two"), "<p>line one<br>line two</p>");
    }

    #[test]
    fn crlf_is_normalized() {
        assert_eq!(
            simple_format("a\r\n\r\nb"),
            "<p>a</p><p>b</p>"
        );
    }

    #[test]
    fn markup_is_escaped() {
        assert_eq!(
            simple_format("<script>1 & 2</script>"),
            "<p>&lt;script&gt;1 &amp; 2&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(simple_format(""), "");
        assert_eq!(simple_format("\n\n"), "");
    }

    #[test]
    fn cache_returns_same_allocation_on_hit() {
        let cache = HtmlCache::new();
        let a = cache.render("shared description");
        let b = cache.render("shared description");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn cache_recomputes_on_changed_source() {
        let cache = HtmlCache::new();
        let a = cache.render("before");
        let b = cache.render("after");
        assert_ne!(&*a, &*b);
    }
}
