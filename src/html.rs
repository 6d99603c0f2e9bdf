use std::sync::LazyLock;

use regex::Regex;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a>"#)
        .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});
static NUM_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]{1,6}|[0-9]{1,7});").unwrap());

/// One `<a>` element: decoded link text plus raw href.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub text: String,
    pub href: String,
}

/// Extract every anchor from an HTML fragment, tolerating attribute order
/// and quoting variance. Text is tag-stripped, entity-decoded and trimmed.
pub fn extract_anchors(html: &str) -> Vec<Anchor> {
    ANCHOR_RE
        .captures_iter(html)
        .map(|caps| {
            let href = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            Anchor {
                text: strip_tags(caps.get(4).map(|m| m.as_str()).unwrap_or_default()),
                href: href.trim().to_string(),
            }
        })
        .collect()
}

/// Anchors inside the first `<ul>` carrying all tokens of `ul_class`.
pub fn extract_list_anchors(html: &str, ul_class: &str) -> Vec<Anchor> {
    match find_tag_with_class(html, "ul", ul_class, 0) {
        Some(start) => extract_anchors(element_block(html, start)),
        None => Vec::new(),
    }
}

/// Cut the block starting at the element with `id="start_id"` and ending at
/// the first of `end_ids` found after it, tried in order. The scan backs up
/// from the id attribute to the enclosing opening tag. If no end marker
/// matches, the block runs to the end of the document; if the start marker
/// is missing, the result is empty.
pub fn extract_delimited_block<'a>(html: &'a str, start_id: &str, end_ids: &[&str]) -> &'a str {
    let Some(at) = find_id(html, start_id, 0) else {
        return "";
    };
    let start = html[..at].rfind('<').unwrap_or(at);

    for end_id in end_ids {
        if let Some(end_at) = find_id(html, end_id, start + 1) {
            let end = html[..end_at].rfind('<').unwrap_or(end_at);
            if end > start {
                return &html[start..end];
            }
        }
    }
    &html[start..]
}

/// All `<table>` blocks whose class attribute carries `class`.
pub fn extract_tables<'a>(html: &'a str, class: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_tag_with_class(html, "table", class, pos) {
        let block = element_block(html, start);
        out.push(block);
        pos = start + block.len().max(1);
    }
    out
}

/// Single-pass scan over `<div>` blocks carrying `class`, invoking `f` once
/// per block. Streaming stand-in for an element-callback rewriter: the
/// document is walked exactly once and no tree is built.
pub fn for_each_block<F: FnMut(&str)>(html: &str, class: &str, mut f: F) {
    let mut pos = 0;
    while let Some(start) = find_tag_with_class(html, "div", class, pos) {
        let block = element_block(html, start);
        f(block);
        pos = start + block.len().max(1);
    }
}

/// Inner text of the first element carrying `class`, or empty.
pub fn class_text(html: &str, class: &str) -> String {
    match find_any_tag_with_class(html, class, 0) {
        Some(start) => strip_tags(element_block(html, start)),
        None => String::new(),
    }
}

/// Drop tags, decode entities and collapse whitespace runs.
pub fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = unescape_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the entities that show up in bulletin markup. Unknown named
/// entities pass through untouched.
pub fn unescape_entities(s: &str) -> String {
    let s = NUM_ENTITY_RE.replace_all(s, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = if let Some(hex) = body.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last so "&amp;nbsp;" decodes to the literal "&nbsp;".
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Class tokens of an opening tag, in document order.
pub fn tag_classes(tag: &str) -> Vec<String> {
    let Some(caps) = CLASS_ATTR_RE.captures(tag) else {
        return Vec::new();
    };
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split_whitespace()
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

// ── Low-level scanning ──

/// Byte offset of the next `id="..."` attribute matching `id` exactly.
fn find_id(html: &str, id: &str, from: usize) -> Option<usize> {
    let re = Regex::new(&format!(
        r#"(?i)\bid\s*=\s*["']?{}["'\s>]"#,
        regex::escape(id)
    ))
    .ok()?;
    let from = from.min(html.len());
    re.find(&html[from..]).map(|m| from + m.start())
}

/// Does this opening tag's class attribute carry every token of `class`?
fn tag_has_class(tag: &str, class: &str) -> bool {
    let Some(caps) = CLASS_ATTR_RE.captures(tag) else {
        return false;
    };
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default();
    class.split_whitespace().all(|want| {
        value
            .split_whitespace()
            .any(|have| have.eq_ignore_ascii_case(want))
    })
}

/// Find the start of the next opening `<name ...>` tag carrying `class`.
fn find_tag_with_class(html: &str, name: &str, class: &str, from: usize) -> Option<usize> {
    scan_tags(html, from, |tag| {
        tag_name_is(tag, name) && tag_has_class(tag, class)
    })
}

/// Like [`find_tag_with_class`] but accepting any tag name.
fn find_any_tag_with_class(html: &str, class: &str, from: usize) -> Option<usize> {
    scan_tags(html, from, |tag| {
        !tag.starts_with("</") && tag_has_class(tag, class)
    })
}

fn scan_tags(html: &str, from: usize, mut pred: impl FnMut(&str) -> bool) -> Option<usize> {
    let mut pos = from.min(html.len());
    while let Some(i) = html[pos..].find('<') {
        let start = pos + i;
        let Some(e) = html[start..].find('>') else {
            return None;
        };
        let tag = &html[start..start + e + 1];
        if pred(tag) {
            return Some(start);
        }
        pos = start + 1;
    }
    None
}

fn tag_name_is(tag: &str, name: &str) -> bool {
    let body = tag.trim_start_matches('<');
    body.len() > name.len()
        && body[..name.len()].eq_ignore_ascii_case(name)
        && matches!(
            body.as_bytes()[name.len()],
            b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/'
        )
}

/// Slice from an opening tag through its matching close tag, counting
/// nested same-name tags. Unbalanced markup degrades to end-of-input.
fn element_block(html: &str, open_start: usize) -> &str {
    let rest = &html[open_start..];
    let name_end = rest[1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map(|i| i + 1)
        .unwrap_or(rest.len());
    let name = rest[1..name_end].to_ascii_lowercase();
    if name.is_empty() {
        return rest;
    }

    let hay = rest.to_ascii_lowercase();
    let open = format!("<{name}");
    let close = format!("</{name}");
    let mut depth = 0usize;
    let mut pos = 0usize;

    loop {
        let next_open = find_tag_at(&hay, &open, pos, false);
        let next_close = find_tag_at(&hay, &close, pos, true);
        match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => {
                depth += 1;
                pos = o + open.len();
            }
            (_, Some(c)) => {
                depth = depth.saturating_sub(1);
                let end = hay[c..].find('>').map(|e| c + e + 1).unwrap_or(hay.len());
                if depth == 0 {
                    return &rest[..end];
                }
                pos = end;
            }
            (Some(o), None) => {
                depth += 1;
                pos = o + open.len();
            }
            (None, None) => return rest,
        }
    }
}

/// Next occurrence of `needle` that starts a real tag (next byte terminates
/// the tag name), so `<ul` does not match `<ulx`.
fn find_tag_at(hay: &str, needle: &str, from: usize, closing: bool) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = hay[pos..].find(needle) {
        let at = pos + i;
        let after = hay.as_bytes().get(at + needle.len());
        let ok = match after {
            Some(b) => {
                b.is_ascii_whitespace() || *b == b'>' || (!closing && *b == b'/')
            }
            None => true,
        };
        if ok {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_double_quoted() {
        let got = extract_anchors(r#"<a href="/a">One</a><a href="/b">Two</a>"#);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], Anchor { text: "One".into(), href: "/a".into() });
    }

    #[test]
    fn anchors_attr_order_and_quoting() {
        let html = r#"<a class="x" href='/p'>P</a> <a target=_blank href=/q>Q</a>"#;
        let got = extract_anchors(html);
        assert_eq!(got[0].href, "/p");
        assert_eq!(got[1].href, "/q");
        assert_eq!(got[1].text, "Q");
    }

    #[test]
    fn anchor_text_decoded_and_stripped() {
        let html = r#"<a href="/x"><span>Arts &amp;&nbsp;Science</span></a>"#;
        assert_eq!(extract_anchors(html)[0].text, "Arts & Science");
    }

    #[test]
    fn anchors_empty_on_no_match() {
        assert!(extract_anchors("<p>no links here</p>").is_empty());
        assert!(extract_anchors("<a href=").is_empty());
    }

    #[test]
    fn entities() {
        assert_eq!(unescape_entities("A&ndash;B&mdash;C"), "A\u{2013}B\u{2014}C");
        assert_eq!(unescape_entities("&lt;b&gt; &quot;q&quot; &#39;s&#39;"), "<b> \"q\" 's'");
        assert_eq!(unescape_entities("&#65;&#x42;"), "AB");
        assert_eq!(unescape_entities("&amp;nbsp;"), "&nbsp;");
        assert_eq!(unescape_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn list_anchors_by_class() {
        let html = r#"
            <ul class="other"><li><a href="/skip">Skip</a></li></ul>
            <ul class="nav levelone">
              <li><a href="/one">One</a></li>
              <li><a href="/two">Two</a></li>
            </ul>"#;
        let got = extract_list_anchors(html, "nav levelone");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].href, "/one");
    }

    #[test]
    fn delimited_block_first_end_marker_wins() {
        let html = concat!(
            r#"<div id="curriculum"><p>body</p></div>"#,
            r#"<div id="sampleplan">plan</div>"#,
            r#"<div id="outcomes">out</div>"#,
        );
        let block = extract_delimited_block(html, "curriculum", &["sampleplan", "outcomes"]);
        assert!(block.contains("body"));
        assert!(!block.contains("plan"));
        assert!(!block.contains("out"));
    }

    #[test]
    fn delimited_block_ordered_fallback() {
        // First candidate absent: second one delimits the block.
        let html = concat!(
            r#"<div id="curriculum">body</div>"#,
            r#"<div id="outcomes">out</div>"#,
        );
        let block = extract_delimited_block(html, "curriculum", &["sampleplan", "outcomes"]);
        assert!(block.contains("body"));
        assert!(!block.contains("out"));
    }

    #[test]
    fn delimited_block_runs_to_eof() {
        let html = r#"<p>pre</p><div id="curriculum">body<p>tail</p>"#;
        let block = extract_delimited_block(html, "curriculum", &["sampleplan"]);
        assert!(block.starts_with("<div"));
        assert!(block.ends_with("<p>tail</p>"));
        assert!(!block.contains("pre"));
    }

    #[test]
    fn delimited_block_missing_start() {
        assert_eq!(extract_delimited_block("<p>x</p>", "nope", &["end"]), "");
    }

    #[test]
    fn tables_by_class() {
        let html = r#"
            <table class="sc_courselist"><tr><td>a</td></tr></table>
            <table class="plain"><tr><td>b</td></tr></table>
            <table class="sc_courselist wide"><tr><td>c</td></tr></table>"#;
        let tables = extract_tables(html, "sc_courselist");
        assert_eq!(tables.len(), 2);
        assert!(tables[0].contains(">a<"));
        assert!(tables[1].contains(">c<"));
    }

    #[test]
    fn block_scan_handles_nesting() {
        let html = concat!(
            r#"<div class="courseblock">one <div class="inner">nested</div> tail</div>"#,
            r#"<div class="courseblock">two</div>"#,
        );
        let mut blocks = Vec::new();
        for_each_block(html, "courseblock", |b| blocks.push(b.to_string()));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("nested"));
        assert!(blocks[0].ends_with("tail</div>"));
        assert!(blocks[1].contains("two"));
    }

    #[test]
    fn class_text_first_match() {
        let html = r#"<h1 class="page-title">Biology <span>(BA)</span></h1>"#;
        assert_eq!(class_text(html, "page-title"), "Biology (BA)");
        assert_eq!(class_text(html, "missing"), "");
    }

    #[test]
    fn malformed_never_panics() {
        for bad in ["<div class=", "<a href", "</", "<", "<div><div>"] {
            let _ = extract_anchors(bad);
            let _ = extract_tables(bad, "x");
            let _ = extract_delimited_block(bad, "a", &["b"]);
            for_each_block(bad, "x", |_| {});
        }
    }
}
