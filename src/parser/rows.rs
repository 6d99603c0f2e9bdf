use std::sync::LazyLock;

use regex::Regex;

use crate::html;

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)(<tr\b[^>]*>)(.*?)</tr>").unwrap());
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)(<t[dh]\b[^>]*>)(.*?)</t[dh]>").unwrap());
static STRONG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<strong\b[^>]*>(.*?)</strong>").unwrap());
static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<b\b[^>]*>(.*?)</b>").unwrap());

/// One `<td>`/`<th>` cell of a course-list row.
#[derive(Debug, Clone)]
pub struct Cell {
    pub classes: Vec<String>,
    pub html: String,
    pub text: String,
}

/// One `<tr>` of a course-list table, with its class tokens and cells.
#[derive(Debug, Clone)]
pub struct Row {
    pub classes: Vec<String>,
    pub cells: Vec<Cell>,
    pub html: String,
}

/// Split a table fragment into rows. Best-effort: rows without cells are
/// kept (header rows sometimes span the table), broken markup yields fewer
/// rows rather than an error.
pub fn parse_rows(table_html: &str) -> Vec<Row> {
    ROW_RE
        .captures_iter(table_html)
        .map(|caps| {
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let cells = CELL_RE
                .captures_iter(body)
                .map(|c| {
                    let inner = c.get(2).map(|m| m.as_str()).unwrap_or_default();
                    Cell {
                        classes: html::tag_classes(c.get(1).map(|m| m.as_str()).unwrap_or_default()),
                        html: inner.to_string(),
                        text: html::strip_tags(inner),
                    }
                })
                .collect();
            Row {
                classes: html::tag_classes(caps.get(1).map(|m| m.as_str()).unwrap_or_default()),
                cells,
                html: body.to_string(),
            }
        })
        .collect()
}

impl Row {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Any cell carrying `class`.
    pub fn cell_with_class(&self, class: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|cell| cell.classes.iter().any(|c| c == class))
    }

    /// Whole-row text, tag-stripped.
    pub fn text(&self) -> String {
        html::strip_tags(&self.html)
    }

    /// Text of the first anchor anywhere in the row (the course code on
    /// course rows).
    pub fn first_anchor_text(&self) -> Option<String> {
        html::extract_anchors(&self.html)
            .into_iter()
            .map(|a| a.text)
            .find(|t| !t.is_empty())
    }

    /// Text of the first cell that contains no anchor (the course title).
    pub fn first_non_anchor_cell_text(&self) -> Option<String> {
        self.cells
            .iter()
            .filter(|cell| !cell.html.to_ascii_lowercase().contains("<a"))
            .map(|cell| cell.text.clone())
            .find(|t| !t.is_empty())
    }

    /// First `<strong>` text in the row.
    pub fn strong_text(&self) -> Option<String> {
        STRONG_RE
            .captures(&self.html)
            .map(|c| html::strip_tags(&c[1]))
            .filter(|t| !t.is_empty())
    }

    /// First `<b>` text in the row.
    pub fn bold_text(&self) -> Option<String> {
        BOLD_RE
            .captures(&self.html)
            .map(|c| html::strip_tags(&c[1]))
            .filter(|t| !t.is_empty())
    }

    pub fn has_strong_or_bold(&self) -> bool {
        STRONG_RE.is_match(&self.html) || BOLD_RE.is_match(&self.html)
    }

    /// Class tokens across the row's own tag and every tag inside it.
    pub fn all_class_tokens(&self) -> Vec<String> {
        let mut tokens = self.classes.clone();
        for tag in OPEN_TAG_RE.find_iter(&self.html) {
            tokens.extend(html::tag_classes(tag.as_str()));
        }
        tokens
    }

    /// Does `class` appear on the row or any element within it?
    pub fn has_class_anywhere(&self, class: &str) -> bool {
        self.all_class_tokens().iter().any(|c| c == class)
    }
}

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^/>][^>]*>").unwrap());

// ── Tests ──
