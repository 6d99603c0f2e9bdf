use std::sync::LazyLock;

use regex::Regex;

use super::rows::Row;
use crate::db::{Clause, ClauseKind, RequirementSection};
use crate::html;

static CREDITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s+credits").unwrap());

/// A named run of raw rows, before row-level classification.
#[derive(Debug, Clone)]
pub struct RawSection {
    pub name: String,
    pub rows: Vec<Row>,
}

/// Content row after classification. Header, area-header and subtotal rows
/// never reach this type.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    Course { code: String, title: Option<String>, credits: Option<i64> },
    OrCourse { code: String },
    Comment(String),
}

// ── Header detection ──

/// Ordered header-detection rules, first match wins. The order is part of
/// the contract: the marker class is checked before the bold heuristic, and
/// the combined comment+areaheader pattern is the last resort.
const HEADER_RULES: &[fn(&Row) -> bool] = &[
    |row| row.has_class("areaheader"),
    |row| row.has_strong_or_bold(),
    |row| row.has_class_anywhere("courselistcomment") && row.has_class_anywhere("areaheader"),
];

pub fn is_header_row(row: &Row) -> bool {
    HEADER_RULES.iter().any(|rule| rule(row))
}

/// Section name from a header row. Extraction mirrors the detection
/// priority: strong text, then bold text, then the comment span, then the
/// raw row text as last resort.
pub fn header_name(row: &Row) -> String {
    let extractors: &[fn(&Row) -> Option<String>] = &[
        |r| r.strong_text(),
        |r| r.bold_text(),
        |r| {
            let t = html::class_text(&r.html, "courselistcomment");
            (!t.is_empty()).then_some(t)
        },
    ];
    extractors
        .iter()
        .find_map(|extract| extract(row))
        .unwrap_or_else(|| row.text())
}

// ── Segmentation ──

/// Group rows into named sections. A header row flushes the open section
/// (only if it has a name and at least one row) and starts a new one. Rows
/// before the first header have no section to belong to and are dropped;
/// that is deliberate, not a bug.
pub fn segment_rows(rows: &[Row]) -> Vec<RawSection> {
    let mut out: Vec<RawSection> = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_rows: Vec<Row> = Vec::new();

    for row in rows {
        if is_header_row(row) {
            if let Some(name) = current_name.take() {
                if !current_rows.is_empty() {
                    out.push(RawSection { name, rows: std::mem::take(&mut current_rows) });
                } else {
                    current_rows.clear();
                }
            }
            current_name = Some(header_name(row));
        } else if current_name.is_some() {
            current_rows.push(row.clone());
        }
    }

    if let Some(name) = current_name {
        if !current_rows.is_empty() {
            out.push(RawSection { name, rows: current_rows });
        }
    }

    out
}

/// Concatenate sections sharing a name across physically separate tables,
/// keeping first-appearance order.
pub fn merge_sections(sections: Vec<RawSection>) -> Vec<RawSection> {
    let mut out: Vec<RawSection> = Vec::new();
    for section in sections {
        match out.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => existing.rows.extend(section.rows),
            None => out.push(section),
        }
    }
    out
}

// ── Row classification ──

/// Classify one content row; `None` means the row is discarded (area
/// headers re-appearing mid-section, list subtotals, rows with no code).
pub fn classify_row(row: &Row) -> Option<RowKind> {
    if row.has_class("areaheader") || row.has_class("listsum") {
        return None;
    }

    let code = row.first_anchor_text();

    if row.has_class("orclass") {
        return code.map(|code| RowKind::OrCourse { code });
    }

    if row.has_class_anywhere("courselistcomment") && code.is_none() {
        let text = row.text();
        return (!text.is_empty()).then_some(RowKind::Comment(text));
    }

    code.map(|code| RowKind::Course {
        code,
        title: row.first_non_anchor_cell_text(),
        credits: row
            .cell_with_class("hourscol")
            .and_then(|cell| cell.text.trim().parse::<f64>().ok())
            .map(|h| h.floor() as i64),
    })
}

// ── Clause building ──

/// Turn merged sections into requirement clauses. Course rows open
/// `required` clauses; an or-row folds into the previous clause and makes
/// it `alternative`; a comment carrying an "N credits" figure opens an
/// `options` group over the course rows that follow it. A section whose
/// rows all filter away is still emitted with an empty clause list.
pub fn build_requirements(sections: Vec<RawSection>) -> Vec<RequirementSection> {
    merge_sections(sections)
        .into_iter()
        .map(|section| RequirementSection {
            clauses: build_clauses(&section.rows),
            name: section.name,
        })
        .collect()
}

fn build_clauses(rows: &[Row]) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = Vec::new();
    let mut options: Option<(f64, Vec<String>)> = None;

    for kind in rows.iter().filter_map(classify_row) {
        match kind {
            RowKind::Comment(text) => {
                flush_options(&mut clauses, options.take());
                if let Some(caps) = CREDITS_RE.captures(&text) {
                    if let Ok(credits) = caps[1].parse::<f64>() {
                        options = Some((credits, Vec::new()));
                    }
                }
            }
            RowKind::Course { code, .. } => match &mut options {
                Some((_, courses)) => courses.push(code),
                None => clauses.push(Clause {
                    kind: ClauseKind::Required,
                    courses: vec![code],
                    credits_required: None,
                }),
            },
            RowKind::OrCourse { code } => match &mut options {
                Some((_, courses)) => courses.push(code),
                None => match clauses.last_mut() {
                    Some(last) => {
                        last.kind = ClauseKind::Alternative;
                        last.courses.push(code);
                    }
                    None => clauses.push(Clause {
                        kind: ClauseKind::Alternative,
                        courses: vec![code],
                        credits_required: None,
                    }),
                },
            },
        }
    }

    flush_options(&mut clauses, options);
    clauses
}

fn flush_options(clauses: &mut Vec<Clause>, options: Option<(f64, Vec<String>)>) {
    if let Some((credits, courses)) = options {
        if !courses.is_empty() {
            clauses.push(Clause {
                kind: ClauseKind::Options,
                courses,
                credits_required: Some(credits),
            });
        }
    }
}

// ── Tests ──
