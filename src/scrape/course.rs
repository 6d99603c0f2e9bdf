use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use super::fetch_page;
use crate::classify;
use crate::db::{Clause, CourseRecord};
use crate::html;
use crate::parser::prereq;

/// "CSCI-UA 101", "MATH 120": program token(s), one space, number.
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+(?:-[A-Z]+)?) (\d+)$").unwrap());
static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Per-block accumulator, constructed fresh for each course block and
/// dropped at its end. No state survives between blocks.
#[derive(Debug, Default)]
struct CourseBlock {
    code: String,
    title: String,
    hours: String,
    description: String,
    extra: String,
}

impl CourseBlock {
    fn collect(block: &str) -> Self {
        CourseBlock {
            code: html::class_text(block, "detail-code"),
            title: html::class_text(block, "detail-title"),
            hours: html::class_text(block, "detail-hours"),
            description: html::class_text(block, "courseblockdesc"),
            extra: html::class_text(block, "courseblockextra"),
        }
    }

    /// Emit a record if the block captured both a code and a title and the
    /// code parses. Blocks that fail the code shape are skipped silently:
    /// not every courseblock on a page is a real course entry.
    fn finish(self, page_url: &str) -> Option<(CourseRecord, Vec<Clause>)> {
        if self.code.is_empty() || self.title.is_empty() {
            return None;
        }
        let code = self.code.trim().trim_end_matches('.').trim().to_string();
        let Some(caps) = CODE_RE.captures(&code) else {
            debug!("skipping non-course block: {:?}", code);
            return None;
        };
        let program = caps[1].to_string();
        let number = caps[2].to_string();

        let credits = HOURS_RE
            .find(&self.hours)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|h| h.floor() as i64);

        // The extra text goes through the prerequisite parser as-is, even
        // when it is an exclusion sentence rather than a requirement; the
        // parser's known simplifications apply to both.
        let prerequisites = prereq::parse_prerequisites(&self.extra);

        let record = CourseRecord {
            level: classify::course_level(&program, &number),
            school: classify::school_from_program_code(&program).to_string(),
            code,
            program,
            title: self.title.trim().to_string(),
            credits,
            description: self.description.trim().to_string(),
            course_url: page_url.to_string(),
        };
        Some((record, prerequisites))
    }
}

/// Stream a catalog page's course blocks into records. One page can carry
/// many blocks; blocks that don't look like courses yield nothing.
pub fn parse_course_page(page: &str, page_url: &str) -> Vec<(CourseRecord, Vec<Clause>)> {
    let mut out = Vec::new();
    html::for_each_block(page, "courseblock", |block| {
        if let Some(parsed) = CourseBlock::collect(block).finish(page_url) {
            out.push(parsed);
        }
    });
    out
}

/// Fetch and parse a course catalog page. HTTP failure propagates; parsing
/// runs off the async threads so a large page doesn't stall other jobs.
pub async fn scrape_course_page(
    client: &reqwest::Client,
    url: &str,
) -> Result<(String, Vec<(CourseRecord, Vec<Clause>)>)> {
    let page = fetch_page(client, url).await?;
    let url = url.to_string();
    let parse_page = page.clone();
    let records = tokio::task::spawn_blocking(move || parse_course_page(&parse_page, &url)).await?;
    Ok((page, records))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Level;
    use crate::db::ClauseKind;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/course_page.html").unwrap()
    }

    #[test]
    fn parses_every_real_course_block() {
        let records = parse_course_page(&fixture(), "https://bulletins.nyu.edu/courses/csci_ua/");
        assert_eq!(records.len(), 2);

        let (first, prereqs) = &records[0];
        assert_eq!(first.code, "CSCI-UA 101");
        assert_eq!(first.program, "CSCI-UA");
        assert_eq!(first.title, "Intro to Computer Science");
        assert_eq!(first.credits, Some(4));
        assert_eq!(first.level, Level::Undergraduate);
        assert_eq!(first.school, "College of Arts and Science");
        assert!(first.description.contains("problem solving"));
        assert_eq!(prereqs.len(), 1);
        assert_eq!(prereqs[0].kind, ClauseKind::Alternative);
        assert_eq!(prereqs[0].courses, vec!["CSCI-UA 2", "CSCI-UA 3"]);
    }

    #[test]
    fn graduate_block_classified_by_program_code() {
        let records = parse_course_page(&fixture(), "https://bulletins.nyu.edu/courses/csci_ua/");
        let (second, prereqs) = &records[1];
        assert_eq!(second.code, "CSCI-GA 1170");
        assert_eq!(second.level, Level::Graduate);
        assert!(prereqs.is_empty());
    }

    #[test]
    fn malformed_code_block_skipped() {
        // The fixture's third block has a non-course code line.
        let page = fixture();
        assert!(page.contains("About the Minor"));
        let records = parse_course_page(&page, "u");
        assert!(records.iter().all(|(r, _)| r.code != "About the Minor"));
    }

    #[test]
    fn unlabelled_extra_text_still_parsed() {
        // No "Prerequisite:" label at all; the code-bearing sentence still
        // yields a required clause.
        let page = r#"<div class="courseblock">
            <span class="detail-code"><strong>MATH-UA 20</strong></span>
            <span class="detail-title"><strong>Shapes</strong></span>
            <div class="courseblockextra">Not open to students who have taken MATH-UA 121.</div>
        </div>"#;
        let records = parse_course_page(page, "u");
        let (_, prereqs) = &records[0];
        assert_eq!(prereqs.len(), 1);
        assert_eq!(prereqs[0].kind, ClauseKind::Required);
        assert_eq!(prereqs[0].courses, vec!["MATH-UA 121"]);
    }

    #[test]
    fn credits_floored() {
        let page = r#"<div class="courseblock">
            <span class="detail-code"><strong>MATH-UA 9</strong></span>
            <span class="detail-title"><strong>Half Course</strong></span>
            <span class="detail-hours"><strong>2.5 Credits</strong></span>
        </div>"#;
        let records = parse_course_page(page, "u");
        assert_eq!(records[0].0.credits, Some(2));
    }

    #[test]
    fn missing_hours_is_none() {
        let page = r#"<div class="courseblock">
            <span class="detail-code"><strong>MATH-UA 10</strong></span>
            <span class="detail-title"><strong>No Hours</strong></span>
        </div>"#;
        let records = parse_course_page(page, "u");
        assert_eq!(records[0].0.credits, None);
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_course_page("", "u").is_empty());
        assert!(parse_course_page("<div class=\"other\">x</div>", "u").is_empty());
    }
}
