use anyhow::Result;
use tracing::warn;

use super::{fetch_page, resolve_url};
use crate::classify::{self, Level};
use crate::db::{ProgramRecord, RequirementSection};
use crate::html;
use crate::parser::rows::parse_rows;
use crate::parser::sections::{build_requirements, segment_rows};

/// End-of-curriculum markers, tried in this order. Bulletin pages omit
/// some sections unpredictably; the last resort is end-of-document.
const CURRICULUM_END_IDS: &[&str] = &[
    "sampleplanofstudytextcontainer",
    "learningoutcomestextcontainer",
    "policiestextcontainer",
];
const CURRICULUM_START_ID: &str = "programrequirementstextcontainer";

/// Program skeleton derivable from the URL alone: level from the leading
/// path segment, school from the next one, name as a title-cased slug
/// fallback until the page supplies a real heading.
fn record_from_url(url: &str) -> ProgramRecord {
    let path = reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| "/".to_string());
    ProgramRecord {
        name: name_from_path(&path),
        level: if path.starts_with("/undergraduate") {
            Level::Undergraduate
        } else {
            Level::Graduate
        },
        school: classify::school_from_path(&path).to_string(),
        program_url: url.to_string(),
    }
}

fn name_from_path(path: &str) -> String {
    let slug = path.split('/').filter(|s| !s.is_empty()).last().unwrap_or("");
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a fetched program page: page heading wins over the slug name, the
/// curriculum container is cut out with the ordered end-marker fallback,
/// and every course-list table inside it feeds the segmenter.
pub fn parse_program_page(page: &str, url: &str) -> (ProgramRecord, Vec<RequirementSection>) {
    let mut record = record_from_url(url);
    let heading = html::class_text(page, "page-title");
    if !heading.is_empty() {
        record.name = heading;
    }

    let curriculum = html::extract_delimited_block(page, CURRICULUM_START_ID, CURRICULUM_END_IDS);
    let mut rows = Vec::new();
    for table in html::extract_tables(curriculum, "sc_courselist") {
        rows.extend(parse_rows(table));
    }
    (record, build_requirements(segment_rows(&rows)))
}

/// Fetch and parse a program page. Any failure degrades to the partial
/// record with zero requirements; a program without requirements is a
/// valid outcome, not a hard failure.
pub async fn scrape_program_page(
    client: &reqwest::Client,
    raw_url: &str,
) -> Result<(String, ProgramRecord, Vec<RequirementSection>)> {
    let url = resolve_url(raw_url);
    let page = match fetch_page(client, &url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("program page {} unreachable, keeping partial record: {:#}", url, e);
            return Ok((String::new(), record_from_url(&url), Vec::new()));
        }
    };

    let parse_page = page.clone();
    let parse_url = url.clone();
    let (record, requirements) =
        tokio::task::spawn_blocking(move || parse_program_page(&parse_page, &parse_url)).await?;
    Ok((page, record, requirements))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ClauseKind;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/program_page.html").unwrap()
    }

    const URL: &str = "https://bulletins.nyu.edu/undergraduate/arts-and-science/computer-science-ba/";

    #[test]
    fn record_fields_from_page_and_url() {
        let (record, _) = parse_program_page(&fixture(), URL);
        assert_eq!(record.name, "Computer Science (BA)");
        assert_eq!(record.level, Level::Undergraduate);
        assert_eq!(record.school, "College of Arts and Science");
        assert_eq!(record.program_url, URL);
    }

    #[test]
    fn requirements_stop_at_sample_plan() {
        let (_, requirements) = parse_program_page(&fixture(), URL);
        let names: Vec<&str> = requirements.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Major Requirements", "Electives"]);
        // The sample-plan table after the end marker must not leak in.
        assert!(requirements
            .iter()
            .flat_map(|s| &s.clauses)
            .all(|c| !c.courses.contains(&"FAKE-UA 999".to_string())));
    }

    #[test]
    fn clause_kinds_from_fixture() {
        let (_, requirements) = parse_program_page(&fixture(), URL);
        let major = &requirements[0];
        assert_eq!(major.clauses[0].kind, ClauseKind::Required);
        assert_eq!(major.clauses[1].kind, ClauseKind::Alternative);

        let electives = &requirements[1];
        assert_eq!(electives.clauses[0].kind, ClauseKind::Options);
        assert_eq!(electives.clauses[0].credits_required, Some(8.0));
    }

    #[test]
    fn graduate_level_from_path() {
        let url = "https://bulletins.nyu.edu/graduate/arts-and-science/math-ms/";
        let (record, _) = parse_program_page("<html></html>", url);
        assert_eq!(record.level, Level::Graduate);
        // No heading on the page: slug fallback.
        assert_eq!(record.name, "Math Ms");
    }

    #[test]
    fn page_without_curriculum_yields_no_requirements() {
        let (record, requirements) =
            parse_program_page("<h1 class=\"page-title\">Empty</h1>", URL);
        assert_eq!(record.name, "Empty");
        assert!(requirements.is_empty());
    }
}
