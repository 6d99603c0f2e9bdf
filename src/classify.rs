/// Documented default for program codes absent from the suffix table.
pub const DEFAULT_SCHOOL: &str = "College of Arts and Science";

/// Program-code suffix → school. The bulletin never labels school
/// affiliation on course or program pages, so this table is maintained by
/// hand from the registrar's subject-code listing.
const SCHOOL_BY_SUFFIX: &[(&str, &str)] = &[
    ("UA", "College of Arts and Science"),
    ("GA", "Graduate School of Arts and Science"),
    ("UB", "Leonard N. Stern School of Business"),
    ("GB", "Leonard N. Stern School of Business"),
    ("UC", "School of Professional Studies"),
    ("GC", "School of Professional Studies"),
    ("UD", "College of Dentistry"),
    ("GD", "College of Dentistry"),
    ("UE", "Steinhardt School of Culture, Education, and Human Development"),
    ("GE", "Steinhardt School of Culture, Education, and Human Development"),
    ("UF", "Gallatin School of Individualized Study"),
    ("GF", "Gallatin School of Individualized Study"),
    ("UG", "Liberal Studies"),
    ("GG", "Graduate School of Arts and Science"),
    ("UH", "School of Global Public Health"),
    ("GH", "School of Global Public Health"),
    ("UI", "College of Arts and Science"),
    ("GI", "Graduate School of Arts and Science"),
    ("UK", "Rory Meyers College of Nursing"),
    ("GK", "Rory Meyers College of Nursing"),
    ("UL", "Liberal Studies"),
    ("GL", "Graduate School of Arts and Science"),
    ("UM", "Grossman School of Medicine"),
    ("GM", "Grossman School of Medicine"),
    ("UN", "Rory Meyers College of Nursing"),
    ("GN", "Rory Meyers College of Nursing"),
    ("UO", "Liberal Studies"),
    ("GO", "Graduate School of Arts and Science"),
    ("UP", "Robert F. Wagner Graduate School of Public Service"),
    ("GP", "Robert F. Wagner Graduate School of Public Service"),
    ("UQ", "Steinhardt School of Culture, Education, and Human Development"),
    ("GQ", "Steinhardt School of Culture, Education, and Human Development"),
    ("UR", "College of Arts and Science"),
    ("GR", "Graduate School of Arts and Science"),
    ("US", "Silver School of Social Work"),
    ("GS", "Silver School of Social Work"),
    ("UT", "Tisch School of the Arts"),
    ("GT", "Tisch School of the Arts"),
    ("UU", "School of Global Public Health"),
    ("GU", "School of Global Public Health"),
    ("UW", "Silver School of Social Work"),
    ("GW", "Silver School of Social Work"),
    ("UY", "Tandon School of Engineering"),
    ("GY", "Tandon School of Engineering"),
    ("UZ", "Gallatin School of Individualized Study"),
    ("GZ", "Graduate School of Arts and Science"),
    ("LW", "School of Law"),
    ("MD", "Grossman School of Medicine"),
    ("DN", "College of Dentistry"),
    ("SHU", "NYU Shanghai"),
    ("AD", "NYU Abu Dhabi"),
];

/// Program codes that are graduate-level regardless of course number.
const GRADUATE_SUFFIXES: &[&str] = &[
    "GA", "GB", "GC", "GD", "GE", "GF", "GG", "GH", "GI", "GK", "GL", "GM",
    "GN", "GO", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "GZ", "LW",
    "MD", "DN",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Undergraduate,
    Graduate,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Undergraduate => "undergraduate",
            Level::Graduate => "graduate",
        }
    }
}

/// Trailing token of a program code, uppercased: "csci-ua" → "UA".
fn suffix_of(program: &str) -> String {
    program
        .rsplit('-')
        .next()
        .unwrap_or(program)
        .trim()
        .to_ascii_uppercase()
}

/// School for a program code. Unmapped codes get [`DEFAULT_SCHOOL`]; this
/// is the documented fallback, not an error.
pub fn school_from_program_code(program: &str) -> &'static str {
    let suffix = suffix_of(program);
    SCHOOL_BY_SUFFIX
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, school)| *school)
        .unwrap_or(DEFAULT_SCHOOL)
}

/// Course level. Decision order matters: the program code is definitive
/// when known, and number-based inference is only the fallback.
///   1. graduate-only program codes are always graduate
///   2. a "U"-prefixed code is always undergraduate
///   3. otherwise zero-pad the number to 4 digits; leading digit ≥ 5 means
///      graduate
pub fn course_level(program: &str, number: &str) -> Level {
    let suffix = suffix_of(program);
    if GRADUATE_SUFFIXES.contains(&suffix.as_str()) {
        return Level::Graduate;
    }
    if suffix.starts_with('U') {
        return Level::Undergraduate;
    }

    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let padded = format!("{:0>4}", digits);
    match padded.chars().next() {
        Some(c) if c >= '5' => Level::Graduate,
        _ => Level::Undergraduate,
    }
}

/// Match a bulletin URL path segment against the school table by slug.
/// "/undergraduate/tandon-school-of-engineering/cs-bs/" resolves through
/// its second segment; unknown segments fall back to [`DEFAULT_SCHOOL`].
pub fn school_from_path(path: &str) -> &'static str {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let _level = segments.next();
    let Some(school_slug) = segments.next() else {
        return DEFAULT_SCHOOL;
    };
    let want = slug(school_slug);

    SCHOOL_BY_SUFFIX
        .iter()
        .map(|(_, school)| *school)
        .find(|school| slug(school) == want)
        .unwrap_or(DEFAULT_SCHOOL)
}

/// Names of every school in the table, deduplicated in table order. Used
/// by discovery to filter navigation links down to real school pages.
pub fn school_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    for (_, school) in SCHOOL_BY_SUFFIX {
        if !names.contains(school) {
            names.push(school);
        }
    }
    names
}

/// Lowercase alphanumerics only, so "Arts and Science", "arts-and-science"
/// and "artsandscience" all compare equal.
fn slug(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mapped_suffix_resolves() {
        for (suffix, school) in SCHOOL_BY_SUFFIX {
            assert_eq!(school_from_program_code(&format!("XXXX-{suffix}")), *school);
        }
    }

    #[test]
    fn unmapped_code_gets_default() {
        assert_eq!(school_from_program_code("CSCI-ZZ"), DEFAULT_SCHOOL);
        assert_eq!(school_from_program_code(""), DEFAULT_SCHOOL);
        assert_eq!(school_from_program_code("NODASH"), DEFAULT_SCHOOL);
    }

    #[test]
    fn suffix_lookup_is_case_insensitive() {
        assert_eq!(
            school_from_program_code("csci-ua"),
            "College of Arts and Science"
        );
    }

    #[test]
    fn graduate_code_wins_regardless_of_number() {
        assert_eq!(course_level("CSCI-GA", "101"), Level::Graduate);
        assert_eq!(course_level("LAW-LW", "1"), Level::Graduate);
    }

    #[test]
    fn u_prefix_wins_regardless_of_number() {
        assert_eq!(course_level("CSCI-UA", "9999"), Level::Undergraduate);
        assert_eq!(course_level("CSCI-UA", "501"), Level::Undergraduate);
    }

    #[test]
    fn number_fallback_pads_to_four_digits() {
        // "501" pads to "0501" → undergraduate; "5010" stays graduate.
        assert_eq!(course_level("CSCI-XX", "501"), Level::Undergraduate);
        assert_eq!(course_level("CSCI-XX", "5010"), Level::Graduate);
        assert_eq!(course_level("CSCI-XX", "4999"), Level::Undergraduate);
        assert_eq!(course_level("CSCI-XX", ""), Level::Undergraduate);
    }

    #[test]
    fn school_from_path_matches_slug() {
        assert_eq!(
            school_from_path("/undergraduate/tandon-school-of-engineering/cs/"),
            "Tandon School of Engineering"
        );
        assert_eq!(
            school_from_path("/graduate/graduate-school-of-arts-and-science/math/"),
            "Graduate School of Arts and Science"
        );
        assert_eq!(school_from_path("/undergraduate/unknown-school/x/"), DEFAULT_SCHOOL);
        assert_eq!(school_from_path("/"), DEFAULT_SCHOOL);
    }

    #[test]
    fn school_names_deduplicated() {
        let names = school_names();
        assert!(names.contains(&"College of Arts and Science"));
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }
}
