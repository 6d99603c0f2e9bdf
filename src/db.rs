use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::classify::Level;
use crate::jobs::{Job, JobStatus, JobType};

pub const DEFAULT_DB_PATH: &str = "data/albert.sqlite";

/// Shared handle for concurrent job tasks. Locks are short-lived and never
/// held across an await point; SQLite row-level atomicity does the rest.
pub type Db = Arc<Mutex<Connection>>;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn open_shared(path: &str) -> Result<Db> {
    let conn = connect(path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id           INTEGER PRIMARY KEY,
            url          TEXT NOT NULL,
            job_type     TEXT NOT NULL CHECK(job_type IN
                             ('discover-programs','discover-courses','program','course')),
            status       TEXT NOT NULL DEFAULT 'pending' CHECK(status IN
                             ('pending','processing','completed','failed')),
            started_at   TEXT,
            completed_at TEXT,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(job_type, url)
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

        CREATE TABLE IF NOT EXISTS error_log (
            id            INTEGER PRIMARY KEY,
            job_id        INTEGER NOT NULL REFERENCES jobs(id),
            error_type    TEXT NOT NULL,
            error_message TEXT NOT NULL,
            stack_trace   TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_error_log_job ON error_log(job_id);

        -- In-process queue transport. The payload is the job id only; all
        -- job state is re-read from the jobs table on delivery.
        CREATE TABLE IF NOT EXISTS queue (
            id           INTEGER PRIMARY KEY,
            job_id       INTEGER NOT NULL REFERENCES jobs(id),
            attempts     INTEGER NOT NULL DEFAULT 0,
            available_at TEXT NOT NULL,
            locked_until TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_available ON queue(available_at);

        CREATE TABLE IF NOT EXISTS programs (
            id          INTEGER PRIMARY KEY,
            name        TEXT UNIQUE NOT NULL,
            level       TEXT NOT NULL CHECK(level IN ('undergraduate','graduate')),
            school      TEXT NOT NULL,
            program_url TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS program_requirements (
            id               INTEGER PRIMARY KEY,
            program_id       INTEGER NOT NULL REFERENCES programs(id),
            section          TEXT NOT NULL,
            kind             TEXT NOT NULL CHECK(kind IN ('required','alternative','options')),
            courses          TEXT NOT NULL,
            credits_required REAL
        );
        CREATE INDEX IF NOT EXISTS idx_requirements_program
            ON program_requirements(program_id);

        CREATE TABLE IF NOT EXISTS courses (
            id          INTEGER PRIMARY KEY,
            code        TEXT UNIQUE NOT NULL,
            program     TEXT NOT NULL,
            level       TEXT NOT NULL CHECK(level IN ('undergraduate','graduate')),
            title       TEXT NOT NULL,
            credits     INTEGER,
            description TEXT,
            course_url  TEXT NOT NULL,
            school      TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_courses_program ON courses(program);

        CREATE TABLE IF NOT EXISTS course_prerequisites (
            id               INTEGER PRIMARY KEY,
            course_id        INTEGER NOT NULL REFERENCES courses(id),
            kind             TEXT NOT NULL CHECK(kind IN ('required','alternative','options')),
            courses          TEXT NOT NULL,
            credits_required REAL
        );
        CREATE INDEX IF NOT EXISTS idx_prerequisites_course
            ON course_prerequisites(course_id);

        CREATE TABLE IF NOT EXISTS page_cache (
            id         INTEGER PRIMARY KEY,
            job_id     INTEGER NOT NULL REFERENCES jobs(id),
            url        TEXT UNIQUE NOT NULL,
            html       TEXT NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Records ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Required,
    Alternative,
    Options,
}

impl ClauseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClauseKind::Required => "required",
            ClauseKind::Alternative => "alternative",
            ClauseKind::Options => "options",
        }
    }
}

/// One requirement or prerequisite clause: a set of course codes tagged
/// required / alternative / options-with-credit-threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub courses: Vec<String>,
    pub credits_required: Option<f64>,
}

/// Clauses grouped under one section header ("Major Requirements", ...).
/// An empty clause list is a valid outcome, not an error.
#[derive(Debug, Clone)]
pub struct RequirementSection {
    pub name: String,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
pub struct CourseRecord {
    pub program: String,
    pub code: String,
    pub level: Level,
    pub title: String,
    pub credits: Option<i64>,
    pub description: String,
    pub course_url: String,
    pub school: String,
}

#[derive(Debug, Clone)]
pub struct ProgramRecord {
    pub name: String,
    pub level: Level,
    pub school: String,
    pub program_url: String,
}

// ── Jobs ──

/// Fan-out insert. Duplicate (job_type, url) pairs are ignored; only the
/// ids of newly created rows come back, so callers enqueue exactly one
/// message per new job.
pub fn insert_jobs(conn: &Connection, job_type: JobType, urls: &[String]) -> Result<Vec<i64>> {
    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::new();
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO jobs (url, job_type) VALUES (?1, ?2)")?;
        for url in urls {
            if stmt.execute(rusqlite::params![url, job_type.as_str()])? > 0 {
                ids.push(tx.last_insert_rowid());
            }
        }
    }
    tx.commit()?;
    Ok(ids)
}

pub fn find_job_id(conn: &Connection, job_type: JobType, url: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM jobs WHERE job_type = ?1 AND url = ?2",
            rusqlite::params![job_type.as_str(), url],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn get_job(conn: &Connection, id: i64) -> Result<Option<Job>> {
    let row: Option<(i64, String, String, String, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT id, url, job_type, status, started_at, completed_at
             FROM jobs WHERE id = ?1",
            [id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, url, job_type, status, started_at, completed_at)) = row else {
        return Ok(None);
    };
    let job_type = JobType::parse(&job_type)
        .ok_or_else(|| anyhow::anyhow!("unknown job type in store: {job_type}"))?;
    let status = JobStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("unknown job status in store: {status}"))?;
    Ok(Some(Job { id, url, job_type, status, started_at, completed_at }))
}

pub fn mark_processing(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'processing', started_at = ?2 WHERE id = ?1",
        rusqlite::params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn mark_completed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'completed', completed_at = ?2 WHERE id = ?1",
        rusqlite::params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn mark_failed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE jobs SET status = 'failed', completed_at = ?2 WHERE id = ?1",
        rusqlite::params![id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Append-only failure record; exactly one row per failed attempt.
pub fn insert_error(
    conn: &Connection,
    job_id: i64,
    error_type: &str,
    message: &str,
    stack: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO error_log (job_id, error_type, error_message, stack_trace)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![job_id, error_type, message, stack],
    )?;
    Ok(())
}

// ── Queue ──

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub job_id: i64,
    pub attempts: i64,
}

pub fn enqueue(conn: &Connection, job_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO queue (job_id, available_at) VALUES (?1, ?2)",
        rusqlite::params![job_id, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn enqueue_all(conn: &Connection, job_ids: &[i64]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO queue (job_id, available_at) VALUES (?1, ?2)")?;
        let now = Utc::now().to_rfc3339();
        for id in job_ids {
            stmt.execute(rusqlite::params![id, now])?;
        }
    }
    tx.commit()?;
    Ok(job_ids.len())
}

/// Pull a bounded batch, locking each message for `visibility_secs`. A
/// message whose handler never acks or retries becomes visible again when
/// the lock expires; delivery is at-least-once.
pub fn pull_batch(conn: &Connection, max: usize, visibility_secs: i64) -> Result<Vec<Message>> {
    let now = Utc::now();
    let locked_until = (now + Duration::seconds(visibility_secs)).to_rfc3339();
    let now = now.to_rfc3339();

    let mut stmt = conn.prepare(
        "UPDATE queue SET locked_until = ?1
         WHERE id IN (
             SELECT id FROM queue
             WHERE available_at <= ?2
               AND (locked_until IS NULL OR locked_until <= ?2)
             ORDER BY id
             LIMIT ?3
         )
         RETURNING id, job_id, attempts",
    )?;
    let messages = stmt
        .query_map(rusqlite::params![locked_until, now, max as i64], |row| {
            Ok(Message { id: row.get(0)?, job_id: row.get(1)?, attempts: row.get(2)? })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}

pub fn ack(conn: &Connection, message_id: i64) -> Result<()> {
    conn.execute("DELETE FROM queue WHERE id = ?1", [message_id])?;
    Ok(())
}

/// Schedule redelivery with backoff. Returns false when the message has
/// exhausted `max_attempts` and was dropped instead (the job row stays
/// failed; nothing retries it further).
pub fn retry(
    conn: &Connection,
    message: &Message,
    backoff_secs: i64,
    max_attempts: i64,
) -> Result<bool> {
    if message.attempts + 1 >= max_attempts {
        conn.execute("DELETE FROM queue WHERE id = ?1", [message.id])?;
        return Ok(false);
    }
    let available_at = (Utc::now() + Duration::seconds(backoff_secs)).to_rfc3339();
    conn.execute(
        "UPDATE queue SET attempts = attempts + 1, locked_until = NULL, available_at = ?2
         WHERE id = ?1",
        rusqlite::params![message.id, available_at],
    )?;
    Ok(true)
}

pub fn queue_depth(conn: &Connection) -> Result<usize> {
    Ok(conn.query_row("SELECT COUNT(*) FROM queue", [], |r| r.get(0))?)
}

// ── Catalog sink ──

/// Idempotent program upsert keyed on name. Requirement clauses are
/// replaced wholesale so redelivered jobs cannot duplicate them. Returns
/// None when the payload fails validation (blank name).
pub fn upsert_program_with_requirements(
    conn: &Connection,
    program: &ProgramRecord,
    requirements: &[RequirementSection],
) -> Result<Option<i64>> {
    if program.name.trim().is_empty() {
        return Ok(None);
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO programs (name, level, school, program_url)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             level = excluded.level,
             school = excluded.school,
             program_url = excluded.program_url",
        rusqlite::params![
            program.name,
            program.level.as_str(),
            program.school,
            program.program_url,
        ],
    )?;
    let id: i64 = tx.query_row(
        "SELECT id FROM programs WHERE name = ?1",
        [&program.name],
        |r| r.get(0),
    )?;

    tx.execute("DELETE FROM program_requirements WHERE program_id = ?1", [id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO program_requirements
                 (program_id, section, kind, courses, credits_required)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for section in requirements {
            if section.clauses.is_empty() {
                // Keep empty requirement groups visible to consumers.
                stmt.execute(rusqlite::params![
                    id,
                    section.name,
                    ClauseKind::Required.as_str(),
                    "[]",
                    Option::<f64>::None,
                ])?;
                continue;
            }
            for clause in &section.clauses {
                stmt.execute(rusqlite::params![
                    id,
                    section.name,
                    clause.kind.as_str(),
                    serde_json::to_string(&clause.courses)?,
                    clause.credits_required,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(Some(id))
}

/// Idempotent course upsert keyed on code; prerequisite clauses replaced
/// wholesale. Returns None on validation failure (blank code or title).
pub fn upsert_course_with_prerequisites(
    conn: &Connection,
    course: &CourseRecord,
    prerequisites: &[Clause],
) -> Result<Option<i64>> {
    if course.code.trim().is_empty() || course.title.trim().is_empty() {
        return Ok(None);
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO courses
             (code, program, level, title, credits, description, course_url, school)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(code) DO UPDATE SET
             program = excluded.program,
             level = excluded.level,
             title = excluded.title,
             credits = excluded.credits,
             description = excluded.description,
             course_url = excluded.course_url,
             school = excluded.school",
        rusqlite::params![
            course.code,
            course.program,
            course.level.as_str(),
            course.title,
            course.credits,
            course.description,
            course.course_url,
            course.school,
        ],
    )?;
    let id: i64 =
        tx.query_row("SELECT id FROM courses WHERE code = ?1", [&course.code], |r| r.get(0))?;

    tx.execute("DELETE FROM course_prerequisites WHERE course_id = ?1", [id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO course_prerequisites (course_id, kind, courses, credits_required)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for clause in prerequisites {
            stmt.execute(rusqlite::params![
                id,
                clause.kind.as_str(),
                serde_json::to_string(&clause.courses)?,
                clause.credits_required,
            ])?;
        }
    }
    tx.commit()?;
    Ok(Some(id))
}

// ── Page cache ──

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub job_id: i64,
    pub job_type: JobType,
    pub url: String,
    pub html: String,
}

pub fn cache_page(conn: &Connection, job_id: i64, url: &str, html: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO page_cache (job_id, url, html, fetched_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(url) DO UPDATE SET
             job_id = excluded.job_id,
             html = excluded.html,
             fetched_at = excluded.fetched_at",
        rusqlite::params![job_id, url, html, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Cached program/course pages for offline re-parsing.
pub fn fetch_cached_pages(conn: &Connection, limit: Option<usize>) -> Result<Vec<CachedPage>> {
    let sql = format!(
        "SELECT pc.job_id, j.job_type, pc.url, pc.html
         FROM page_cache pc
         JOIN jobs j ON j.id = pc.job_id
         WHERE j.job_type IN ('program', 'course')
         ORDER BY pc.id{}",
        match limit {
            Some(n) => format!(" LIMIT {n}"),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let pages = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    pages
        .into_iter()
        .map(|(job_id, job_type, url, html)| {
            let job_type = JobType::parse(&job_type)
                .ok_or_else(|| anyhow::anyhow!("unknown job type in store: {job_type}"))?;
            Ok(CachedPage { job_id, job_type, url, html })
        })
        .collect()
}

// ── Stats ──

pub struct Stats {
    pub jobs_total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub queued: usize,
    pub errors: usize,
    pub programs: usize,
    pub courses: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        Ok(conn.query_row(sql, [], |r| r.get(0))?)
    };
    Ok(Stats {
        jobs_total: count("SELECT COUNT(*) FROM jobs")?,
        pending: count("SELECT COUNT(*) FROM jobs WHERE status = 'pending'")?,
        processing: count("SELECT COUNT(*) FROM jobs WHERE status = 'processing'")?,
        completed: count("SELECT COUNT(*) FROM jobs WHERE status = 'completed'")?,
        failed: count("SELECT COUNT(*) FROM jobs WHERE status = 'failed'")?,
        queued: count("SELECT COUNT(*) FROM queue")?,
        errors: count("SELECT COUNT(*) FROM error_log")?,
        programs: count("SELECT COUNT(*) FROM programs")?,
        courses: count("SELECT COUNT(*) FROM courses")?,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn course(code: &str, credits: Option<i64>) -> CourseRecord {
        CourseRecord {
            program: "CSCI-UA".into(),
            code: code.into(),
            level: Level::Undergraduate,
            title: "Intro to Computer Science".into(),
            credits,
            description: "desc".into(),
            course_url: "https://example.edu/c".into(),
            school: "College of Arts and Science".into(),
        }
    }

    #[test]
    fn insert_jobs_dedups_and_returns_new_ids() {
        let conn = mem();
        let urls = vec!["https://a".to_string(), "https://b".to_string()];
        let ids = insert_jobs(&conn, JobType::Course, &urls).unwrap();
        assert_eq!(ids.len(), 2);

        // Same urls again: nothing new.
        let again = insert_jobs(&conn, JobType::Course, &urls).unwrap();
        assert!(again.is_empty());

        // Same url under a different type is a distinct job.
        let other = insert_jobs(&conn, JobType::Program, &urls[..1].to_vec()).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn job_lifecycle_columns() {
        let conn = mem();
        let ids = insert_jobs(&conn, JobType::Program, &["https://p".to_string()]).unwrap();
        let id = ids[0];

        let job = get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());

        mark_processing(&conn, id).unwrap();
        let job = get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());

        mark_completed(&conn, id).unwrap();
        let job = get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());

        assert!(get_job(&conn, 99_999).unwrap().is_none());
    }

    #[test]
    fn queue_pull_respects_visibility() {
        let conn = mem();
        let ids = insert_jobs(&conn, JobType::Course, &["https://c".to_string()]).unwrap();
        enqueue(&conn, ids[0]).unwrap();

        let batch = pull_batch(&conn, 10, 300).unwrap();
        assert_eq!(batch.len(), 1);

        // Locked: a second pull sees nothing.
        assert!(pull_batch(&conn, 10, 300).unwrap().is_empty());

        // Expired lock: visible again.
        conn.execute(
            "UPDATE queue SET locked_until = ?1",
            [(Utc::now() - Duration::seconds(1)).to_rfc3339()],
        )
        .unwrap();
        assert_eq!(pull_batch(&conn, 10, 300).unwrap().len(), 1);
    }

    #[test]
    fn retry_backs_off_then_drops() {
        let conn = mem();
        let ids = insert_jobs(&conn, JobType::Course, &["https://c".to_string()]).unwrap();
        enqueue(&conn, ids[0]).unwrap();

        let msg = pull_batch(&conn, 1, 300).unwrap().remove(0);
        assert!(retry(&conn, &msg, 0, 3).unwrap());
        let msg = pull_batch(&conn, 1, 300).unwrap().remove(0);
        assert_eq!(msg.attempts, 1);
        assert!(retry(&conn, &msg, 0, 3).unwrap());

        // Third attempt exhausts the budget: message dropped.
        let msg = pull_batch(&conn, 1, 300).unwrap().remove(0);
        assert!(!retry(&conn, &msg, 0, 3).unwrap());
        assert_eq!(queue_depth(&conn).unwrap(), 0);
    }

    #[test]
    fn ack_removes_message() {
        let conn = mem();
        let ids = insert_jobs(&conn, JobType::Course, &["https://c".to_string()]).unwrap();
        enqueue(&conn, ids[0]).unwrap();
        let msg = pull_batch(&conn, 1, 300).unwrap().remove(0);
        ack(&conn, msg.id).unwrap();
        assert_eq!(queue_depth(&conn).unwrap(), 0);
    }

    #[test]
    fn course_upsert_is_idempotent_by_code() {
        let conn = mem();
        let first = upsert_course_with_prerequisites(&conn, &course("CSCI-UA 101", Some(4)), &[])
            .unwrap()
            .unwrap();
        let second = upsert_course_with_prerequisites(&conn, &course("CSCI-UA 101", Some(2)), &[])
            .unwrap()
            .unwrap();
        assert_eq!(first, second);

        let (count, credits): (usize, i64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(credits) FROM courses WHERE code = 'CSCI-UA 101'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(credits, 2);
    }

    #[test]
    fn course_prerequisites_replaced_not_duplicated() {
        let conn = mem();
        let clause = Clause {
            kind: ClauseKind::Alternative,
            courses: vec!["CSCI-UA 101".into(), "CSCI-UA 102".into()],
            credits_required: None,
        };
        let rec = course("CSCI-UA 310", Some(4));
        upsert_course_with_prerequisites(&conn, &rec, std::slice::from_ref(&clause)).unwrap();
        upsert_course_with_prerequisites(&conn, &rec, std::slice::from_ref(&clause)).unwrap();

        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM course_prerequisites", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn blank_identity_rejected() {
        let conn = mem();
        assert!(upsert_course_with_prerequisites(&conn, &course("", Some(4)), &[])
            .unwrap()
            .is_none());

        let program = ProgramRecord {
            name: "  ".into(),
            level: Level::Undergraduate,
            school: "College of Arts and Science".into(),
            program_url: "https://example.edu/p".into(),
        };
        assert!(upsert_program_with_requirements(&conn, &program, &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn program_upsert_keeps_empty_sections() {
        let conn = mem();
        let program = ProgramRecord {
            name: "Computer Science (BA)".into(),
            level: Level::Undergraduate,
            school: "College of Arts and Science".into(),
            program_url: "https://example.edu/cs".into(),
        };
        let sections = vec![RequirementSection { name: "Summary".into(), clauses: vec![] }];
        let id = upsert_program_with_requirements(&conn, &program, &sections)
            .unwrap()
            .unwrap();

        let (kind, courses): (String, String) = conn
            .query_row(
                "SELECT kind, courses FROM program_requirements WHERE program_id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "required");
        assert_eq!(courses, "[]");
    }

    #[test]
    fn page_cache_roundtrip() {
        let conn = mem();
        let ids = insert_jobs(&conn, JobType::Course, &["https://c".to_string()]).unwrap();
        cache_page(&conn, ids[0], "https://c", "<html>1</html>").unwrap();
        cache_page(&conn, ids[0], "https://c", "<html>2</html>").unwrap();

        let pages = fetch_cached_pages(&conn, None).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].html, "<html>2</html>");
        assert_eq!(pages[0].job_type, JobType::Course);
    }
}
