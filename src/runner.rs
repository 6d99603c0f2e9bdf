use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::db::{self, Clause, CourseRecord, Db};
use crate::jobs::{Job, JobError, JobType};
use crate::queue::{JobRunner, RunReport};
use crate::scrape;

/// Maps each job type onto its fetch/parse/sink pipeline. One dispatcher is
/// shared by every worker task; it holds only cheaply clonable handles.
pub struct Dispatcher {
    client: reqwest::Client,
    db: Db,
}

impl Dispatcher {
    pub fn new(db: Db) -> Result<Self> {
        Ok(Dispatcher { client: scrape::client()?, db })
    }

    async fn discover_programs(&self, job: &Job) -> Result<RunReport> {
        let urls = scrape::discover::discover_programs(&self.client, &job.url).await?;
        let conn = self.db.lock().unwrap();
        let enqueued = fan_out(&conn, JobType::Program, &urls)?;
        info!("discovered {} program urls, {} new", urls.len(), enqueued);
        Ok(RunReport { enqueued, upserted: 0 })
    }

    async fn discover_courses(&self, job: &Job) -> Result<RunReport> {
        let urls = scrape::discover::discover_courses(&self.client, &job.url).await?;
        let conn = self.db.lock().unwrap();
        let enqueued = fan_out(&conn, JobType::Course, &urls)?;
        info!("discovered {} course urls, {} new", urls.len(), enqueued);
        Ok(RunReport { enqueued, upserted: 0 })
    }

    async fn scrape_program(&self, job: &Job) -> Result<RunReport> {
        let (page, record, requirements) =
            scrape::program::scrape_program_page(&self.client, &job.url).await?;
        let conn = self.db.lock().unwrap();
        if !page.is_empty() {
            db::cache_page(&conn, job.id, &job.url, &page)?;
        }
        let id = db::upsert_program_with_requirements(&conn, &record, &requirements)?;
        if id.is_none() {
            anyhow::bail!(JobError::validation(format!(
                "program record for {} rejected by sink",
                job.url
            )));
        }
        Ok(RunReport { enqueued: 0, upserted: 1 })
    }

    async fn scrape_course(&self, job: &Job) -> Result<RunReport> {
        let (page, records) = scrape::course::scrape_course_page(&self.client, &job.url).await?;
        let conn = self.db.lock().unwrap();
        db::cache_page(&conn, job.id, &job.url, &page)?;
        let upserted = sink_courses(&conn, &job.url, &records)?;
        Ok(RunReport { enqueued: 0, upserted })
    }
}

/// Push scraped course records through the sink. A record the sink rejects
/// is a hard validation failure for the whole job, not a silent skip.
fn sink_courses(
    conn: &Connection,
    page_url: &str,
    records: &[(CourseRecord, Vec<Clause>)],
) -> Result<usize> {
    let mut upserted = 0;
    for (record, prerequisites) in records {
        match db::upsert_course_with_prerequisites(conn, record, prerequisites)? {
            Some(_) => upserted += 1,
            None => anyhow::bail!(JobError::validation(format!(
                "course record {:?} from {} rejected by sink",
                record.code, page_url
            ))),
        }
    }
    Ok(upserted)
}

impl JobRunner for Dispatcher {
    async fn run(&self, job: Job) -> Result<RunReport> {
        match job.job_type {
            JobType::DiscoverPrograms => self.discover_programs(&job).await,
            JobType::DiscoverCourses => self.discover_courses(&job).await,
            JobType::Program => self.scrape_program(&job).await,
            JobType::Course => self.scrape_course(&job).await,
        }
    }
}

/// Create a job plus one queue message for every url not already known
/// under this type. Re-discovered urls are left alone.
pub fn fan_out(conn: &Connection, job_type: JobType, urls: &[String]) -> Result<usize> {
    let ids = db::insert_jobs(conn, job_type, urls)?;
    db::enqueue_all(conn, &ids)?;
    Ok(ids.len())
}

// ── Tests ──
