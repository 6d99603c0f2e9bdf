use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::{self, Db};
use crate::jobs::JobType;
use crate::scrape::BULLETIN_ORIGIN;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerResponse {
    job_id: i64,
    job_type: String,
}

/// Internal failures surface as plain 500s; the body never echoes SQL or
/// paths back to the caller.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {:#}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Missing key and wrong key are distinct failures: the first is an
/// unauthenticated request, the second a bad credential.
async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match req.headers().get(API_KEY_HEADER) {
        None => (StatusCode::UNAUTHORIZED, "missing api key").into_response(),
        Some(v) if v.as_bytes() == state.api_key.as_bytes() => next.run(req).await,
        Some(_) => (StatusCode::FORBIDDEN, "invalid api key").into_response(),
    }
}

/// Idempotent trigger: the discovery job row is reused if it exists, and a
/// fresh queue message is enqueued either way.
pub fn trigger_discovery(db: &Db, job_type: JobType, root_url: &str) -> anyhow::Result<i64> {
    let conn = db.lock().unwrap();
    let id = match db::find_job_id(&conn, job_type, root_url)? {
        Some(id) => id,
        None => {
            let ids = db::insert_jobs(&conn, job_type, &[root_url.to_string()])?;
            ids[0]
        }
    };
    db::enqueue(&conn, id)?;
    info!("triggered {} job {}", job_type, id);
    Ok(id)
}

pub fn program_root() -> String {
    format!("{BULLETIN_ORIGIN}/")
}

pub fn course_root() -> String {
    format!("{BULLETIN_ORIGIN}/courses/")
}

async fn trigger_majors(State(state): State<AppState>) -> Result<Json<TriggerResponse>, AppError> {
    let id = trigger_discovery(&state.db, JobType::DiscoverPrograms, &program_root())?;
    Ok(Json(TriggerResponse {
        job_id: id,
        job_type: JobType::DiscoverPrograms.as_str().to_string(),
    }))
}

async fn trigger_courses(State(state): State<AppState>) -> Result<Json<TriggerResponse>, AppError> {
    let id = trigger_discovery(&state.db, JobType::DiscoverCourses, &course_root())?;
    Ok(Json(TriggerResponse {
        job_id: id,
        job_type: JobType::DiscoverCourses.as_str().to_string(),
    }))
}

async fn health() -> &'static str {
    "ok"
}

/// Extension point for periodic discovery. Ticked from the serve loop;
/// intentionally does nothing yet.
pub fn scheduled() {
    tracing::debug!("scheduled tick");
}

const SCHEDULED_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/majors", post(trigger_majors))
        .route("/api/courses", post(trigger_courses))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/api/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCHEDULED_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            scheduled();
        }
    });

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Tests ──
