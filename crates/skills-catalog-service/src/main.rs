use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use skills_catalog_api::{CatalogApi, ListParams, RecommendParams};
use skills_catalog_core::{CatalogError, Skill, SkillDraft, StoreInfo};
use skills_catalog_store_sqlite::SqliteCatalog;

const DEFAULT_DB_PATH: &str = "./skills_catalog.sqlite3";
const DB_ENV_VAR: &str = "CATALOG_DB";
const INDEX_HTML: &str = include_str!("../ui/index.html");
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: CatalogApi<SqliteCatalog>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct ApiError(CatalogError);

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            CatalogError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            CatalogError::NotFound(id) => {
                (StatusCode::NOT_FOUND, format!("no skill with id {id}"))
            }
            // Storage detail stays in the log; the caller gets a generic message.
            CatalogError::Storage(detail) => {
                tracing::error!("storage failure: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure".to_string())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Parser)]
#[command(name = "skills-catalog-service")]
#[command(about = "HTTP service for the assistant skills catalog")]
struct Args {
    /// Database file path; falls back to $CATALOG_DB, then a local file.
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/__dbinfo", get(db_info))
        .route("/api/v1/openapi", get(openapi))
        .route("/api/v1/items", post(create_item).get(list_items))
        .route("/api/v1/items/seed_demo", post(seed_demo))
        .route("/api/v1/items/:id", get(get_item).delete(delete_item))
        .route("/api/v1/recommend", get(recommend_items))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let db_path = resolve_db_path(args.db);
    let state = ServiceState { api: CatalogApi::open_sqlite(db_path.clone()) };

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!("serving skills catalog from {} on {}", db_path.display(), args.bind);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn resolve_db_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os(DB_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

async fn home() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "text/html; charset=utf-8")], INDEX_HTML)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn db_info(State(state): State<ServiceState>) -> Result<Json<StoreInfo>, ApiError> {
    Ok(Json(state.api.info()?))
}

async fn create_item(
    State(state): State<ServiceState>,
    Json(draft): Json<SkillDraft>,
) -> Result<(StatusCode, Json<Skill>), ApiError> {
    let skill = state.api.create(draft)?;
    Ok((StatusCode::CREATED, Json(skill)))
}

async fn list_items(
    State(state): State<ServiceState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Skill>>, ApiError> {
    Ok(Json(state.api.list(params)?))
}

async fn get_item(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
) -> Result<Json<Skill>, ApiError> {
    Ok(Json(state.api.get(id)?))
}

async fn delete_item(
    State(state): State<ServiceState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let _ = state.api.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn seed_demo(
    State(state): State<ServiceState>,
) -> Result<(StatusCode, Json<Vec<Skill>>), ApiError> {
    let outcome = state.api.seed_demo()?;
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.skills)))
}

async fn recommend_items(
    State(state): State<ServiceState>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<Vec<Skill>>, ApiError> {
    Ok(Json(state.api.recommend(params)?))
}
