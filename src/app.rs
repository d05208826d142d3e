use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::changes::CellChange;
use crate::config::AppConfig;
use crate::downloader;
use crate::error::ForecastError;
use crate::history::{CalendarContext, VersionHistoryEntry};
use crate::layout;
use crate::saving;
use crate::summary;
use crate::validator::{EditOutcome, RawChange};
use crate::workbook::{SaveOutcome, Workbook};

pub struct AppState {
    workbook: Mutex<Workbook>,
}

impl AppState {
    pub fn new(workbook: Workbook) -> Self {
        Self {
            workbook: Mutex::new(workbook),
        }
    }

    // A panic mid-request must not lock everyone out of the workbook
    fn workbook(&self) -> MutexGuard<'_, Workbook> {
        self.workbook.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Error body returned by every failing endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

pub struct ApiError(ForecastError);

impl From<ForecastError> for ApiError {
    fn from(e: ForecastError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ForecastError::NotEditing | ForecastError::EditInProgress(_) => StatusCode::CONFLICT,
            ForecastError::EditOnReadOnlyVersion { .. } => StatusCode::FORBIDDEN,
            ForecastError::UnknownVersion(_) => StatusCode::NOT_FOUND,
            ForecastError::MalformedSnapshot(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self.0);
        }
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct CellUpdate {
    row: usize,
    col: usize,
    value: String,
    /// Value shown before the edit, restored if the edit is refused.
    previous: Option<String>,
}

#[derive(Serialize)]
struct CellResponse {
    outcome: EditOutcome,
    grid: serde_json::Value,
}

#[derive(Serialize)]
struct SaveResponse {
    status: String,
    version: String,
    entry: Option<VersionHistoryEntry>,
}

#[derive(Serialize)]
struct VersionInfo {
    id: String,
    latest: bool,
    current: bool,
}

fn grid_json(workbook: &Workbook) -> serde_json::Value {
    serde_json::json!({
        "version": workbook.current_version(),
        "editing": workbook.is_editing(),
        "editable": workbook.is_latest(),
        "rows": workbook.grid().rows(),
    })
}

/// Builds the router over an already opened workbook.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/grid", get(get_grid))
        .route("/api/headers", get(get_headers))
        .route("/api/versions", get(list_versions))
        .route("/api/versions/:id/view", post(view_version))
        .route("/api/history/:version", get(get_history))
        .route("/api/edit/begin", post(begin_edit))
        .route("/api/edit/cell", post(update_cell))
        .route("/api/edit/batch", post(update_batch))
        .route("/api/edit/pending", get(pending_changes))
        .route("/api/edit/save", post(save_edit))
        .route("/api/edit/cancel", post(cancel_edit))
        .route("/api/summary", get(get_summary))
        .route("/api/summary/countries/:month", get(get_country_summary))
        .route("/api/export.csv", get(export_csv))
        .route("/api/export.xlsx", get(export_xlsx))
        .route("/api/export.bin.gz", get(export_snapshot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = config.open_store()?;
    let workbook = Workbook::open(store, config.hierarchy.clone())?;
    let app = router(Arc::new(AppState::new(workbook)));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn get_grid(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workbook = state.workbook();
    Json(grid_json(&workbook))
}

async fn get_headers() -> impl IntoResponse {
    Json(layout::column_headers())
}

async fn list_versions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workbook = state.workbook();
    let versions: Vec<VersionInfo> = workbook
        .versions()
        .ids()
        .into_iter()
        .map(|id| VersionInfo {
            id: id.to_string(),
            latest: workbook.versions().is_latest(id),
            current: id == workbook.current_version(),
        })
        .collect();
    Json(versions)
}

async fn view_version(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let mut workbook = state.workbook();
    workbook.view_version(&id)?;
    Ok(Json(grid_json(&workbook)))
}

async fn get_history(
    Path(version): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let workbook = state.workbook();
    let entries: Vec<VersionHistoryEntry> = workbook
        .history_for(&version)
        .into_iter()
        .cloned()
        .collect();
    Json(entries)
}

async fn begin_edit(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let mut workbook = state.workbook();
    workbook.begin_edit()?;
    Ok(Json(grid_json(&workbook)))
}

async fn update_cell(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CellUpdate>,
) -> ApiResult<impl IntoResponse> {
    let mut workbook = state.workbook();
    let outcome = workbook.apply_edit_with_previous(
        payload.row,
        payload.col,
        &payload.value,
        payload.previous.as_deref(),
    )?;
    Ok(Json(CellResponse {
        outcome,
        grid: grid_json(&workbook),
    }))
}

async fn update_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Vec<CellUpdate>>,
) -> ApiResult<impl IntoResponse> {
    let mut workbook = state.workbook();
    let changes: Vec<RawChange> = payload
        .into_iter()
        .map(|u| {
            let old = u
                .previous
                .or_else(|| workbook.grid().cell(u.row, u.col).map(str::to_string))
                .unwrap_or_default();
            RawChange::new(u.row, u.col, old, u.value)
        })
        .collect();
    let outcomes = workbook.apply_changes(&changes)?;
    Ok(Json(serde_json::json!({
        "outcomes": outcomes,
        "grid": grid_json(&workbook),
    })))
}

async fn pending_changes(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let workbook = state.workbook();
    let changes: Vec<CellChange> = workbook.pending_changes()?;
    Ok(Json(changes))
}

async fn save_edit(
    State(state): State<Arc<AppState>>,
    calendar: Option<Json<CalendarContext>>,
) -> ApiResult<impl IntoResponse> {
    let calendar = calendar
        .map(|Json(c)| c)
        .unwrap_or_else(CalendarContext::today);
    let mut workbook = state.workbook();
    let response = match workbook.save(&calendar)? {
        SaveOutcome::Unchanged => SaveResponse {
            status: "unchanged".to_string(),
            version: workbook.current_version().to_string(),
            entry: None,
        },
        SaveOutcome::Saved { version, entry } => SaveResponse {
            status: "saved".to_string(),
            version,
            entry: Some(entry),
        },
    };
    Ok(Json(response))
}

async fn cancel_edit(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let mut workbook = state.workbook();
    workbook.cancel_edit()?;
    Ok(Json(grid_json(&workbook)))
}

async fn get_summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workbook = state.workbook();
    Json(summary::monthly_forecast(workbook.grid()))
}

async fn get_country_summary(
    Path(month): Path<usize>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let workbook = state.workbook();
    Json(summary::country_forecast(workbook.grid(), month))
}

fn attachment(content_type: &'static str, filename: String, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Bytes::from(body),
    )
        .into_response()
}

async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workbook = state.workbook();
    let csv = downloader::to_csv(workbook.grid());
    let filename = format!("forecast-{}.csv", workbook.current_version());
    attachment("text/csv", filename, csv.into_bytes())
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let workbook = state.workbook();
    match downloader::to_xlsx(workbook.grid()) {
        Ok(buffer) => attachment(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            format!("forecast-{}.xlsx", workbook.current_version()),
            buffer,
        ),
        Err(e) => {
            error!("xlsx export failed: {e}");
            let body = ErrorResponse {
                status: "error".to_string(),
                message: e.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn export_snapshot(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let workbook = state.workbook();
    let buffer = saving::encode_rows(&workbook.grid().to_rows())?;
    Ok(attachment(
        "application/gzip",
        format!("{}.bin.gz", workbook.current_version()),
        buffer,
    ))
}
