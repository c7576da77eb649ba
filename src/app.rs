use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::admin::{self, AdminAccount};
use crate::config::Config;
use crate::downloader::{export_sheets, to_xlsx};
use crate::matcher::{AnnotatedCell, TermCounts};
use crate::render::cell_html;
use crate::saving;
use crate::search::{SearchOutcome, search};
use crate::store::FileStore;
use crate::upload::{UploadedFile, apply_batch, extract_batch};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const EXPORT_FILENAME: &str = "search_results.xlsx";
const SNAPSHOT_FILENAME: &str = "store.bin.gz";
const IP_PLACEHOLDER: &str = "Unable to fetch";

pub struct AppState {
    pub store: Mutex<FileStore>,
    pub store_path: PathBuf,
    pub admin: Option<AdminAccount>,
}

impl AppState {
    pub fn new(store: FileStore, store_path: PathBuf, admin: Option<AdminAccount>) -> Self {
        AppState {
            store: Mutex::new(store),
            store_path,
            admin,
        }
    }

    fn store(&self) -> MutexGuard<'_, FileStore> {
        self.store.lock().unwrap_or_else(|p| p.into_inner())
    }

    // the slot is a cache: a failed write is logged, the in-memory store stays current
    fn persist(&self, store: &FileStore) {
        if let Err(e) = saving::save_store(store, &self.store_path) {
            log::error!("failed to persist store: {}", e);
        }
    }
}

/// JSON body of every non-data answer
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        StatusResponse {
            status: "ok".to_string(),
            message: None,
        }
    }

    pub fn error(code: StatusCode, message: &str) -> Response {
        (
            code,
            Json(StatusResponse {
                status: "error".to_string(),
                message: Some(message.to_string()),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct FileSummary {
    name: String,
    uploaded_at: DateTime<Utc>,
    rows: usize,
}

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<FileSummary>,
    last_upload: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct CellView<'a> {
    #[serde(flatten)]
    cell: &'a AnnotatedCell,
    html: String,
}

#[derive(Serialize)]
struct MatchView<'a> {
    serial_number: usize,
    row_index: usize,
    cells: Vec<CellView<'a>>,
}

#[derive(Serialize)]
struct FileResultView<'a> {
    file_name: &'a str,
    headers: &'a [String],
    matches: Vec<MatchView<'a>>,
}

#[derive(Serialize)]
struct SearchResponse<'a> {
    results: Vec<FileResultView<'a>>,
    total_matches: usize,
    term_counts: &'a TermCounts,
    searched_files: usize,
    last_upload: Option<DateTime<Utc>>,
}

impl<'a> SearchResponse<'a> {
    fn new(outcome: &'a SearchOutcome, last_upload: Option<DateTime<Utc>>) -> Self {
        let results = outcome
            .results
            .iter()
            .map(|result| FileResultView {
                file_name: &result.file_name,
                headers: &result.headers,
                matches: result
                    .matches
                    .iter()
                    .map(|m| MatchView {
                        serial_number: m.serial_number,
                        row_index: m.row_index,
                        cells: m
                            .cells
                            .iter()
                            .map(|cell| CellView {
                                cell,
                                html: cell_html(cell),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        SearchResponse {
            results,
            total_matches: outcome.total_matches,
            term_counts: &outcome.term_counts,
            searched_files: outcome.searched_files,
            last_upload,
        }
    }
}

#[derive(Serialize)]
struct ClientInfo {
    client_ip: String,
    server_ip: String,
    page_loaded: DateTime<Utc>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route(
            "/api/files",
            get(list_files)
                .merge(post(upload_files).route_layer(middleware::from_fn(admin::require_admin))),
        )
        .route(
            "/api/files/:name",
            delete(delete_file).route_layer(middleware::from_fn(admin::require_admin)),
        )
        .route(
            "/api/snapshot",
            get(download_snapshot)
                .post(restore_snapshot)
                .route_layer(middleware::from_fn(admin::require_admin)),
        )
        .route("/api/search", get(search_files))
        .route("/api/export", get(export_results))
        .route("/api/client", get(client_info))
        .route("/admin/login", post(admin::handle_login))
        .route("/admin/logout", post(admin::handle_logout))
        .route(
            "/admin/session",
            get(admin::handle_session).route_layer(middleware::from_fn(admin::require_admin)),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = config.store_path();
    let store = saving::load_store(&store_path);
    log::info!("loaded {} stored files from {}", store.len(), store_path.display());

    let admin = admin::init_admin(
        &config.admin_path(),
        config.admin_username.as_deref(),
        config.admin_password.as_deref(),
    )?;

    let app_state = Arc::new(AppState::new(store, store_path, admin));
    let app = router(app_state);

    let listener = TcpListener::bind(&config.addr).await?;
    log::info!("Listening on http://{}", config.addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn list_files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store();
    let files = store
        .list()
        .iter()
        .map(|f| FileSummary {
            name: f.name.clone(),
            uploaded_at: f.uploaded_at,
            rows: f.row_count(),
        })
        .collect();

    Json(FilesResponse {
        files,
        last_upload: store.last_upload(),
    })
}

async fn upload_files(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut files = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return StatusResponse::error(StatusCode::BAD_REQUEST, &e.to_string()),
        };
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        match field.bytes().await {
            Ok(bytes) => files.push(UploadedFile::new(name, bytes.to_vec())),
            Err(e) => return StatusResponse::error(StatusCode::BAD_REQUEST, &e.to_string()),
        }
    }

    if files.is_empty() {
        return StatusResponse::error(StatusCode::BAD_REQUEST, "No file data received");
    }

    // every file is read before the store is touched
    let extracted = extract_batch(files).await;

    let mut store = state.store();
    let statuses = apply_batch(&mut store, extracted);
    state.persist(&store);

    Json(statuses).into_response()
}

async fn delete_file(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let mut store = state.store();
    if !store.delete(&name) {
        return StatusResponse::error(StatusCode::NOT_FOUND, &format!("No file named '{}'", name));
    }
    state.persist(&store);
    Json(StatusResponse::ok()).into_response()
}

async fn search_files(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let store = state.store();
    let outcome = search(store.list(), &params.q);
    Json(SearchResponse::new(&outcome, store.last_upload())).into_response()
}

async fn export_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Response {
    let outcome = {
        let store = state.store();
        search(store.list(), &params.q)
    };

    match to_xlsx(&export_sheets(&outcome)) {
        Ok(Some(buffer)) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
                ),
            ],
            Bytes::from(buffer),
        )
            .into_response(),
        Ok(None) => Json(StatusResponse {
            status: "empty".to_string(),
            message: Some("No results to export.".to_string()),
        })
        .into_response(),
        Err(e) => StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn download_snapshot(State(state): State<Arc<AppState>>) -> Response {
    let result = {
        let store = state.store();
        saving::snapshot_to_bytes(&store)
    };

    match result {
        Ok(buffer) => (
            [
                (header::CONTENT_TYPE, "application/gzip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", SNAPSHOT_FILENAME),
                ),
            ],
            Bytes::from(buffer),
        )
            .into_response(),
        Err(e) => StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn restore_snapshot(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut file_data = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return StatusResponse::error(StatusCode::BAD_REQUEST, &e.to_string()),
        };
        if field.name() != Some("snapshot") {
            continue;
        }
        match field.bytes().await {
            Ok(bytes) => file_data = bytes.to_vec(),
            Err(e) => return StatusResponse::error(StatusCode::BAD_REQUEST, &e.to_string()),
        }
    }

    if file_data.is_empty() {
        return StatusResponse::error(StatusCode::BAD_REQUEST, "No file data received");
    }

    match saving::snapshot_from_bytes(&file_data) {
        Ok(restored) => {
            let mut store = state.store();
            *store = restored;
            state.persist(&store);
            log::info!("restored snapshot with {} files", store.len());
            Json(StatusResponse::ok()).into_response()
        }
        Err(e) => StatusResponse::error(
            StatusCode::BAD_REQUEST,
            &format!("Failed to load snapshot: {}", e),
        ),
    }
}

async fn client_info(connect: Option<ConnectInfo<SocketAddr>>) -> impl IntoResponse {
    let client_ip = connect
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| IP_PLACEHOLDER.to_string());
    let server_ip = local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|e| {
            log::debug!("local ip lookup failed: {}", e);
            IP_PLACEHOLDER.to_string()
        });

    Json(ClientInfo {
        client_ip,
        server_ip,
        page_loaded: Utc::now(),
    })
}
