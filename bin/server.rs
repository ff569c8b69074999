// TCG Tracker - Web Server
// Thin HTTP layer over the core operations, with axum

use anyhow::{Context, Result};
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tcg_tracker::{
    add_card, delete_card, export_csv, export_filename, overview, update_price, Config, Overview,
    SortKey, Store, TrackerError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    history_limit: usize,
}

impl AppState {
    fn store(&self) -> Result<MutexGuard<'_, Store>, StatusCode> {
        self.store.lock().map_err(|_| {
            log::error!("Store mutex poisoned");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

#[derive(Deserialize, Default)]
struct OverviewParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    sort: String,
}

#[derive(Deserialize)]
struct AddCardForm {
    name: String,
    price: f64,
    card_code: String,
}

#[derive(Deserialize)]
struct UpdatePriceForm {
    new_price: f64,
}

/// Back to the overview page, carrying the error code if any
fn redirect_home(error: Option<&TrackerError>) -> Response {
    match error {
        Some(e) => Redirect::to(&format!("/?error={}", urlencoding::encode(e.code()))).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

/// Validation errors go back to the page; storage failures are 500s
fn mutation_response<T>(result: tcg_tracker::Result<T>, action: &str) -> Response {
    match result {
        Ok(_) => redirect_home(None),
        Err(e) if e.is_validation() => redirect_home(Some(&e)),
        Err(e) => {
            log::error!("Error in {}: {}", action, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(e.to_string()))).into_response()
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/overview - Cards, trends and dashboard
async fn get_overview(
    State(state): State<AppState>,
    Query(params): Query<OverviewParams>,
) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(status) => return status.into_response(),
    };

    let sort = SortKey::parse(&params.sort);
    match overview(&store, &params.q, sort, state.history_limit) {
        Ok(view) => (StatusCode::OK, Json(ApiResponse::<Overview>::ok(view))).into_response(),
        Err(e) => {
            log::error!("Error building overview: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(e.to_string()))).into_response()
        }
    }
}

/// POST /add-card
async fn post_add_card(State(state): State<AppState>, Form(form): Form<AddCardForm>) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(status) => return status.into_response(),
    };
    mutation_response(add_card(&mut store, &form.name, form.price, &form.card_code), "add-card")
}

/// POST /update-price/:card_id
async fn post_update_price(
    State(state): State<AppState>,
    Path(card_id): Path<i64>,
    Form(form): Form<UpdatePriceForm>,
) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(status) => return status.into_response(),
    };
    mutation_response(update_price(&mut store, card_id, form.new_price), "update-price")
}

/// POST /delete-card/:card_id
async fn post_delete_card(State(state): State<AppState>, Path(card_id): Path<i64>) -> Response {
    let mut store = match state.store() {
        Ok(store) => store,
        Err(status) => return status.into_response(),
    };
    mutation_response(delete_card(&mut store, card_id), "delete-card")
}

/// GET /export-csv - Download the collection
async fn get_export(State(state): State<AppState>) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(status) => return status.into_response(),
    };

    match export_csv(&store) {
        Ok(body) => {
            let filename = export_filename(chrono::Local::now());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            log::error!("Error exporting cards: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::err(e.to_string()))).into_response()
        }
    }
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

fn build_router(state: AppState, static_dir: &std::path::Path) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/overview", get(get_overview))
        .with_state(state.clone());

    Router::new()
        .route("/", get(serve_index))
        .route("/add-card", post(post_add_card))
        .route("/update-price/:card_id", post(post_update_price))
        .route("/delete-card/:card_id", post(post_delete_card))
        .route("/export-csv", get(get_export))
        .with_state(state)
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting TCG Tracker web server v{}", tcg_tracker::VERSION);

    let config = Config::from_env()?;
    let store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        history_limit: config.history_limit,
    };
    let app = build_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    log::info!("Server running on http://{}", config.bind_addr);
    log::info!("Serving static files from {}", config.static_dir.display());

    axum::serve(listener, app).await.context("Server stopped")?;
    Ok(())
}
