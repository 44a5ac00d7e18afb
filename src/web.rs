//! Axum-based JSON API consumed by the browser dashboard

use crate::appliance::Appliance;
use crate::dashboard::Dashboard;
use crate::error::AgileViewError;
use crate::series::Region;
use crate::session::GraphKind;
use crate::sync::Direction;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Mutex<Dashboard>>,
}

#[derive(Deserialize)]
pub struct RegionBody {
    pub region: String,
}

#[derive(Deserialize)]
pub struct GraphBody {
    pub graph: GraphKind,
}

#[derive(Deserialize)]
pub struct NavigateBody {
    pub direction: Direction,
}

#[derive(Deserialize)]
pub struct ApplianceBody {
    pub name: String,
    pub power_w: u32,
    pub hours: u32,
    pub minutes: u32,
}

#[derive(Serialize)]
struct RegionEntry {
    code: Region,
    name: &'static str,
}

/// Map a failed operation to an HTTP response
fn error_response(err: &AgileViewError) -> Response {
    let status = match err {
        AgileViewError::Validation { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        crate::logging::get_logger("web").error(&format!("Request failed: {}", err));
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

pub(crate) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn regions() -> impl IntoResponse {
    let list: Vec<RegionEntry> = Region::ALL
        .into_iter()
        .map(|code| RegionEntry {
            code,
            name: code.name(),
        })
        .collect();
    Json(list)
}

pub(crate) async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    let dash = state.dashboard.lock().await;
    Json(dash.session().snapshot())
}

/// Reply with the session after a change together with the reloaded graph
async fn reload(dash: &mut Dashboard, direction: Direction) -> Response {
    match dash.load(direction).await {
        Ok(graph) => Json(serde_json::json!({
            "session": dash.session().snapshot(),
            "graph": graph,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) async fn set_region(
    State(state): State<AppState>,
    Json(body): Json<RegionBody>,
) -> Response {
    let region = match body.region.parse::<Region>() {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };
    let mut dash = state.dashboard.lock().await;
    dash.session_mut().set_region(region);
    reload(&mut dash, Direction::Right).await
}

pub(crate) async fn set_graph(
    State(state): State<AppState>,
    Json(body): Json<GraphBody>,
) -> Response {
    let mut dash = state.dashboard.lock().await;
    dash.session_mut().set_graph(body.graph);
    reload(&mut dash, Direction::Right).await
}

pub(crate) async fn navigate(
    State(state): State<AppState>,
    Json(body): Json<NavigateBody>,
) -> Response {
    let mut dash = state.dashboard.lock().await;
    match dash.navigate(body.direction).await {
        Ok(graph) => Json(serde_json::json!({
            "session": dash.session().snapshot(),
            "graph": graph,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) async fn graph(State(state): State<AppState>) -> Response {
    let mut dash = state.dashboard.lock().await;
    match dash.load(Direction::Right).await {
        Ok(graph) => Json(graph).into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) async fn list_appliances(State(state): State<AppState>) -> Response {
    let mut dash = state.dashboard.lock().await;
    match dash.estimate_appliances().await {
        Ok(estimates) => Json(serde_json::json!({
            "appliances": dash.appliances(),
            "estimates": estimates,
            "next_available": dash.session().next_available(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) async fn add_appliance(
    State(state): State<AppState>,
    Json(body): Json<ApplianceBody>,
) -> Response {
    let appliance = match Appliance::new(&body.name, body.power_w, body.hours, body.minutes) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };
    let mut dash = state.dashboard.lock().await;
    match dash.add_appliance(appliance.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(appliance)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub(crate) async fn remove_appliance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    let mut dash = state.dashboard.lock().await;
    if dash.remove_appliance(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/regions", get(regions))
        .route("/api/session", get(get_session))
        .route("/api/session/region", post(set_region))
        .route("/api/session/graph", post(set_graph))
        .route("/api/session/navigate", post(navigate))
        .route("/api/graph", get(graph))
        .route("/api/appliances", get(list_appliances).post(add_appliance))
        .route("/api/appliances/{id}", delete(remove_appliance))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(dashboard: Arc<Mutex<Dashboard>>, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(AppState { dashboard });

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AgileViewError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router).await?;
    Ok(())
}
