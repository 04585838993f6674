//! HTTP surface of the portal: admin project management and dashboards,
//! supplier login and bid submission, spreadsheet export, and the
//! Markdown → Word endpoint.
//!
//! The server owns its own tokio runtime and runs as a [`LoopService`]
//! polling a oneshot for the serve future's exit, so it participates in
//! the same stop/join scheme as every other service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::codes;
use crate::config::Config;
use crate::deadline;
use crate::docgen::{self, DocRequest, SharedImageFetcher};
use crate::export;
use crate::ledger::{
    self, Attachment, BidRequest, Product, Project, ProjectId, Standing, SubmitError,
    SubmitOutcome, Summary,
};
use crate::session::{Principal, SharedSessionStore};
use crate::stagnation;
use crate::store::SharedProjectStore;

use super::LoopService;

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone)]
pub struct AppState {
    pub store: SharedProjectStore,
    pub sessions: SharedSessionStore,
    pub fetcher: SharedImageFetcher,
    pub config: Arc<Config>,
}

pub struct HttpService {
    // cancels all server tasks on drop
    _runtime: Runtime,
    server_rx: oneshot::Receiver<Result<()>>,
}

impl HttpService {
    pub fn new(state: AppState) -> Result<Self> {
        let runtime = Runtime::new()?;
        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            let res = run_http_server(state).await.context("http server failed");
            // the receiver polling from run_iteration may itself be gone
            let _ = tx.send(res);
        });

        Ok(Self {
            _runtime: runtime,
            server_rx: rx,
        })
    }
}

impl LoopService for HttpService {
    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(std::time::Duration::from_millis(100));

        match self.server_rx.try_recv() {
            Ok(res) => res,
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                bail!("http server died without reporting a result")
            }
        }
    }
}

async fn run_http_server(state: AppState) -> Result<()> {
    let listen_addr = state.config.listen_addr.clone();
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("bad listen address {listen_addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/admin/login", post(admin_login))
        .route(
            "/api/admin/projects",
            post(create_project).get(list_projects),
        )
        .route(
            "/api/admin/projects/:id",
            get(project_dashboard).delete(delete_project),
        )
        .route("/api/admin/projects/:id/export", get(export_project))
        .route("/api/login", post(supplier_login))
        .route("/api/logout", post(logout))
        .route("/api/board", get(supplier_board))
        .route("/api/bids", post(submit_bid))
        .route("/api/docs/render", post(render_document))
        .with_state(state)
}

pub enum ApiError {
    Unauthorized,
    NotFound(&'static str),
    Invalid(String),
    Closed,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
        }
        let (status, error) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Invalid(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Closed => (StatusCode::CONFLICT, "bidding already closed".to_owned()),
            Self::Internal(err) => {
                warn!(%err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                )
            }
        };
        let mut response = Json(ErrorBody { error }).into_response();
        *response.status_mut() = status;
        response
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    match bearer(headers).and_then(|token| state.sessions.resolve(token)) {
        Some(Principal::Admin) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

fn require_supplier(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(ProjectId, String), ApiError> {
    match bearer(headers).and_then(|token| state.sessions.resolve(token)) {
        Some(Principal::Supplier {
            project_id,
            supplier,
        }) => Ok((project_id, supplier)),
        _ => Err(ApiError::Unauthorized),
    }
}

fn attachment_response(filename: &str, content_type: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct AdminLoginRequest {
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if req.password != state.config.admin_password {
        return Err(ApiError::Unauthorized);
    }
    let token = state.sessions.issue(Principal::Admin);
    Ok(Json(TokenResponse { token }))
}

#[derive(Deserialize)]
struct ProductSpec {
    name: String,
    quantity: u64,
    /// Datasheet / drawing for suppliers to download.
    #[serde(default)]
    attachment: Option<UploadedFile>,
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    name: String,
    deadline: String,
    #[serde(default)]
    products: Vec<ProductSpec>,
    #[serde(default)]
    suppliers: Vec<String>,
}

#[derive(Serialize)]
struct CreatedProjectResponse {
    id: ProjectId,
    name: String,
    deadline: DateTime<Utc>,
    /// supplier -> issued access code, for the admin to hand out
    access_codes: std::collections::BTreeMap<String, String>,
}

async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<CreatedProjectResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("project name is empty".to_owned()));
    }
    let parsed_deadline =
        deadline::parse_deadline(&req.deadline).map_err(|e| ApiError::Invalid(e.to_string()))?;

    let now = Utc::now();
    let mut project = Project::new(name, parsed_deadline, now);
    for spec in req.products {
        let product_name = spec.name.trim().to_owned();
        if product_name.is_empty() {
            return Err(ApiError::Invalid("product name is empty".to_owned()));
        }
        if spec.quantity == 0 {
            return Err(ApiError::Invalid(format!(
                "product {product_name:?} has zero quantity"
            )));
        }
        let mut product = Product::new(product_name, spec.quantity);
        product.attachment = spec.attachment.map(decode_upload).transpose()?;
        project.add_product(product);
    }
    project.access_codes = codes::issue_codes(req.suppliers.iter().map(|s| s.trim().to_owned()));

    let response = CreatedProjectResponse {
        id: project.id.clone(),
        name: project.name.clone(),
        deadline: project.deadline,
        access_codes: project.access_codes.clone(),
    };
    debug!(id = %project.id, name = %project.name, "project created");
    state.store.insert(project)?;
    Ok(Json(response))
}

#[derive(Serialize)]
struct ProjectListEntry {
    id: ProjectId,
    name: String,
    deadline: DateTime<Utc>,
    closed: bool,
    product_count: usize,
    supplier_count: usize,
}

async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProjectListEntry>>, ApiError> {
    require_admin(&state, &headers)?;
    let now = Utc::now();
    let entries = state
        .store
        .list()?
        .into_iter()
        .map(|p| ProjectListEntry {
            closed: p.is_closed(now),
            product_count: p.products.len(),
            supplier_count: p.access_codes.len(),
            id: p.id,
            name: p.name,
            deadline: p.deadline,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Serialize)]
struct ProductView {
    name: String,
    requested_quantity: u64,
    bid_count: usize,
    has_attachment: bool,
    rank: Vec<Standing>,
    summary: Option<Summary>,
    best_supplier_changed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct DashboardResponse {
    id: ProjectId,
    name: String,
    deadline: DateTime<Utc>,
    closed: bool,
    stagnation_warning: bool,
    products: Vec<ProductView>,
}

fn dashboard_view(project: &Project, now: DateTime<Utc>) -> DashboardResponse {
    DashboardResponse {
        id: project.id.clone(),
        name: project.name.clone(),
        deadline: project.deadline,
        closed: project.is_closed(now),
        stagnation_warning: stagnation::should_warn(project, now),
        products: project
            .products
            .values()
            .map(|p| ProductView {
                name: p.name.clone(),
                requested_quantity: p.requested_quantity,
                bid_count: p.bids.len(),
                has_attachment: p.attachment.is_some(),
                rank: ledger::rank(p),
                summary: ledger::summary(p),
                best_supplier_changed_at: p.best_supplier_changed_at,
            })
            .collect(),
    }
}

async fn project_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DashboardResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let project = state.store.get(&id)?.ok_or(ApiError::NotFound("project"))?;
    Ok(Json(dashboard_view(&project, Utc::now())))
}

async fn delete_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    match state.store.remove(&id)? {
        Some(project) => {
            info!(id = %project.id, name = %project.name, "project deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound("project")),
    }
}

async fn export_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let project = state.store.get(&id)?.ok_or(ApiError::NotFound("project"))?;
    let filename = format!("{}.xlsx", project.id);
    let bytes = tokio::task::spawn_blocking(move || export::to_xlsx(&project))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;
    Ok(attachment_response(&filename, XLSX_MIME, bytes))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer(&headers) {
        state.sessions.revoke(token);
    }
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct SupplierLoginRequest {
    supplier: String,
    code: String,
}

#[derive(Serialize)]
struct SupplierTokenResponse {
    token: String,
    project_id: ProjectId,
}

async fn supplier_login(
    State(state): State<AppState>,
    Json(req): Json<SupplierLoginRequest>,
) -> Result<Json<SupplierTokenResponse>, ApiError> {
    // linear scan over every project's access codes
    let project_id = state
        .store
        .find_supplier(req.supplier.trim(), req.code.trim())?
        .ok_or(ApiError::Unauthorized)?;
    let token = state.sessions.issue(Principal::Supplier {
        project_id: project_id.clone(),
        supplier: req.supplier.trim().to_owned(),
    });
    Ok(Json(SupplierTokenResponse { token, project_id }))
}

async fn supplier_board(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, ApiError> {
    let (project_id, _) = require_supplier(&state, &headers)?;
    // the identity is only valid while its project exists
    let project = state
        .store
        .get(&project_id)?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(dashboard_view(&project, Utc::now())))
}

#[derive(Deserialize)]
struct UploadedFile {
    filename: String,
    content_base64: String,
}

#[derive(Deserialize)]
struct SubmitBidRequest {
    product: String,
    unit_price: u64,
    #[serde(default)]
    remark: Option<String>,
    #[serde(default)]
    attachment: Option<UploadedFile>,
}

#[derive(Serialize)]
struct SubmitBidResponse {
    outcome: &'static str,
}

fn decode_upload(upload: UploadedFile) -> Result<Attachment, ApiError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(upload.content_base64.as_bytes())
        .map_err(|_| ApiError::Invalid("attachment is not valid base64".to_owned()))?;
    Ok(Attachment::new(upload.filename, bytes))
}

async fn submit_bid(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitBidRequest>,
) -> Result<Json<SubmitBidResponse>, ApiError> {
    let (project_id, supplier) = require_supplier(&state, &headers)?;

    let attachment = req.attachment.map(decode_upload).transpose()?;
    let remark = req
        .remark
        .map(|r| r.trim().to_owned())
        .filter(|r| !r.is_empty());
    let mut request = Some(BidRequest {
        unit_price: req.unit_price,
        remark,
        attachment,
    });

    let now = Utc::now();
    let mut outcome = None;
    state.store.update(&project_id, &mut |project| {
        if let Some(bid) = request.take() {
            outcome = Some(project.submit_bid(&req.product, &supplier, bid, now));
        }
    })?;

    match outcome {
        Some(Ok(SubmitOutcome::Accepted)) => {
            debug!(%project_id, %supplier, product = %req.product, "bid accepted");
            Ok(Json(SubmitBidResponse {
                outcome: "accepted",
            }))
        }
        Some(Ok(SubmitOutcome::Suppressed)) => Ok(Json(SubmitBidResponse {
            outcome: "suppressed",
        })),
        Some(Err(SubmitError::Closed)) => Err(ApiError::Closed),
        Some(Err(err)) => Err(ApiError::Invalid(err.to_string())),
        // the project disappeared under the session
        None => Err(ApiError::Unauthorized),
    }
}

#[derive(Deserialize)]
struct RenderDocumentRequest {
    markdown: String,
    #[serde(default)]
    background_base64: Option<String>,
}

async fn render_document(
    State(state): State<AppState>,
    Json(req): Json<RenderDocumentRequest>,
) -> Result<Response, ApiError> {
    let background = req
        .background_base64
        .map(|b64| {
            base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .map_err(|_| ApiError::Invalid("background is not valid base64".to_owned()))
        })
        .transpose()?;

    let images = docgen::fetch_images(state.fetcher.as_ref(), &req.markdown).await;
    let doc = DocRequest {
        markdown: req.markdown,
        background,
    };
    let bytes = tokio::task::spawn_blocking(move || docgen::render(&doc, &images))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|err| match err {
            docgen::RenderError::Background(msg) => ApiError::Invalid(msg),
            other => ApiError::Internal(anyhow::Error::new(other)),
        })?;
    Ok(attachment_response("document.docx", DOCX_MIME, bytes))
}
