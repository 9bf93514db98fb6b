//! HTTP transport
//!
//! ## Endpoints
//!
//! - `POST /v1/authorize` - Authorize a batch of resource accesses
//! - `POST /v1/users`, `POST /v1/roles`, `POST /v1/policies` - Admin creation
//! - `PUT /v1/roles/:role_id/description`, `DELETE /v1/roles/:role_id`
//! - `PUT /v1/policies/:policy_id/description`, `DELETE /v1/policies/:policy_id`
//! - `PUT|DELETE /v1/users/:user_id/roles/:role_id`
//! - `PUT|DELETE /v1/users/:user_id/policies/:policy_id`
//! - `PUT|DELETE /v1/roles/:role_id/policies/:policy_id`
//! - `GET /v1/users`, `GET /v1/roles`, `GET /v1/policies` - Listings (`offset`, `limit`, `search`)
//! - `GET /v1/users/:user_id`, `GET /v1/roles/:role_id`, `GET /v1/policies/:policy_id`
//! - `GET /v1/users/:user_id/roles`, `GET /v1/users/:user_id/policies`
//! - `GET /v1/roles/:role_id/users`, `GET /v1/roles/:role_id/policies`
//! - `GET /v1/policies/:policy_id/entities` - Users and roles holding the policy
//! - `GET /health` - Health check
//!
//! The caller is identified by the configured user id header; every request
//! runs in a span carrying its request id, which is echoed back in the
//! response headers. Users are addressed by their external id.

use crate::admin::AdminService;
use crate::config::ServerConfig;
use crate::context::RbacContext;
use crate::error::AuthzError;
use crate::read::EntityReadService;
use crate::service::AuthorizationService;
use crate::store::RbacStore;
use crate::types::{
    AuthRequest, AuthResponse, Id, ListPayload, NewPolicy, NewRole, NewUser, Page, Policy, Role,
    Subject, User,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request, State,
    },
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{debug, error, info_span, warn, Instrument, Level};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RbacStore>,
    authorization: Arc<AuthorizationService>,
    admin: Arc<AdminService>,
    read: Arc<EntityReadService>,
    user_id_header: HeaderName,
    request_id_header: HeaderName,
    start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn RbacStore>, config: &ServerConfig) -> crate::Result<Self> {
        Ok(Self {
            authorization: Arc::new(AuthorizationService::new(store.clone())),
            admin: Arc::new(AdminService::new(store.clone())),
            read: Arc::new(EntityReadService::new(store.clone())),
            store,
            user_id_header: parse_header(&config.user_id_header)?,
            request_id_header: parse_header(&config.request_id_header)?,
            start_time: Instant::now(),
        })
    }
}

fn parse_header(name: &str) -> crate::Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AuthzError::InvalidInput(format!("invalid header name {:?}: {}", name, e)))
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error: an [`AuthzError`] rendered as an HTTP response
#[derive(Debug)]
pub struct AppError(AuthzError);

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(AuthzError::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError(AuthzError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError(AuthzError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self.0 {
            AuthzError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthzError::NotAuthenticated(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthzError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AuthzError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AuthzError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AuthzError::DatabaseError(msg) => {
                error!("store failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "backing store unavailable".to_string(),
                )
            }
            AuthzError::Internal(msg) => {
                error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };
        if status.is_client_error() {
            warn!(status = status.as_u16(), "rejected request: {}", message);
        }

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

/// JSON body extractor whose rejections render as [`AppError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameter extractor whose rejections render as [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string extractor whose rejections render as [`AppError`]
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

type ApiResult<T> = std::result::Result<T, AppError>;

/// Description update body
#[derive(Debug, Deserialize)]
struct DescriptionUpdate {
    description: String,
}

/// Listing query string
#[derive(Debug, Deserialize)]
struct ListQuery {
    offset: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
}

impl ListQuery {
    fn page(&self) -> Page {
        let default = Page::default();
        Page::new(self.offset.unwrap_or(default.offset), self.limit.unwrap_or(default.limit))
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

fn header_value(request: &Request, name: &HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the caller and attach an [`RbacContext`] to the request
async fn context_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let request_id = header_value(&request, &state.request_id_header).unwrap_or_default();
    let user_id = header_value(&request, &state.user_id_header);

    let mut ctx = RbacContext::new(request_id, user_id.clone());
    let span = info_span!(
        "request",
        request_id = %ctx.request_id(),
        user_id = user_id.as_deref().unwrap_or("-")
    );

    if let Some(user_id) = &user_id {
        match state.store.get_user(user_id).instrument(span.clone()).await {
            Ok(Some(user)) => ctx = ctx.with_user(user),
            Ok(None) => debug!(parent: &span, "no user registered for {}", user_id),
            Err(e) => return span.in_scope(|| AppError(e).into_response()),
        }
    }

    let request_id = HeaderValue::from_str(ctx.request_id()).ok();
    request.extensions_mut().insert(ctx);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = request_id {
        response.headers_mut().insert(state.request_id_header.clone(), value);
    }
    response
}

/// POST /v1/authorize
async fn authorize(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppJson(request): AppJson<AuthRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = state.authorization.authorize(&ctx, request).await?;
    Ok(Json(response))
}

/// POST /v1/users
async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppJson(user): AppJson<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.admin.create_user(&ctx, user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /v1/roles
async fn create_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppJson(role): AppJson<NewRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    let role = state.admin.create_role(&ctx, role).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /v1/roles/:role_id/description
async fn update_role_description(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(role_id): AppPath<Id>,
    AppJson(update): AppJson<DescriptionUpdate>,
) -> ApiResult<Json<Role>> {
    let role = state
        .admin
        .update_role_description(&ctx, role_id, &update.description)
        .await?;
    Ok(Json(role))
}

/// DELETE /v1/roles/:role_id
async fn delete_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(role_id): AppPath<Id>,
) -> ApiResult<StatusCode> {
    state.admin.delete_role(&ctx, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/policies
async fn create_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppJson(policy): AppJson<NewPolicy>,
) -> ApiResult<(StatusCode, Json<Policy>)> {
    let policy = state.admin.create_policy(&ctx, policy).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

/// PUT /v1/policies/:policy_id/description
async fn update_policy_description(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(policy_id): AppPath<Id>,
    AppJson(update): AppJson<DescriptionUpdate>,
) -> ApiResult<Json<Policy>> {
    let policy = state
        .admin
        .update_policy_description(&ctx, policy_id, &update.description)
        .await?;
    Ok(Json(policy))
}

/// DELETE /v1/policies/:policy_id
async fn delete_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(policy_id): AppPath<Id>,
) -> ApiResult<StatusCode> {
    state.admin.delete_policy(&ctx, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/users/:user_id/roles/:role_id
async fn assign_role_to_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((user_id, role_id)): AppPath<(String, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.assign_role_to_user(&ctx, &user_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/users/:user_id/roles/:role_id
async fn unassign_role_from_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((user_id, role_id)): AppPath<(String, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.unassign_role_from_user(&ctx, &user_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/users/:user_id/policies/:policy_id
async fn assign_policy_to_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((user_id, policy_id)): AppPath<(String, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.assign_policy_to_user(&ctx, &user_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/users/:user_id/policies/:policy_id
async fn unassign_policy_from_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((user_id, policy_id)): AppPath<(String, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.unassign_policy_from_user(&ctx, &user_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/roles/:role_id/policies/:policy_id
async fn assign_policy_to_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((role_id, policy_id)): AppPath<(Id, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.assign_policy_to_role(&ctx, role_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/roles/:role_id/policies/:policy_id
async fn unassign_policy_from_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath((role_id, policy_id)): AppPath<(Id, Id)>,
) -> ApiResult<StatusCode> {
    state.admin.unassign_policy_from_role(&ctx, role_id, policy_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/users/:user_id
async fn get_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(user_id): AppPath<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.read.get_user(&ctx, &user_id).await?))
}

/// GET /v1/users
async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<User>>> {
    let users = state.read.list_users(&ctx, query.search.as_deref(), query.page()).await?;
    Ok(Json(users))
}

/// GET /v1/users/:user_id/roles
async fn list_user_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(user_id): AppPath<String>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Role>>> {
    Ok(Json(state.read.list_user_roles(&ctx, &user_id, query.page()).await?))
}

/// GET /v1/users/:user_id/policies
async fn list_user_policies(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(user_id): AppPath<String>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Policy>>> {
    Ok(Json(state.read.list_user_policies(&ctx, &user_id, query.page()).await?))
}

/// GET /v1/roles/:role_id
async fn get_role(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(role_id): AppPath<Id>,
) -> ApiResult<Json<Role>> {
    Ok(Json(state.read.get_role(&ctx, role_id).await?))
}

/// GET /v1/roles
async fn list_roles(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Role>>> {
    let roles = state.read.list_roles(&ctx, query.search.as_deref(), query.page()).await?;
    Ok(Json(roles))
}

/// GET /v1/roles/:role_id/users
async fn list_role_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(role_id): AppPath<Id>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<User>>> {
    Ok(Json(state.read.list_role_users(&ctx, role_id, query.page()).await?))
}

/// GET /v1/roles/:role_id/policies
async fn list_role_policies(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(role_id): AppPath<Id>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Policy>>> {
    Ok(Json(state.read.list_role_policies(&ctx, role_id, query.page()).await?))
}

/// GET /v1/policies/:policy_id
async fn get_policy(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(policy_id): AppPath<Id>,
) -> ApiResult<Json<Policy>> {
    Ok(Json(state.read.get_policy(&ctx, policy_id).await?))
}

/// GET /v1/policies
async fn list_policies(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Policy>>> {
    let policies = state.read.list_policies(&ctx, query.search.as_deref(), query.page()).await?;
    Ok(Json(policies))
}

/// GET /v1/policies/:policy_id/entities
async fn list_policy_entities(
    State(state): State<AppState>,
    Extension(ctx): Extension<RbacContext>,
    AppPath(policy_id): AppPath<Id>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<Json<ListPayload<Subject>>> {
    Ok(Json(state.read.list_policy_entities(&ctx, policy_id, query.page()).await?))
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: crate::VERSION.to_string(),
    })
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([state.request_id_header.clone()]);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/authorize", post(authorize))
        .route("/v1/users", get(list_users).post(create_user))
        .route("/v1/users/:user_id", get(get_user))
        .route("/v1/users/:user_id/roles", get(list_user_roles))
        .route("/v1/users/:user_id/policies", get(list_user_policies))
        .route("/v1/roles", get(list_roles).post(create_role))
        .route("/v1/roles/:role_id", get(get_role).delete(delete_role))
        .route("/v1/roles/:role_id/description", put(update_role_description))
        .route("/v1/roles/:role_id/users", get(list_role_users))
        .route("/v1/roles/:role_id/policies", get(list_role_policies))
        .route("/v1/policies", get(list_policies).post(create_policy))
        .route("/v1/policies/:policy_id", get(get_policy).delete(delete_policy))
        .route("/v1/policies/:policy_id/description", put(update_policy_description))
        .route("/v1/policies/:policy_id/entities", get(list_policy_entities))
        .route(
            "/v1/users/:user_id/roles/:role_id",
            put(assign_role_to_user).delete(unassign_role_from_user),
        )
        .route(
            "/v1/users/:user_id/policies/:policy_id",
            put(assign_policy_to_user).delete(unassign_policy_from_user),
        )
        .route(
            "/v1/roles/:role_id/policies/:policy_id",
            put(assign_policy_to_role).delete(unassign_policy_from_role),
        )
        .route("/health", get(health_check))
        .layer(middleware::from_fn_with_state(state.clone(), context_middleware))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}
