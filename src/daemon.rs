use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::accounts::{AccountService, Role, UserRecord};
use crate::config::Config;
use crate::error::{Result, ValetBotError};
use crate::interfaces::providers::KnowledgeProvider;
use crate::memory::MemoryStore;
use crate::providers::wikipedia::WikipediaProvider;
use crate::services::query::{self, QueryService};

const ALL_ROLES: &[Role] = &[Role::MasterAdmin, Role::Admin, Role::User];
const ADMIN_ROLES: &[Role] = &[Role::MasterAdmin, Role::Admin];

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub query: Arc<QueryService>,
    pub bot_name: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    role: Role,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    role: Role,
}

#[derive(Serialize)]
struct WishResponse {
    text: String,
}

#[derive(Deserialize)]
struct CommandRequest {
    query: String,
}

#[derive(Deserialize)]
struct MakeAdminRequest {
    username: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/wish", get(wish))
        .route("/command", post(command))
        .route("/reminders/due", get(due_reminders))
        .route("/admin/users", get(admin_users))
        .route("/admin/make-admin", post(make_admin))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Response {
    match state
        .accounts
        .register(&payload.username, &payload.password)
        .await
    {
        Ok(role) => (StatusCode::OK, Json(RegisterResponse { role })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Response {
    match state
        .accounts
        .login(&payload.username, &payload.password)
        .await
    {
        Ok(grant) => (
            StatusCode::OK,
            Json(LoginResponse {
                token: grant.token,
                role: grant.role,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn wish(State(state): State<AppState>) -> Json<WishResponse> {
    Json(WishResponse {
        text: query::wish(&state.bot_name),
    })
}

async fn command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CommandRequest>,
) -> Response {
    let session = match state
        .accounts
        .authorize(&bearer_token(&headers), ALL_ROLES)
        .await
    {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    match state.query.interpret(&session.username, &payload.query).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn due_reminders(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match state
        .accounts
        .authorize(&bearer_token(&headers), ALL_ROLES)
        .await
    {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    match state.query.due_reminders(&session.username).await {
        Ok(due) => (StatusCode::OK, Json(due)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn admin_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(err) = state
        .accounts
        .authorize(&bearer_token(&headers), ADMIN_ROLES)
        .await
    {
        return error_response(err);
    }
    match state.accounts.list_users().await {
        Ok(listing) => {
            (StatusCode::OK, Json::<BTreeMap<String, UserRecord>>(listing)).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn make_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MakeAdminRequest>,
) -> Response {
    let caller = match state
        .accounts
        .authorize(&bearer_token(&headers), &[Role::MasterAdmin])
        .await
    {
        Ok(session) => session,
        Err(err) => return error_response(err),
    };
    match state.accounts.elevate(&caller, &payload.username).await {
        Ok(role) => (StatusCode::OK, Json(RegisterResponse { role })).into_response(),
        Err(err) => error_response(err),
    }
}

fn bearer_token(headers: &HeaderMap) -> String {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("");

    if !bearer.is_empty() {
        bearer.to_string()
    } else {
        api_key.to_string()
    }
}

fn error_response(err: ValetBotError) -> Response {
    let status = match &err {
        ValetBotError::Validation(_) => StatusCode::BAD_REQUEST,
        ValetBotError::Auth => StatusCode::UNAUTHORIZED,
        ValetBotError::Forbidden(_) => StatusCode::FORBIDDEN,
        ValetBotError::NotFound(_) => StatusCode::NOT_FOUND,
        ValetBotError::Conflict(_) => StatusCode::CONFLICT,
        ValetBotError::Provider(_) => StatusCode::BAD_GATEWAY,
        ValetBotError::Serialization(_) | ValetBotError::Runtime(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

pub async fn build_state(db_path: &str, config: &Config) -> Result<AppState> {
    let memory = Arc::new(MemoryStore::new(db_path).await?);
    let accounts = Arc::new(
        AccountService::new(db_path, memory.clone(), config.token_ttl_seconds()).await?,
    );
    let knowledge: Arc<dyn KnowledgeProvider> = match config
        .knowledge
        .as_ref()
        .and_then(|knowledge| knowledge.base_url.clone())
    {
        Some(base_url) => Arc::new(WikipediaProvider::new(base_url)),
        None => Arc::new(WikipediaProvider::default()),
    };
    let query = Arc::new(QueryService::new(memory, knowledge));
    Ok(AppState {
        accounts,
        query,
        bot_name: config.bot_name().to_string(),
    })
}

pub async fn run(host: &str, port: u16, db_path: &str, config: Config) -> Result<()> {
    run_with_shutdown(host, port, db_path, config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    db_path: &str,
    config: Config,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = build_state(db_path, &config).await?;
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "valet-botd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ValetBotError::Runtime(e.to_string()))?;

    Ok(())
}
