use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use server_api::{
    fetch_board, list_comments, post_comment, reset_board, save_board, ApiContext,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{BoardRecord, CommentRecord, NewCommentRequest, ResetResponse, SaveBoardRequest},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;
mod session;

use config::{load_settings, prepare_database_url};
use session::{mint_token, session_from_bearer, SessionConfig, SessionUser};

/// Ranking subject assumed when the caller does not name one.
const DEFAULT_CLASSMATE_NAME: &str = "Default";
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    session: SessionConfig,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    user_id: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoardQuery {
    classmate_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentsQuery {
    tier_id: Option<String>,
    classmate_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        session: SessionConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route(
            "/api/tierlist",
            get(http_fetch_board)
                .post(http_save_board)
                .delete(http_reset_board),
        )
        .route(
            "/api/comments",
            get(http_list_comments).post(http_post_comment),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(reject(ApiError::new(
            ErrorCode::Validation,
            "username is required",
        )));
    }

    let user_id = state
        .api
        .storage
        .create_user(username)
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    let token = mint_token(&state.session, user_id, username)
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;

    Ok(Json(LoginResponse {
        user_id: user_id.0,
        token,
    }))
}

async fn http_fetch_board(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoardQuery>,
    headers: HeaderMap,
) -> Result<Json<BoardRecord>, (StatusCode, Json<ApiError>)> {
    let owner = optional_session(&state, &headers).map(|session| session.user_id);
    let classmate_name = q
        .classmate_name
        .unwrap_or_else(|| DEFAULT_CLASSMATE_NAME.to_string());
    let record = fetch_board(&state.api, &classmate_name, owner)
        .await
        .map_err(reject)?;
    Ok(Json(record))
}

async fn http_save_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SaveBoardRequest>,
) -> Result<Json<BoardRecord>, (StatusCode, Json<ApiError>)> {
    let owner = optional_session(&state, &headers).map(|session| session.user_id);
    let classmate_name = req
        .classmate_name
        .unwrap_or_else(|| DEFAULT_CLASSMATE_NAME.to_string());
    let record = save_board(
        &state.api,
        &classmate_name,
        owner,
        &req.board,
        req.seq.unwrap_or(0),
    )
    .await
    .map_err(reject)?;
    Ok(Json(record))
}

async fn http_reset_board(
    State(state): State<Arc<AppState>>,
    Query(q): Query<BoardQuery>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ApiError>)> {
    let owner = optional_session(&state, &headers).map(|session| session.user_id);
    let classmate_name = q
        .classmate_name
        .unwrap_or_else(|| DEFAULT_CLASSMATE_NAME.to_string());
    reset_board(&state.api, &classmate_name, owner)
        .await
        .map_err(reject)?;
    Ok(Json(ResetResponse { success: true }))
}

async fn http_list_comments(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CommentsQuery>,
) -> Result<Json<Vec<CommentRecord>>, (StatusCode, Json<ApiError>)> {
    let comments = list_comments(
        &state.api,
        q.tier_id.as_deref().unwrap_or(""),
        q.classmate_name.as_deref().unwrap_or(""),
    )
    .await
    .map_err(reject)?;
    Ok(Json(comments))
}

async fn http_post_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewCommentRequest>,
) -> Result<Json<CommentRecord>, (StatusCode, Json<ApiError>)> {
    let Some(session) = optional_session(&state, &headers) else {
        return Err(reject(ApiError::new(
            ErrorCode::Unauthorized,
            "sign in to post comments",
        )));
    };

    let created = post_comment(
        &state.api,
        session.user_id,
        &req.tier_id,
        &req.classmate_name,
        &req.text,
    )
    .await
    .map_err(reject)?;
    Ok(Json(created))
}

fn optional_session(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    session_from_bearer(&state.session, header)
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
