use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    auth::AuthRequest, transactions::TransactionServiceRequest, users::UserRequest, ServiceError,
};

mod auth;
mod transactions;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub auth_channel: mpsc::Sender<AuthRequest>,
    pub user_channel: mpsc::Sender<UserRequest>,
    pub transaction_channel: mpsc::Sender<TransactionServiceRequest>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/register", post(auth::register))
        .route("/auth/register/resend", post(auth::resend_otp))
        .route("/auth/register/reset", post(auth::reset_password))
        .route("/auth/register/otp", post(auth::send_account_details))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/transactions/{id}/deposit", post(transactions::deposit))
        .route(
            "/transactions/{id}/deposit/history",
            get(transactions::deposit_history),
        )
        .route(
            "/transactions/{id}/withdrawal",
            post(transactions::request_withdrawal),
        )
        .route(
            "/transactions/{id}/withdrawals/{transaction_id}/confirm",
            put(transactions::confirm_withdrawal),
        )
        .route(
            "/transactions/{id}/withdrawals/{transaction_id}/decline",
            put(transactions::decline_withdrawal),
        )
        .route(
            "/transactions/{id}/withdrawals/history",
            get(transactions::withdrawal_history),
        )
        .route("/users", get(users::list_users))
        // Email and id share the first segment, so the parameter keeps one name.
        .route("/users/{key}", get(users::get_user_by_email))
        .route("/users/{key}/delete", delete(users::delete_user_by_email))
        .route("/users/{key}/profile/update", put(users::update_profile))
        .route("/users/{key}/accounts/update", put(users::update_accounts))
        .route("/users/{key}/accounts", get(users::get_accounts))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(state: AppState, address: &str) -> Result<(), anyhow::Error> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Sends a request to a service and waits for its answer.
async fn call<R, T, F>(channel: &mpsc::Sender<R>, build: F) -> Result<T, ServiceError>
where
    F: FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
{
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication("Http".to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication("Http".to_string(), e.to_string()))?
}

fn success<T: Serialize>(status: StatusCode, message: Option<&str>, data: Option<T>) -> Response {
    let mut body = json!({
        "success": true,
        "status": status.as_u16(),
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }
    if let Some(data) = data {
        body["data"] = serde_json::to_value(data).unwrap_or_default();
    }

    (status, Json(body)).into_response()
}

fn acknowledge(message: &str) -> Response {
    success::<Value>(StatusCode::OK, Some(message), None)
}

fn failure(error: ServiceError) -> Response {
    let (status, message) = match &error {
        ServiceError::Validation(message) | ServiceError::Conflict(message) => {
            (StatusCode::BAD_REQUEST, message.clone())
        }
        ServiceError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.clone()),
        ServiceError::Forbidden(message) => (StatusCode::FORBIDDEN, message.clone()),
        ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
        ServiceError::Database(_)
        | ServiceError::Internal(_)
        | ServiceError::Communication(_, _) => {
            log::error!("Request failed: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };

    (
        status,
        Json(json!({
            "success": false,
            "status": status.as_u16(),
            "message": message,
        })),
    )
        .into_response()
}

fn respond<T, F>(result: Result<T, ServiceError>, on_success: F) -> Response
where
    F: FnOnce(T) -> Response,
{
    match result {
        Ok(value) => on_success(value),
        Err(e) => failure(e),
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| failure(ServiceError::Validation(e.body_text())))
}

async fn not_found() -> Response {
    failure(ServiceError::NotFound(
        "The requested resource was not found.".to_string(),
    ))
}

fn documents<'a, I>(users: I) -> Value
where
    I: IntoIterator<Item = &'a crate::models::users::User>,
{
    Value::Array(users.into_iter().map(|user| user.redacted()).collect())
}
