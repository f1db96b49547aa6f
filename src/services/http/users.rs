use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde_json::{Map, Value};

use super::{acknowledge, body, call, documents, respond, success, AppState};
use crate::{models::users::AccountsUpdate, services::users::UserRequest};

pub async fn list_users(State(state): State<AppState>) -> Response {
    let result = call(&state.user_channel, |response| UserRequest::ListUsers {
        response,
    })
    .await;

    respond(result, |users| {
        success(StatusCode::OK, None, Some(documents(&users)))
    })
}

pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Response {
    let result = call(&state.user_channel, |response| UserRequest::GetUserByEmail {
        email,
        response,
    })
    .await;

    respond(result, |user| {
        success(StatusCode::OK, None, Some(user.redacted()))
    })
}

pub async fn delete_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Response {
    let result = call(&state.user_channel, |response| {
        UserRequest::DeleteUserByEmail { email, response }
    })
    .await;

    respond(result, |_| acknowledge("User deleted successfully"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Response {
    let fields = match body(payload) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };

    let result = call(&state.user_channel, |response| UserRequest::UpdateProfile {
        id,
        fields,
        response,
    })
    .await;

    respond(result, |user| {
        success(
            StatusCode::OK,
            Some("Profile updated successfully"),
            Some(user.redacted()),
        )
    })
}

pub async fn update_accounts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AccountsUpdate>, JsonRejection>,
) -> Response {
    let update = match body(payload) {
        Ok(update) => update,
        Err(rejection) => return rejection,
    };

    let result = call(&state.user_channel, |response| UserRequest::UpdateAccounts {
        id,
        update,
        response,
    })
    .await;

    respond(result, |accounts| {
        success(
            StatusCode::OK,
            Some("Account updated successfully"),
            Some(accounts),
        )
    })
}

pub async fn get_accounts(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = call(&state.user_channel, |response| UserRequest::GetAccounts {
        id,
        response,
    })
    .await;

    respond(result, |accounts| {
        success(
            StatusCode::OK,
            Some("Account retrieved successfully"),
            Some(accounts),
        )
    })
}
