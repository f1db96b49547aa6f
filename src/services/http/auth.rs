use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Response,
    Json,
};

use super::{acknowledge, body, call, respond, success, AppState};
use crate::{
    models::users::{Credentials, EmailRequest, Registration, VerifyEmailRequest},
    services::auth::AuthRequest,
};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Response {
    let registration = match body(payload) {
        Ok(registration) => registration,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| AuthRequest::Register {
        registration,
        response,
    })
    .await;

    respond(result, |user| {
        success(
            StatusCode::CREATED,
            Some("Registration successful"),
            Some(user.redacted()),
        )
    })
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let credentials = match body(payload) {
        Ok(credentials) => credentials,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| AuthRequest::Login {
        credentials,
        response,
    })
    .await;

    respond(result, |user| {
        success(StatusCode::OK, Some("Login successful"), Some(user.redacted()))
    })
}

pub async fn verify_email(
    State(state): State<AppState>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| AuthRequest::VerifyEmail {
        request,
        response,
    })
    .await;

    respond(result, |user| {
        success(StatusCode::OK, Some("Email verified"), Some(user.redacted()))
    })
}

pub async fn resend_otp(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| AuthRequest::ResendOtp {
        email: request.email,
        response,
    })
    .await;

    respond(result, |_| acknowledge("OTP resent successfully"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| AuthRequest::ResetPassword {
        email: request.email,
        response,
    })
    .await;

    respond(result, |_| acknowledge("Password reset email sent"))
}

pub async fn send_account_details(
    State(state): State<AppState>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Response {
    let request = match body(payload) {
        Ok(request) => request,
        Err(rejection) => return rejection,
    };

    let result = call(&state.auth_channel, |response| {
        AuthRequest::SendAccountDetails {
            email: request.email,
            response,
        }
    })
    .await;

    respond(result, |_| acknowledge("Account details sent"))
}
