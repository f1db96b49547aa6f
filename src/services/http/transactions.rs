use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};

use super::{body, call, respond, success, AppState};
use crate::{
    models::transactions::{NewDeposit, NewWithdrawal, WithdrawalStatus},
    services::transactions::TransactionServiceRequest,
};

pub async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<NewDeposit>, JsonRejection>,
) -> Response {
    let deposit = match body(payload) {
        Ok(deposit) => deposit,
        Err(rejection) => return rejection,
    };

    let result = call(&state.transaction_channel, |response| {
        TransactionServiceRequest::Deposit {
            user_id,
            deposit,
            response,
        }
    })
    .await;

    respond(result, |record| {
        success(StatusCode::OK, Some("Deposit was successful"), Some(record))
    })
}

pub async fn deposit_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let result = call(&state.transaction_channel, |response| {
        TransactionServiceRequest::DepositHistory { user_id, response }
    })
    .await;

    respond(result, |history| success(StatusCode::OK, None, Some(history)))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<NewWithdrawal>, JsonRejection>,
) -> Response {
    let withdrawal = match body(payload) {
        Ok(withdrawal) => withdrawal,
        Err(rejection) => return rejection,
    };

    let result = call(&state.transaction_channel, |response| {
        TransactionServiceRequest::RequestWithdrawal {
            user_id,
            withdrawal,
            response,
        }
    })
    .await;

    respond(result, |record| {
        success(
            StatusCode::OK,
            Some("Withdrawal request was successful"),
            Some(record),
        )
    })
}

pub async fn confirm_withdrawal(
    State(state): State<AppState>,
    Path((user_id, transaction_id)): Path<(String, String)>,
) -> Response {
    update_status(
        state,
        user_id,
        transaction_id,
        WithdrawalStatus::Approved,
        "Transaction approved",
    )
    .await
}

pub async fn decline_withdrawal(
    State(state): State<AppState>,
    Path((user_id, transaction_id)): Path<(String, String)>,
) -> Response {
    update_status(
        state,
        user_id,
        transaction_id,
        WithdrawalStatus::Declined,
        "Transaction declined",
    )
    .await
}

async fn update_status(
    state: AppState,
    user_id: String,
    transaction_id: String,
    status: WithdrawalStatus,
    message: &str,
) -> Response {
    let result = call(&state.transaction_channel, |response| {
        TransactionServiceRequest::UpdateWithdrawalStatus {
            user_id,
            transaction_id,
            status,
            response,
        }
    })
    .await;

    respond(result, |record| {
        success(StatusCode::OK, Some(message), Some(record))
    })
}

pub async fn withdrawal_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let result = call(&state.transaction_channel, |response| {
        TransactionServiceRequest::WithdrawalHistory { user_id, response }
    })
    .await;

    respond(result, |history| success(StatusCode::OK, None, Some(history)))
}
