use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;

use super::state::AppState;
use super::types::{
    AccountList, AmountRequest, ApiError, ApiResult, CreateAccountRequest, HealthResponse,
    TransferList, TransferResponse,
};
use crate::account::{Account, AccountId};
use crate::store::AccountStore;
use crate::transfer::TransferRequest;

/// Unwrap a JSON body, answering malformed input with a 400.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::bad_request("invalid json")
    })
}

fn parse_id(raw: &str) -> ApiResult<AccountId> {
    raw.parse::<i64>()
        .ok()
        .and_then(AccountId::new)
        .ok_or_else(|| ApiError::bad_request("invalid id"))
}

/// GET /health
pub async fn health_check<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Json<HealthResponse>> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "health check failed");
        ApiError::service_unavailable("store unavailable")
    })?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// GET /accounts
pub async fn list_accounts<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Json<AccountList>> {
    let accounts = state.accounts.list().await?;
    Ok(Json(AccountList { accounts }))
}

/// GET /accounts/{id}
pub async fn get_account<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Account>> {
    let id = parse_id(&id)?;
    Ok(Json(state.accounts.get(id).await?))
}

/// POST /accounts
pub async fn create_account<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let req = json_body(body)?;
    let account = state.accounts.create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /accounts/{id}/deposit
pub async fn deposit<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<Json<Account>> {
    let id = parse_id(&id)?;
    let req = json_body(body)?;
    Ok(Json(state.accounts.deposit(id, req.amount).await?))
}

/// POST /accounts/{id}/withdraw
pub async fn withdraw<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<Json<Account>> {
    let id = parse_id(&id)?;
    let req = json_body(body)?;
    Ok(Json(state.accounts.withdraw(id, req.amount).await?))
}

/// POST /transfer
pub async fn transfer<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<Json<TransferResponse>> {
    let req = json_body(body)?;
    let outcome = state.transfers.transfer(req).await?;
    Ok(Json(TransferResponse {
        from: outcome.from,
        to: outcome.to,
    }))
}

/// GET /transfers
pub async fn list_transfers<S: AccountStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<Json<TransferList>> {
    let transfers = state.transfers.history().await?;
    Ok(Json(TransferList { transfers }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12").unwrap().get(), 12);
        assert_eq!(parse_id("0").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(parse_id("-3").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(parse_id("abc").unwrap_err().message, "invalid id");
    }
}
