use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    /// Comma-separated token symbols or addresses.
    pub tokens: String,
}

// The handler function for the GET /balances/{owner} endpoint.
pub async fn get_balances_handler(
    Path(owner): Path<String>,
    Query(query): Query<BalanceQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rpc_url = match state.config.rpc_url.as_ref() {
        Some(url) => url,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RPC_URL is not configured",
            )
                .into_response();
        }
    };

    let requested: Vec<String> = query
        .tokens
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let client = reqwest::Client::new();
    match crate::blockchain::services::balance::get_token_balances(
        &state.tokens,
        &client,
        rpc_url,
        &owner,
        &requested,
    )
    .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            error!("Failed to get balances for {}: {:?}", owner, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch balances: {:#}", e),
            )
                .into_response()
        }
    }
}
