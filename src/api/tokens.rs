use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::error;

// The handler function for the GET /tokens endpoint: cache introspection.
pub async fn list_tokens_handler(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.tokens.all_cached();
    Json(json!({
        "cacheSize": records.len(),
        "tokens": records,
    }))
}

// The handler function for the GET /tokens/{token} endpoint.
pub async fn get_token_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let result = if crate::token::is_address_like(&token) {
        state.tokens.get_token_by_address(&token).await
    } else {
        state.tokens.get_token_by_symbol(&token).await
    };

    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            error!("Failed to resolve token '{}': {}", token, e);
            (StatusCode::NOT_FOUND, format!("{}", e)).into_response()
        }
    }
}
