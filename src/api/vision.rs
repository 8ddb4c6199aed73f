//! Vision relay endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};

use super::{ApiState, FUNCTION_ROUTE, SERVER_ROUTE};
use crate::relay::{RelayError, VisionResponse};

/// Build the relay router
///
/// Both deployment routes share one handler and one success schema. Methods
/// other than POST fall through to a plain-text 405.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(SERVER_ROUTE, post(describe).fallback(method_not_allowed))
        .route(FUNCTION_ROUTE, post(describe).fallback(method_not_allowed))
        .with_state(state)
}

/// Forward an image and prompt to the provider
///
/// The body is taken as raw bytes so that malformed JSON and missing fields
/// both surface as `400 {error}` rather than an extractor rejection.
async fn describe(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<VisionResponse>, RelayError> {
    state.relay.handle_body(&body).await.map(Json)
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.body() {
            Some(body) => (status, Json(body)).into_response(),
            None => (status, "Method Not Allowed").into_response(),
        }
    }
}
