use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::app::AppState;
use crate::error::AppError;

/// Header carrying the shared secret of the write API.
pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

/// Compare a provided service token against the configured one.
pub fn check_service_token(provided: Option<&str>, expected: &str) -> Result<(), AppError> {
    match provided {
        None => Err(AppError::Auth("Missing service token".into())),
        Some(token) if token != expected => Err(AppError::Auth("Invalid service token".into())),
        Some(_) => Ok(()),
    }
}

/// Extractor guarding write routes. Rejects with `401` unless the request
/// carries the configured service token.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAuth;

impl FromRequestParts<AppState> for ServiceAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(SERVICE_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        check_service_token(provided, &state.service_token)?;
        Ok(ServiceAuth)
    }
}
