use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated caller. Handlers receive it explicitly and pass it to
/// every core call; nothing reads it from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
}

/// Verify the bearer credential and attach the [`Actor`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::InvalidCredential)?;

    let user_id = state.tokens.verify(bearer.token())?;

    req.extensions_mut().insert(Actor { user_id });
    Ok(next.run(req).await)
}
