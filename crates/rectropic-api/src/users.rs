use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;

use rectropic_db::queries;
use rectropic_types::api::{UpdateProfileRequest, UserSearchQuery};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::store;
use crate::validate;
use crate::views::{self, now_millis};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let user = store::run(&state, move |db| db.with_conn(|conn| store::actor_user(conn, actor.user_id))).await?;
    Ok(Json(json!({ "user": views::user(&user)? })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.as_deref().map(validate::display_name).transpose()?;
    let avatar = req.avatar.as_deref().map(|a| validate::web_url("avatar", a)).transpose()?;

    let user = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let user = store::actor_user(tx, actor.user_id)?;
            queries::update_profile(tx, &user.id, name.as_deref(), avatar.as_deref(), now_millis())?;
            store::actor_user(tx, actor.user_id)
        })
    })
    .await?;

    Ok(Json(json!({ "user": views::user(&user)? })))
}

/// Flips the premium flag. There is no billing behind this.
pub async fn upgrade(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let user = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let user = store::actor_user(tx, actor.user_id)?;
            if user.is_premium {
                return Err(ApiError::Conflict("already-premium"));
            }
            queries::set_premium(tx, &user.id, now_millis())?;
            store::actor_user(tx, actor.user_id)
        })
    })
    .await?;

    info!("User {} upgraded to premium", actor.user_id);
    Ok(Json(json!({ "user": views::user(&user)? })))
}

/// Look a user up by email, e.g. before inviting them.
pub async fn search(
    State(state): State<AppState>,
    Extension(_actor): Extension<Actor>,
    WithRejection(Query(query), _): WithRejection<Query<UserSearchQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = query
        .email
        .as_deref()
        .ok_or_else(|| ApiError::invalid("email is required"))
        .and_then(validate::email)?;

    let user = store::run(&state, move |db| {
        db.with_conn(|conn| {
            queries::get_user_by_email(conn, &email)?.ok_or(ApiError::NotFound("user-not-found"))
        })
    })
    .await?;

    Ok(Json(json!({ "user": views::public_user(&user)? })))
}
