use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rectropic_db::queries;
use rectropic_types::api::ReactionRequest;

use crate::access::{self, Action};
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::store;
use crate::views::{self, now_millis};

/// Set the caller's reaction. Reacting again replaces the type in place.
pub async fn set_reaction(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(content_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.kind;

    let reaction = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let content = store::content(tx, content_id)?;
            let facts = store::content_list_facts(tx, &content, actor.user_id)?;
            access::authorize(actor.user_id, Action::React, &facts)?;

            let reaction = queries::upsert_reaction(
                tx,
                &Uuid::new_v4().to_string(),
                &content.id,
                &actor.user_id.to_string(),
                kind.as_str(),
                now_millis(),
            )?;
            Ok(reaction)
        })
    })
    .await?;

    info!("User {} reacted {} to content {}", actor.user_id, kind, content_id);
    Ok(Json(json!({ "reaction": views::reaction(&reaction)? })))
}

/// Remove the caller's own reaction, if any. Only ever touches the caller's row.
pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(content_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let content = store::content(tx, content_id)?;
            Ok::<_, ApiError>(queries::delete_reaction(tx, &content.id, &actor.user_id.to_string())?)
        })
    })
    .await?;

    Ok(Json(json!({ "success": true, "removed": removed })))
}
