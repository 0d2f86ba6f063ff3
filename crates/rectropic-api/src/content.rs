use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rectropic_db::models::ContentRow;
use rectropic_db::ordering::{self, Feed, FeedCursor};
use rectropic_db::queries;
use rectropic_types::api::{AddContentRequest, FeedPage, FeedQuery};
use rectropic_types::metadata::ContentMetadata;

use crate::access::{self, Action};
use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::quota;
use crate::store;
use crate::thumbnail;
use crate::validate;
use crate::views::{self, now_millis};

const DEFAULT_FEED_LIMIT: u32 = 20;
const MAX_FEED_LIMIT: u32 = 100;

/// Membership, quota, order assignment and the insert share one transaction,
/// so concurrent adds to a list can't be handed the same order key.
pub async fn add_content(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Json(req), _): WithRejection<Json<AddContentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let url = validate::web_url("url", &req.url)?;
    let title = validate::content_title(req.title)?;
    let description = validate::blank_to_none(req.description);
    let supplied_thumbnail = validate::blank_to_none(req.thumbnail_url)
        .map(|t| validate::web_url("thumbnailUrl", &t))
        .transpose()?;
    let metadata = req
        .metadata
        .map(|value| ContentMetadata::from_value(req.kind, value))
        .transpose()
        .map_err(|e| ApiError::invalid(format!("metadata: {e}")))?
        .map(|m| m.to_json())
        .transpose()
        .map_err(anyhow::Error::from)?;
    let thumbnail_url = thumbnail::resolve(req.kind, &url, supplied_thumbnail);
    let kind = req.kind;
    let list_id = req.list_id;

    let content = store::run(&state, move |db| {
        db.with_tx(|tx| {
            let list = store::list(tx, list_id)?;
            let facts = store::list_facts(tx, &list, actor.user_id)?;
            access::authorize(actor.user_id, Action::AddContent, &facts)?;

            let adder = store::actor_user(tx, actor.user_id)?;
            let existing = queries::count_list_contents(tx, &list.id)?;
            quota::check_content_creation(adder.is_premium, existing)?;

            let now = now_millis();
            let content = ContentRow {
                id: Uuid::new_v4().to_string(),
                list_id: list.id.clone(),
                added_by: adder.id,
                kind: kind.as_str().to_string(),
                title,
                description,
                url,
                thumbnail_url,
                metadata,
                order: ordering::next_order(tx, &list.id)?,
                created_at: now,
                updated_at: now,
            };
            queries::insert_content(tx, &content)?;
            Ok(content)
        })
    })
    .await?;

    info!(
        "User {} added {} content {} to list {} at order {}",
        actor.user_id, content.kind, content.id, content.list_id, content.order
    );
    Ok((StatusCode::CREATED, Json(json!({ "content": views::content(&content)? }))))
}

pub async fn get_content(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(content_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let (content, reactions) = store::run(&state, move |db| {
        db.with_conn(|conn| {
            let content = store::content(conn, content_id)?;
            let facts = store::content_list_facts(conn, &content, actor.user_id)?;
            access::authorize(actor.user_id, Action::ReadContent, &facts)?;

            let reactions = queries::reactions_for_contents(conn, &[content.id.clone()])?;
            Ok::<_, ApiError>((content, reactions))
        })
    })
    .await?;

    let mut view = views::content(&content)?;
    view.reactions = reactions
        .iter()
        .map(views::reaction)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(json!({ "content": view })))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(content_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    store::run(&state, move |db| {
        db.with_tx(|tx| {
            let content = store::content(tx, content_id)?;
            let facts = store::content_list_facts(tx, &content, actor.user_id)?;
            let added_by = views::parse_id(&content.added_by, "user")?;
            access::authorize(actor.user_id, Action::DeleteContent { added_by }, &facts)?;

            queries::delete_content(tx, &content.id)?;
            Ok(())
        })
    })
    .await?;

    info!("User {} deleted content {}", actor.user_id, content_id);
    Ok(Json(json!({ "success": true })))
}

/// One page of a list's swipe feed. `nextCursor` is absent on the last page.
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    WithRejection(Path(list_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<FeedQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
    let cursor = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let (rows, next_cursor) = store::run(&state, move |db| {
        db.with_conn(|conn| {
            let list = store::list(conn, list_id)?;
            let facts = store::list_facts(conn, &list, actor.user_id)?;
            access::authorize(actor.user_id, Action::ReadContent, &facts)?;

            // one extra row per fetch tells us whether another page exists
            let mut feed = Feed::resume(conn, list.id, limit + 1, cursor);
            let rows = feed
                .by_ref()
                .take(limit as usize)
                .collect::<anyhow::Result<Vec<_>>>()?;
            let page_end = feed.cursor().cloned();
            let more = feed.next().transpose()?.is_some();

            Ok::<_, ApiError>((rows, page_end.filter(|_| more)))
        })
    })
    .await?;

    let next_cursor = next_cursor.as_ref().map(encode_cursor);

    let contents = rows
        .iter()
        .map(views::content)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(FeedPage { contents, next_cursor }))
}

pub fn encode_cursor(cursor: &FeedCursor) -> String {
    B64.encode(format!("{}:{}:{}", cursor.order, cursor.created_at, cursor.id))
}

pub fn decode_cursor(raw: &str) -> Result<FeedCursor, ApiError> {
    let invalid = || ApiError::invalid("cursor is malformed");

    let bytes = B64.decode(raw).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let mut parts = text.splitn(3, ':');

    let order = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let created_at = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let id = parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid)?;

    Ok(FeedCursor { order, created_at, id: id.to_string() })
}
