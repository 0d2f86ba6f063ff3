//! Store rows to wire types.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use rectropic_db::models::{ContentRow, ListRow, MemberRow, ReactionRow, UserRow};
use rectropic_types::api::{
    ContentResponse, ListResponse, MemberResponse, PublicUser, ReactionResponse, UserResponse,
};
use rectropic_types::metadata::ContentMetadata;
use rectropic_types::models::ContentType;

pub fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("corrupt {} id '{}'", what, raw))
}

pub fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(|| {
        warn!("Out-of-range timestamp {}", ms);
        DateTime::default()
    })
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn user(row: &UserRow) -> Result<UserResponse> {
    Ok(UserResponse {
        id: parse_id(&row.id, "user")?,
        email: row.email.clone(),
        name: row.name.clone(),
        avatar: row.avatar.clone(),
        is_premium: row.is_premium,
    })
}

pub fn public_user(row: &UserRow) -> Result<PublicUser> {
    Ok(PublicUser {
        id: parse_id(&row.id, "user")?,
        email: Some(row.email.clone()),
        name: row.name.clone(),
        avatar: row.avatar.clone(),
    })
}

pub fn list(row: &ListRow) -> Result<ListResponse> {
    Ok(ListResponse {
        id: parse_id(&row.id, "list")?,
        title: row.title.clone(),
        description: row.description.clone(),
        owner_id: parse_id(&row.owner_id, "owner")?,
        is_public: row.is_public,
        created_at: timestamp(row.created_at),
        updated_at: timestamp(row.updated_at),
    })
}

pub fn member(row: &MemberRow, user: Option<&UserRow>) -> Result<MemberResponse> {
    Ok(MemberResponse {
        id: parse_id(&row.id, "membership")?,
        list_id: parse_id(&row.list_id, "list")?,
        user_id: parse_id(&row.user_id, "user")?,
        role: row.role.parse()?,
        joined_at: timestamp(row.joined_at),
        user: user.map(public_user).transpose()?,
    })
}

/// Corrupt metadata is dropped with a warning rather than failing the read.
pub fn content(row: &ContentRow) -> Result<ContentResponse> {
    let kind: ContentType = row.kind.parse()?;
    let metadata = row.metadata.as_deref().and_then(|json| {
        ContentMetadata::from_json(kind, json)
            .map_err(|e| warn!("Corrupt metadata on content '{}': {}", row.id, e))
            .ok()
    });

    Ok(ContentResponse {
        id: parse_id(&row.id, "content")?,
        list_id: parse_id(&row.list_id, "list")?,
        added_by: parse_id(&row.added_by, "user")?,
        kind,
        title: row.title.clone(),
        description: row.description.clone(),
        url: row.url.clone(),
        thumbnail_url: row.thumbnail_url.clone(),
        metadata,
        order: row.order,
        created_at: timestamp(row.created_at),
        updated_at: timestamp(row.updated_at),
        added_by_user: None,
        reactions: vec![],
    })
}

pub fn reaction(row: &ReactionRow) -> Result<ReactionResponse> {
    Ok(ReactionResponse {
        id: parse_id(&row.id, "reaction")?,
        content_id: parse_id(&row.content_id, "content")?,
        user_id: parse_id(&row.user_id, "user")?,
        kind: row.kind.parse()?,
        created_at: timestamp(row.created_at),
    })
}
