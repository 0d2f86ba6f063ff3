//! Running store work from async handlers, plus the lookups most handlers
//! start with.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use rusqlite::Connection;
use tracing::error;
use uuid::Uuid;

use rectropic_db::Bounded;
use rectropic_db::models::{ContentRow, ListRow, UserRow};
use rectropic_db::queries;
use rectropic_types::models::Role;

use crate::access::ListFacts;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::views::parse_id;

/// Extra wait past the store deadline for a commit already under way.
const COMMIT_GRACE: Duration = Duration::from_secs(1);

/// Run blocking DB work off the async runtime, bounded by the store timeout.
///
/// The deadline is enforced inside the store: work still running when it
/// passes is interrupted and rolled back, so an `internal` timeout means
/// nothing was written. The async side waits [`COMMIT_GRACE`] longer so it
/// reports the store's own outcome rather than racing a finishing commit.
pub async fn run<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Bounded<'_>) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let st = state.clone();
    let deadline = Instant::now() + state.store_timeout;
    let task = tokio::task::spawn_blocking(move || f(&st.db.until(deadline)));

    match tokio::time::timeout(state.store_timeout + COMMIT_GRACE, task).await {
        Ok(joined) => joined.map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("store task failed"))
        })?,
        Err(_) => {
            error!("Store call exceeded {:?}", state.store_timeout);
            Err(ApiError::Internal(anyhow!("store timeout")))
        }
    }
}

/// The actor's own user row. A valid token for a user that no longer exists
/// is treated like any other bad credential.
pub fn actor_user(conn: &Connection, actor: Uuid) -> Result<UserRow, ApiError> {
    queries::get_user_by_id(conn, &actor.to_string())?.ok_or(ApiError::InvalidCredential)
}

pub fn list(conn: &Connection, list_id: Uuid) -> Result<ListRow, ApiError> {
    queries::get_list(conn, &list_id.to_string())?.ok_or(ApiError::NotFound("list-not-found"))
}

pub fn content(conn: &Connection, content_id: Uuid) -> Result<ContentRow, ApiError> {
    queries::get_content(conn, &content_id.to_string())?
        .ok_or(ApiError::NotFound("content-not-found"))
}

/// Everything the access evaluator needs about `list` for this actor.
pub fn list_facts(conn: &Connection, list: &ListRow, actor: Uuid) -> Result<ListFacts, ApiError> {
    let actor_role = queries::get_membership(conn, &list.id, &actor.to_string())?
        .map(|m| m.role.parse::<Role>())
        .transpose()
        .map_err(anyhow::Error::from)?;

    Ok(ListFacts {
        owner_id: parse_id(&list.owner_id, "owner")?,
        is_public: list.is_public,
        actor_role,
    })
}

/// A content's list, as facts for `actor`.
pub fn content_list_facts(
    conn: &Connection,
    content: &ContentRow,
    actor: Uuid,
) -> Result<ListFacts, ApiError> {
    let content_list = queries::get_list(conn, &content.list_id)?
        .ok_or_else(|| ApiError::Internal(anyhow!("content '{}' has no list", content.id)))?;
    list_facts(conn, &content_list, actor)
}
