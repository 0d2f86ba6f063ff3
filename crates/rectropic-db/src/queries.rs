use crate::models::{ContentRow, ListChanges, ListRow, MemberRow, MembershipListRow, ReactionRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str =
    "id, email, name, avatar, provider, provider_id, is_premium, created_at, updated_at";
const LIST_COLUMNS: &str = "id, title, description, owner_id, is_public, created_at, updated_at";
pub(crate) const CONTENT_COLUMNS: &str = "id, list_id, added_by, type, title, description, url, \
     thumbnail_url, metadata, sort_order, created_at, updated_at";
const REACTION_COLUMNS: &str = "id, content_id, user_id, type, created_at";

// -- Users --

pub fn insert_user(conn: &Connection, user: &UserRow) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, avatar, provider, provider_id, is_premium, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.email,
            user.name,
            user.avatar,
            user.provider,
            user.provider_id,
            user.is_premium,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    query_user(conn, "id", id)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    query_user(conn, "email", email)
}

pub fn get_user_by_provider_id(conn: &Connection, provider_id: &str) -> Result<Option<UserRow>> {
    query_user(conn, "provider_id", provider_id)
}

/// Refresh the identity fields of a returning provider login.
pub fn refresh_user_identity(
    conn: &Connection,
    id: &str,
    email: &str,
    name: &str,
    avatar: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET email = ?2, name = ?3, avatar = ?4, updated_at = ?5 WHERE id = ?1",
        params![id, email, name, avatar, now],
    )?;
    Ok(())
}

pub fn update_profile(
    conn: &Connection,
    id: &str,
    name: Option<&str>,
    avatar: Option<&str>,
    now: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET name = COALESCE(?2, name), avatar = COALESCE(?3, avatar), updated_at = ?4
         WHERE id = ?1",
        params![id, name, avatar, now],
    )?;
    Ok(())
}

pub fn set_premium(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_premium = 1, updated_at = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}

/// Batch-fetch users for a set of IDs. Missing IDs are skipped.
pub fn get_users_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<UserRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids), user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let row = conn.query_row(&sql, [value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        provider: row.get(4)?,
        provider_id: row.get(5)?,
        is_premium: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// -- Lists --

pub fn insert_list(conn: &Connection, list: &ListRow) -> Result<()> {
    conn.execute(
        "INSERT INTO lists (id, title, description, owner_id, is_public, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            list.id,
            list.title,
            list.description,
            list.owner_id,
            list.is_public,
            list.created_at,
            list.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_list(conn: &Connection, id: &str) -> Result<Option<ListRow>> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?1");
    let row = conn.query_row(&sql, [id], list_from_row).optional()?;
    Ok(row)
}

pub fn update_list(conn: &Connection, id: &str, changes: &ListChanges, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE lists SET
            title = COALESCE(?2, title),
            description = CASE WHEN ?6 THEN ?3 ELSE description END,
            is_public = COALESCE(?4, is_public),
            updated_at = ?5
         WHERE id = ?1",
        params![
            id,
            changes.title,
            changes.description.as_ref().and_then(|d| d.as_deref()),
            changes.is_public,
            now,
            changes.description.is_some(),
        ],
    )?;
    Ok(())
}

/// Deletes the list; memberships, contents and reactions go with it.
pub fn delete_list(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM lists WHERE id = ?1", [id])?;
    Ok(n > 0)
}

/// Lists owned by the user. Memberships in other people's lists don't count.
pub fn count_owned_lists(conn: &Connection, owner_id: &str) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM lists WHERE owner_id = ?1",
        [owner_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

/// Every list the user is a member of, most recently joined first.
pub fn lists_for_member(conn: &Connection, user_id: &str) -> Result<Vec<MembershipListRow>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.title, l.description, l.owner_id, l.is_public, l.created_at, l.updated_at,
                m.role, m.joined_at
         FROM list_members m
         JOIN lists l ON l.id = m.list_id
         WHERE m.user_id = ?1
         ORDER BY m.joined_at DESC, m.rowid DESC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(MembershipListRow {
                list: list_from_row(row)?,
                role: row.get(7)?,
                joined_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<ListRow> {
    Ok(ListRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
        is_public: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// -- Members --

pub fn insert_member(conn: &Connection, member: &MemberRow) -> Result<()> {
    conn.execute(
        "INSERT INTO list_members (id, list_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![member.id, member.list_id, member.user_id, member.role, member.joined_at],
    )?;
    Ok(())
}

pub fn get_membership(conn: &Connection, list_id: &str, user_id: &str) -> Result<Option<MemberRow>> {
    let row = conn
        .query_row(
            "SELECT id, list_id, user_id, role, joined_at FROM list_members
             WHERE list_id = ?1 AND user_id = ?2",
            [list_id, user_id],
            member_from_row,
        )
        .optional()?;
    Ok(row)
}

/// Members in join order, owner first.
pub fn members_of(conn: &Connection, list_id: &str) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, list_id, user_id, role, joined_at FROM list_members
         WHERE list_id = ?1
         ORDER BY joined_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map([list_id], member_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Only `member` rows can go; the owner row stays for the life of the list.
pub fn delete_member(conn: &Connection, list_id: &str, user_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM list_members WHERE list_id = ?1 AND user_id = ?2 AND role <> 'owner'",
        [list_id, user_id],
    )?;
    Ok(n > 0)
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        list_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
        joined_at: row.get(4)?,
    })
}

// -- Contents --

pub fn insert_content(conn: &Connection, content: &ContentRow) -> Result<()> {
    conn.execute(
        "INSERT INTO contents (id, list_id, added_by, type, title, description, url, thumbnail_url,
                               metadata, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            content.id,
            content.list_id,
            content.added_by,
            content.kind,
            content.title,
            content.description,
            content.url,
            content.thumbnail_url,
            content.metadata,
            content.order,
            content.created_at,
            content.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_content(conn: &Connection, id: &str) -> Result<Option<ContentRow>> {
    let sql = format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE id = ?1");
    let row = conn.query_row(&sql, [id], content_from_row).optional()?;
    Ok(row)
}

/// Deletes the content and its reactions.
pub fn delete_content(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM contents WHERE id = ?1", [id])?;
    Ok(n > 0)
}

/// All contents of the list, regardless of who added them.
pub fn count_list_contents(conn: &Connection, list_id: &str) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM contents WHERE list_id = ?1",
        [list_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

pub(crate) fn content_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        id: row.get(0)?,
        list_id: row.get(1)?,
        added_by: row.get(2)?,
        kind: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        url: row.get(6)?,
        thumbnail_url: row.get(7)?,
        metadata: row.get(8)?,
        order: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

// -- Reactions --

/// Insert the user's reaction, or change its type in place if one exists.
/// `id` and `created_at` are only used for a fresh row.
pub fn upsert_reaction(
    conn: &Connection,
    id: &str,
    content_id: &str,
    user_id: &str,
    kind: &str,
    now: i64,
) -> Result<ReactionRow> {
    conn.execute(
        "INSERT INTO reactions (id, content_id, user_id, type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(content_id, user_id) DO UPDATE SET type = excluded.type",
        params![id, content_id, user_id, kind, now],
    )?;

    let sql = format!("SELECT {REACTION_COLUMNS} FROM reactions WHERE content_id = ?1 AND user_id = ?2");
    let row = conn.query_row(&sql, [content_id, user_id], reaction_from_row)?;
    Ok(row)
}

pub fn delete_reaction(conn: &Connection, content_id: &str, user_id: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM reactions WHERE content_id = ?1 AND user_id = ?2",
        [content_id, user_id],
    )?;
    Ok(n > 0)
}

/// Batch-fetch reactions for a set of content IDs.
pub fn reactions_for_contents(conn: &Connection, content_ids: &[String]) -> Result<Vec<ReactionRow>> {
    if content_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {REACTION_COLUMNS} FROM reactions WHERE content_id IN ({}) ORDER BY created_at ASC",
        placeholders(content_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(content_ids), reaction_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        content_id: row.get(1)?,
        user_id: row.get(2)?,
        kind: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
