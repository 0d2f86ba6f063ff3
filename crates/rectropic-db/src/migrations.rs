use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                avatar      TEXT,
                provider    TEXT NOT NULL,
                provider_id TEXT NOT NULL UNIQUE,
                is_premium  INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE TABLE lists (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                description TEXT,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                is_public   INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_lists_owner ON lists(owner_id);

            CREATE TABLE list_members (
                id          TEXT PRIMARY KEY,
                list_id     TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                role        TEXT NOT NULL DEFAULT 'member',
                joined_at   INTEGER NOT NULL,
                UNIQUE(list_id, user_id)
            );

            CREATE INDEX idx_list_members_user ON list_members(user_id, joined_at);

            CREATE TABLE contents (
                id            TEXT PRIMARY KEY,
                list_id       TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                added_by      TEXT NOT NULL REFERENCES users(id),
                type          TEXT NOT NULL,
                title         TEXT,
                description   TEXT,
                url           TEXT NOT NULL,
                thumbnail_url TEXT,
                metadata      TEXT,
                sort_order    INTEGER NOT NULL,
                created_at    INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL
            );

            CREATE INDEX idx_contents_feed ON contents(list_id, sort_order, created_at);
            CREATE INDEX idx_contents_recent ON contents(list_id, created_at);

            CREATE TABLE reactions (
                id          TEXT PRIMARY KEY,
                content_id  TEXT NOT NULL REFERENCES contents(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                type        TEXT NOT NULL DEFAULT 'like',
                created_at  INTEGER NOT NULL,
                UNIQUE(content_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
