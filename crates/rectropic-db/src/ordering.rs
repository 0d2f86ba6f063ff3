//! Feed order for a list's contents.
//!
//! Every content gets `sort_order = max(existing) + 1` at insert time, so the
//! first content of a list is 1 and freed values are never handed out again.
//! The feed reads ascending `sort_order`; equal keys (only possible for rows
//! written outside [`next_order`]'s transaction) fall back to newest first,
//! then id, which makes the order total and keyset pagination stable.

use std::collections::VecDeque;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::ContentRow;
use crate::queries::{CONTENT_COLUMNS, content_from_row};

/// Order value meaning "this list has no content yet".
pub const NO_CONTENT: i64 = 0;

/// A position in a list's feed: the last item already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    pub order: i64,
    pub created_at: i64,
    pub id: String,
}

impl FeedCursor {
    pub fn after(content: &ContentRow) -> Self {
        Self {
            order: content.order,
            created_at: content.created_at,
            id: content.id.clone(),
        }
    }
}

/// Order key for the next content added to `list_id`.
///
/// Not atomic on its own: call it inside the same `Database::with_tx` that
/// inserts the content.
pub fn next_order(conn: &Connection, list_id: &str) -> Result<i64> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), ?2) FROM contents WHERE list_id = ?1",
        params![list_id, NO_CONTENT],
        |r| r.get(0),
    )?;
    Ok(max + 1)
}

/// The whole feed, in display order.
pub fn feed(conn: &Connection, list_id: &str) -> Result<Vec<ContentRow>> {
    let sql = format!(
        "SELECT {CONTENT_COLUMNS} FROM contents
         WHERE list_id = ?1
         ORDER BY sort_order ASC, created_at DESC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([list_id], content_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Up to `limit` feed items strictly after `after` (from the start when `None`).
pub fn feed_page(
    conn: &Connection,
    list_id: &str,
    after: Option<&FeedCursor>,
    limit: u32,
) -> Result<Vec<ContentRow>> {
    let Some(cursor) = after else {
        let sql = format!(
            "SELECT {CONTENT_COLUMNS} FROM contents
             WHERE list_id = ?1
             ORDER BY sort_order ASC, created_at DESC, id ASC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![list_id, limit], content_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        return Ok(rows);
    };

    let sql = format!(
        "SELECT {CONTENT_COLUMNS} FROM contents
         WHERE list_id = ?1
           AND (sort_order > ?2
                OR (sort_order = ?2 AND (created_at < ?3
                                         OR (created_at = ?3 AND id > ?4))))
         ORDER BY sort_order ASC, created_at DESC, id ASC
         LIMIT ?5"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![list_id, cursor.order, cursor.created_at, cursor.id, limit],
            content_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The most recently created content, used as the list's thumbnail.
/// Chosen by creation time, not feed order.
pub fn latest_content(conn: &Connection, list_id: &str) -> Result<Option<ContentRow>> {
    let sql = format!(
        "SELECT {CONTENT_COLUMNS} FROM contents
         WHERE list_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1"
    );
    let row = conn.query_row(&sql, [list_id], content_from_row).optional()?;
    Ok(row)
}

/// Lazily walks a list's feed one page at a time over a borrowed connection.
///
/// Finite (ends after the last content) and restartable: build a new one
/// with [`Feed::resume`] from any cursor to continue where another left off.
pub struct Feed<'c> {
    conn: &'c Connection,
    list_id: String,
    page_size: u32,
    cursor: Option<FeedCursor>,
    buffer: VecDeque<ContentRow>,
    exhausted: bool,
}

impl<'c> Feed<'c> {
    pub fn new(conn: &'c Connection, list_id: impl Into<String>, page_size: u32) -> Self {
        Self::resume(conn, list_id, page_size, None)
    }

    pub fn resume(
        conn: &'c Connection,
        list_id: impl Into<String>,
        page_size: u32,
        cursor: Option<FeedCursor>,
    ) -> Self {
        Self {
            conn,
            list_id: list_id.into(),
            page_size: page_size.max(1),
            cursor,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Where a fresh `Feed` would have to resume to continue after the last
    /// item this one yielded.
    pub fn cursor(&self) -> Option<&FeedCursor> {
        self.cursor.as_ref()
    }

    fn fill(&mut self) -> Result<()> {
        let page = feed_page(self.conn, &self.list_id, self.cursor.as_ref(), self.page_size)?;
        if (page.len() as u32) < self.page_size {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for Feed<'_> {
    type Item = Result<ContentRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        let item = self.buffer.pop_front()?;
        self.cursor = Some(FeedCursor::after(&item));
        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::tests::{content, seeded};
    use crate::queries::{delete_content, insert_content};

    fn add(db: &Database, id: &str, created_at: i64) -> i64 {
        db.with_tx(|tx| {
            let order = next_order(tx, "l1")?;
            insert_content(tx, &content(id, "l1", "alice", order, created_at))?;
            Ok::<_, anyhow::Error>(order)
        })
        .unwrap()
    }

    fn ids(rows: &[ContentRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn orders_start_at_one_and_never_reuse_gaps() {
        let db = seeded();
        assert_eq!(db.with_conn(|c| next_order(c, "l1")).unwrap(), NO_CONTENT + 1);

        assert_eq!(add(&db, "a", 1), 1);
        assert_eq!(add(&db, "b", 2), 2);
        assert_eq!(add(&db, "c", 3), 3);

        db.with_conn(|c| delete_content(c, "b")).unwrap();
        assert_eq!(add(&db, "d", 4), 4);

        let rows = db.with_conn(|c| feed(c, "l1")).unwrap();
        assert_eq!(ids(&rows), vec!["a", "c", "d"]);
        let orders: Vec<i64> = rows.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 3, 4]);
    }

    #[test]
    fn deleting_the_max_does_not_lower_what_follows_it() {
        let db = seeded();
        add(&db, "a", 1);
        add(&db, "b", 2);
        db.with_conn(|c| delete_content(c, "a")).unwrap();
        assert_eq!(add(&db, "c", 3), 3);
    }

    #[test]
    fn equal_orders_show_newest_first() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_content(conn, &content("old", "l1", "alice", 1, 100))?;
            insert_content(conn, &content("new", "l1", "bob", 1, 200))?;
            insert_content(conn, &content("next", "l1", "bob", 2, 50))?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let rows = db.with_conn(|c| feed(c, "l1")).unwrap();
        assert_eq!(ids(&rows), vec!["new", "old", "next"]);
    }

    #[test]
    fn latest_content_is_by_creation_time_not_order() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_content(conn, &content("high-order", "l1", "alice", 9, 100))?;
            insert_content(conn, &content("recent", "l1", "alice", 2, 500))?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let latest = db.with_conn(|c| latest_content(c, "l1")).unwrap().unwrap();
        assert_eq!(latest.id, "recent");
        assert!(db.with_conn(|c| latest_content(c, "missing")).unwrap().is_none());
    }

    #[test]
    fn pages_cover_the_feed_without_overlap() {
        let db = seeded();
        db.with_conn(|conn| {
            // a tie at order 2 straddling a page boundary
            insert_content(conn, &content("a", "l1", "alice", 1, 10))?;
            insert_content(conn, &content("b", "l1", "alice", 2, 30))?;
            insert_content(conn, &content("c", "l1", "alice", 2, 20))?;
            insert_content(conn, &content("d", "l1", "alice", 3, 40))?;
            insert_content(conn, &content("e", "l1", "alice", 4, 50))?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();

        let first = db.with_conn(|c| feed_page(c, "l1", None, 2)).unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);

        let cursor = FeedCursor::after(first.last().unwrap());
        let second = db.with_conn(|c| feed_page(c, "l1", Some(&cursor), 2)).unwrap();
        assert_eq!(ids(&second), vec!["c", "d"]);

        let cursor = FeedCursor::after(second.last().unwrap());
        let third = db.with_conn(|c| feed_page(c, "l1", Some(&cursor), 2)).unwrap();
        assert_eq!(ids(&third), vec!["e"]);
    }

    #[test]
    fn feed_iterator_is_lazy_finite_and_restartable() {
        let db = seeded();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            add(&db, id, i as i64);
        }

        db.with_conn(|conn| {
            let all: Vec<String> = Feed::new(conn, "l1", 2).map(|r| r.unwrap().id).collect();
            assert_eq!(all, vec!["a", "b", "c", "d", "e"]);

            let mut feed = Feed::new(conn, "l1", 2);
            let taken: Vec<String> = feed.by_ref().take(3).map(|r| r.unwrap().id).collect();
            assert_eq!(taken, vec!["a", "b", "c"]);

            let resumed: Vec<String> = Feed::resume(conn, "l1", 2, feed.cursor().cloned())
                .map(|r| r.unwrap().id)
                .collect();
            assert_eq!(resumed, vec!["d", "e"]);

            assert_eq!(Feed::new(conn, "empty", 3).count(), 0);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }
}
