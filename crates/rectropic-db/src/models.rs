/// Database row types. These map directly to SQLite rows.
/// Distinct from rectropic-types API models to keep the DB layer independent.
/// Timestamps are Unix milliseconds.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub provider: String,
    pub provider_id: String,
    pub is_premium: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub list_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: i64,
}

/// A list the user belongs to, with the user's role in it.
#[derive(Debug, Clone)]
pub struct MembershipListRow {
    pub list: ListRow,
    pub role: String,
    pub joined_at: i64,
}

#[derive(Debug, Clone)]
pub struct ContentRow {
    pub id: String,
    pub list_id: String,
    pub added_by: String,
    pub kind: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub metadata: Option<String>,
    pub order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: String,
    pub content_id: String,
    pub user_id: String,
    pub kind: String,
    pub created_at: i64,
}

/// Partial update for a list; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ListChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub is_public: Option<bool>,
}
