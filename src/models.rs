/// A row of the `posts` table. Date columns stay in the platform's
/// storage format (`YYYY-MM-DD HH:MM:SS` text, zero-date sentinel for
/// unset); conversion happens in `dates` / the response builder.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub post_author: i64,
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_content: String,
    pub post_title: String,
    pub post_excerpt: String,
    pub post_status: String,
    pub comment_status: String,
    pub ping_status: String,
    pub post_password: String,
    pub post_name: String,
    pub post_modified: String,
    pub post_modified_gmt: String,
    pub post_parent: i64,
    pub guid: String,
    pub menu_order: i32,
    pub post_type: String,
}

impl PostRow {
    pub fn is_published(&self) -> bool {
        matches!(self.post_status.as_str(), "publish" | "future")
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub user_login: String,
    pub display_name: String,
}
