use std::collections::HashSet;

use sqlx::PgConnection;

use crate::models::PostRow;

const POST_COLUMNS: &str = "id, post_author, post_date, post_date_gmt, post_content, \
     post_title, post_excerpt, post_status, comment_status, ping_status, \
     post_password, post_name, post_modified, post_modified_gmt, \
     post_parent, guid, menu_order, post_type";

pub async fn fetch_post(conn: &mut PgConnection, id: i64) -> Result<Option<PostRow>, sqlx::Error> {
    sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn post_exists(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

pub async fn is_attachment(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
    let post_type: Option<String> =
        sqlx::query_scalar("SELECT post_type FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(post_type.as_deref() == Some("attachment"))
}

/// The column-level update set assembled by the prepare step. `None`
/// leaves the stored value untouched.
#[derive(Debug, Default, Clone)]
pub struct PostChangeset {
    pub post_author: Option<i64>,
    pub post_date: Option<String>,
    pub post_date_gmt: Option<String>,
    pub post_content: Option<String>,
    pub post_title: Option<String>,
    pub post_excerpt: Option<String>,
    pub post_status: Option<String>,
    pub comment_status: Option<String>,
    pub ping_status: Option<String>,
    pub post_password: Option<String>,
    pub post_name: Option<String>,
    pub post_parent: Option<i64>,
    pub menu_order: Option<i32>,
}

/// Applies the changeset in a single statement. The modified timestamps
/// are always refreshed, even for an otherwise empty changeset. Returns
/// the number of affected rows; the caller treats zero as a failure.
pub async fn update_post(
    conn: &mut PgConnection,
    id: i64,
    cs: &PostChangeset,
    modified_local: &str,
    modified_gmt: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts SET
            post_author = COALESCE($2, post_author),
            post_date = COALESCE($3, post_date),
            post_date_gmt = COALESCE($4, post_date_gmt),
            post_content = COALESCE($5, post_content),
            post_title = COALESCE($6, post_title),
            post_excerpt = COALESCE($7, post_excerpt),
            post_status = COALESCE($8, post_status),
            comment_status = COALESCE($9, comment_status),
            ping_status = COALESCE($10, ping_status),
            post_password = COALESCE($11, post_password),
            post_name = COALESCE($12, post_name),
            post_parent = COALESCE($13, post_parent),
            menu_order = COALESCE($14, menu_order),
            post_modified = $15,
            post_modified_gmt = $16
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(cs.post_author)
    .bind(&cs.post_date)
    .bind(&cs.post_date_gmt)
    .bind(&cs.post_content)
    .bind(&cs.post_title)
    .bind(&cs.post_excerpt)
    .bind(&cs.post_status)
    .bind(&cs.comment_status)
    .bind(&cs.ping_status)
    .bind(&cs.post_password)
    .bind(&cs.post_name)
    .bind(cs.post_parent)
    .bind(cs.menu_order)
    .bind(modified_local)
    .bind(modified_gmt)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Picks the first free slug among `desired`, `desired-2`, `desired-3`, …
/// given the set of slugs already taken in the (type, parent) scope.
pub fn next_unique_slug(desired: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(desired) {
        return desired.to_string();
    }
    let mut suffix = 2u64;
    loop {
        let candidate = format!("{desired}-{suffix}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Resolves a requested slug to a unique one within (post_type, parent),
/// excluding the post's own row. Collisions append "-2", "-3", … The
/// caller invokes this for draft/pending posts too: an explicitly
/// supplied slug is checked as though the post were published.
pub async fn unique_slug(
    conn: &mut PgConnection,
    desired: &str,
    post_id: i64,
    post_type: &str,
    parent: i64,
) -> Result<String, sqlx::Error> {
    let taken: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT post_name FROM posts
        WHERE post_type = $1 AND post_parent = $2 AND id <> $3
          AND (post_name = $4 OR post_name LIKE $4 || '-%')
        "#,
    )
    .bind(post_type)
    .bind(parent)
    .bind(post_id)
    .bind(desired)
    .fetch_all(conn)
    .await?;

    Ok(next_unique_slug(desired, &taken.into_iter().collect()))
}
