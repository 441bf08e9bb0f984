use sqlx::PgConnection;

/// First stored value for a key. Duplicate rows for the same key can
/// exist; reads collapse to the lowest meta_id, matching the platform.
pub async fn first_meta(
    conn: &mut PgConnection,
    post_id: i64,
    key: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT meta_value FROM postmeta WHERE post_id = $1 AND meta_key = $2 \
         ORDER BY meta_id LIMIT 1",
    )
    .bind(post_id)
    .bind(key)
    .fetch_optional(conn)
    .await
    .map(Option::flatten)
}

/// Updates the first existing row for the key, or inserts one.
pub async fn upsert_meta(
    conn: &mut PgConnection,
    post_id: i64,
    key: &str,
    value: &str,
) -> Result<(), sqlx::Error> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT meta_id FROM postmeta WHERE post_id = $1 AND meta_key = $2 \
         ORDER BY meta_id LIMIT 1",
    )
    .bind(post_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(meta_id) => {
            sqlx::query("UPDATE postmeta SET meta_value = $1 WHERE meta_id = $2")
                .bind(value)
                .bind(meta_id)
                .execute(conn)
                .await?;
        }
        None => {
            sqlx::query("INSERT INTO postmeta (post_id, meta_key, meta_value) VALUES ($1, $2, $3)")
                .bind(post_id)
                .bind(key)
                .bind(value)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

pub async fn delete_meta(
    conn: &mut PgConnection,
    post_id: i64,
    key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM postmeta WHERE post_id = $1 AND meta_key = $2")
        .bind(post_id)
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

/// All metadata for a post, first value per key, in meta_id order.
pub async fn all_meta(
    conn: &mut PgConnection,
    post_id: i64,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT meta_key, meta_value FROM postmeta WHERE post_id = $1 ORDER BY meta_id",
    )
    .bind(post_id)
    .fetch_all(conn)
    .await?;

    let mut seen = std::collections::HashSet::new();
    Ok(rows
        .into_iter()
        .filter(|(k, _)| seen.insert(k.clone()))
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}
