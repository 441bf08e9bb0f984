use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;

/// Term ids currently related to a post within one taxonomy, in
/// relationship order.
pub async fn object_term_ids(
    conn: &mut PgConnection,
    post_id: i64,
    taxonomy: &str,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT tt.term_id
        FROM term_relationships tr
        JOIN term_taxonomy tt ON tt.term_taxonomy_id = tr.term_taxonomy_id
        WHERE tr.object_id = $1 AND tt.taxonomy = $2
        ORDER BY tr.term_order, tt.term_id
        "#,
    )
    .bind(post_id)
    .bind(taxonomy)
    .fetch_all(conn)
    .await
}

async fn taxonomy_ids(
    conn: &mut PgConnection,
    taxonomy: &str,
    term_ids: &[i64],
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT term_id, term_taxonomy_id FROM term_taxonomy \
         WHERE taxonomy = $1 AND term_id = ANY($2)",
    )
    .bind(taxonomy)
    .bind(term_ids)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Replaces the post's assignment set within one taxonomy. Term ids that
/// do not exist in the taxonomy are silently skipped, and usage counters
/// follow the additions and removals.
pub async fn set_object_terms(
    conn: &mut PgConnection,
    post_id: i64,
    taxonomy: &str,
    term_ids: &[i64],
) -> Result<(), sqlx::Error> {
    let current = object_term_ids(&mut *conn, post_id, taxonomy).await?;
    let resolved = taxonomy_ids(&mut *conn, taxonomy, term_ids).await?;

    let current_set: HashSet<i64> = current.iter().copied().collect();
    // Deduplicated, in request order, unknown ids dropped.
    let mut keep = Vec::new();
    let mut keep_set = HashSet::new();
    for id in term_ids {
        if resolved.contains_key(id) && keep_set.insert(*id) {
            keep.push(*id);
        }
    }

    let current_tt = taxonomy_ids(&mut *conn, taxonomy, &current).await?;
    for term_id in current_set.difference(&keep_set) {
        let Some(tt_id) = current_tt.get(term_id) else {
            continue;
        };
        sqlx::query(
            "DELETE FROM term_relationships WHERE object_id = $1 AND term_taxonomy_id = $2",
        )
        .bind(post_id)
        .bind(tt_id)
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "UPDATE term_taxonomy SET count = count - 1 WHERE term_taxonomy_id = $1",
        )
        .bind(tt_id)
        .execute(&mut *conn)
        .await?;
    }

    for (order, term_id) in keep.iter().enumerate() {
        if current_set.contains(term_id) {
            continue;
        }
        let tt_id = resolved[term_id];
        sqlx::query(
            "INSERT INTO term_relationships (object_id, term_taxonomy_id, term_order) \
             VALUES ($1, $2, $3)",
        )
        .bind(post_id)
        .bind(tt_id)
        .bind(order as i32)
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "UPDATE term_taxonomy SET count = count + 1 WHERE term_taxonomy_id = $1",
        )
        .bind(tt_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Term id for a term slug within a taxonomy, if it exists.
pub async fn find_term_by_slug(
    conn: &mut PgConnection,
    taxonomy: &str,
    slug: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT t.term_id
        FROM terms t
        JOIN term_taxonomy tt ON tt.term_id = t.term_id
        WHERE tt.taxonomy = $1 AND t.slug = $2
        "#,
    )
    .bind(taxonomy)
    .bind(slug)
    .fetch_optional(conn)
    .await
}

/// Slug of the post's assigned format term, if any.
pub async fn object_format_slug(
    conn: &mut PgConnection,
    post_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT t.slug
        FROM term_relationships tr
        JOIN term_taxonomy tt ON tt.term_taxonomy_id = tr.term_taxonomy_id
        JOIN terms t ON t.term_id = tt.term_id
        WHERE tr.object_id = $1 AND tt.taxonomy = 'post_format'
        LIMIT 1
        "#,
    )
    .bind(post_id)
    .fetch_optional(conn)
    .await
}
