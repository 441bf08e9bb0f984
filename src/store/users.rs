use sqlx::PgConnection;

use crate::models::UserRow;

pub const CAPABILITIES_KEY: &str = "capabilities";
pub const APPLICATION_PASSWORD_KEY: &str = "application_password";

pub async fn find_by_login(
    conn: &mut PgConnection,
    login: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, user_login, display_name FROM users WHERE user_login = $1",
    )
    .bind(login)
    .fetch_optional(conn)
    .await
}

pub async fn user_exists(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// All stored credential hashes for an account, one row per issued
/// credential, in issue order.
pub async fn application_password_hashes(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<Option<String>> = sqlx::query_scalar(
        "SELECT meta_value FROM usermeta WHERE user_id = $1 AND meta_key = $2 \
         ORDER BY umeta_id",
    )
    .bind(user_id)
    .bind(APPLICATION_PASSWORD_KEY)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().flatten().collect())
}

/// The serialized role-assignment map for an account.
pub async fn capability_meta(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT meta_value FROM usermeta WHERE user_id = $1 AND meta_key = $2 \
         ORDER BY umeta_id LIMIT 1",
    )
    .bind(user_id)
    .bind(CAPABILITIES_KEY)
    .fetch_optional(conn)
    .await
    .map(Option::flatten)
}
