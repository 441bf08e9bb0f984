use sqlx::PgConnection;

use crate::php::{self, PhpValue};

pub const STICKY_POSTS: &str = "sticky_posts";
pub const GMT_OFFSET: &str = "gmt_offset";
pub const USER_ROLES: &str = "user_roles";

pub async fn get_option(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT option_value FROM options WHERE option_name = $1")
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn set_option(
    conn: &mut PgConnection,
    name: &str,
    value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO options (option_name, option_value)
        VALUES ($1, $2)
        ON CONFLICT (option_name)
        DO UPDATE SET option_value = EXCLUDED.option_value
        "#,
    )
    .bind(name)
    .bind(value)
    .execute(conn)
    .await?;
    Ok(())
}

/// The sticky registry, decoded from its serialized blob. A missing or
/// unreadable option reads as empty.
pub async fn sticky_posts(conn: &mut PgConnection) -> Result<Vec<i64>, sqlx::Error> {
    let Some(raw) = get_option(conn, STICKY_POSTS).await? else {
        return Ok(Vec::new());
    };
    Ok(php::decode(&raw).map(|v| v.int_list()).unwrap_or_default())
}

pub async fn set_sticky_posts(conn: &mut PgConnection, ids: &[i64]) -> Result<(), sqlx::Error> {
    let encoded = php::encode(&PhpValue::from_int_list(ids));
    set_option(conn, STICKY_POSTS, &encoded).await
}

/// Site offset from UTC in hours; missing option means 0.
pub async fn gmt_offset(conn: &mut PgConnection) -> Result<f64, sqlx::Error> {
    Ok(get_option(conn, GMT_OFFSET)
        .await?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0.0))
}

/// Role definitions blob: role name -> {name, capabilities}.
pub async fn user_roles(conn: &mut PgConnection) -> Result<PhpValue, sqlx::Error> {
    let Some(raw) = get_option(conn, USER_ROLES).await? else {
        return Ok(PhpValue::Arr(Vec::new()));
    };
    Ok(php::decode(&raw).unwrap_or(PhpValue::Arr(Vec::new())))
}
