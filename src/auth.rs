use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sqlx::{PgConnection, PgPool};

use crate::capabilities::{self, CurrentUser};
use crate::error::ApiError;
use crate::models::UserRow;
use crate::php::PhpValue;
use crate::store::{options, users};

/// Request principal, or None for anonymous. Malformed or unverifiable
/// credentials read as anonymous, never as an error; only transport
/// failures reject.
pub struct MaybeUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    PgPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        else {
            return Ok(MaybeUser(None));
        };

        let Some((login, secret)) = decode_basic(header) else {
            return Ok(MaybeUser(None));
        };

        let pool = PgPool::from_ref(state);
        let mut conn = pool.acquire().await.map_err(ApiError::Database)?;
        let user = authenticate(&mut conn, &login, &secret).await?;
        Ok(MaybeUser(user))
    }
}

/// Parses a Basic credential header into (login, secret). Any other
/// scheme, bad encoding, missing colon, or empty part yields None.
fn decode_basic(header: &str) -> Option<(String, String)> {
    let (scheme, payload) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Basic") {
        return None;
    }
    let decoded = BASE64.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (login, secret) = decoded.split_once(':')?;
    if login.is_empty() || secret.is_empty() {
        return None;
    }
    Some((login.to_string(), secret.to_string()))
}

/// Verifies the secret against every stored credential hash for the
/// account, first match wins. The credential format tolerates grouping
/// whitespace in the secret, so it is stripped before comparison.
pub async fn authenticate(
    conn: &mut PgConnection,
    login: &str,
    secret: &str,
) -> Result<Option<CurrentUser>, ApiError> {
    let Some(user) = users::find_by_login(conn, login).await? else {
        return Ok(None);
    };

    let secret: String = secret.chars().filter(|c| !c.is_whitespace()).collect();
    let hashes = users::application_password_hashes(conn, user.id).await?;

    for stored in &hashes {
        let Ok(parsed) = PasswordHash::new(stored) else {
            continue;
        };
        if Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
        {
            let principal = build_principal(conn, user).await?;
            return Ok(Some(principal));
        }
    }

    Ok(None)
}

/// Resolves the account's roles into a full principal.
async fn build_principal(conn: &mut PgConnection, user: UserRow) -> Result<CurrentUser, ApiError> {
    let assignment = match users::capability_meta(conn, user.id).await? {
        Some(raw) => crate::php::decode(&raw).unwrap_or(PhpValue::Arr(Vec::new())),
        None => PhpValue::Arr(Vec::new()),
    };
    let role_definitions = options::user_roles(conn).await?;
    let (roles, caps) = capabilities::resolve_capabilities(&assignment, &role_definitions);

    Ok(CurrentUser {
        id: user.id,
        login: user.user_login,
        roles,
        caps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(login: &str, secret: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{login}:{secret}")))
    }

    #[test]
    fn decodes_well_formed_basic_header() {
        assert_eq!(
            decode_basic(&basic("alice", "s3cret")),
            Some(("alice".into(), "s3cret".into()))
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let header = basic("alice", "pw").replacen("Basic", "basic", 1);
        assert!(decode_basic(&header).is_some());
    }

    #[test]
    fn other_schemes_read_as_anonymous() {
        assert_eq!(decode_basic("Bearer abcdef"), None);
        assert_eq!(decode_basic("Digest foo=bar"), None);
    }

    #[test]
    fn malformed_encoding_reads_as_anonymous() {
        assert_eq!(decode_basic("Basic not-base64!!!"), None);
        assert_eq!(decode_basic("Basic"), None);
    }

    #[test]
    fn secret_splits_on_first_colon_only() {
        assert_eq!(
            decode_basic(&basic("alice", "pa:ss:word")),
            Some(("alice".into(), "pa:ss:word".into()))
        );
    }

    #[test]
    fn empty_parts_read_as_anonymous() {
        assert_eq!(decode_basic(&basic("", "pw")), None);
        let no_secret = format!("Basic {}", BASE64.encode("alice:"));
        assert_eq!(decode_basic(&no_secret), None);
    }
}
