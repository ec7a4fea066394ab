use crate::auth::jwt::JwtService;
use crate::db::DbPool;
use crate::db::models::Identity;
use crate::db::repositories::auth as auth_repo;

/// Verifies a bearer token and derives the sanitised identity envelope
/// look up the user by the token's `username` claim, then attach
/// `{userId, username, permissions[]}` with `passwordHash`, `passwordSalt`,
/// `lastIp` never even read into this struct.
pub fn identity_from_token(db: &DbPool, jwt: &JwtService, token: &str) -> Option<Identity> {
    let claims = jwt.verify(token).ok()?;
    let user = auth_repo::find_by_username(db, &claims.username).ok().flatten()?;
    let permissions = auth_repo::list_permissions(db, user.id).unwrap_or_default();
    Some(Identity::from((user, permissions)))
}
