use crate::db::DbPool;
use crate::db::models::{Ban, NewOauthIdentity, NewUser, NewUserPermission, OauthIdentity, User, UserPermission};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

/// Thin query interface over the auth store. Every function
/// takes its own connection from the pool — callers never see a diesel type.
pub fn find_by_username(pool: &DbPool, name: &str) -> Result<Option<User>, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    users
        .filter(username.eq(name))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
}

pub fn find_by_email(pool: &DbPool, addr: &str) -> Result<Option<User>, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    users
        .filter(email.eq(addr))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
}

pub fn find_by_id(pool: &DbPool, uid: Uuid) -> Result<Option<User>, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    users
        .filter(id.eq(uid))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
}

pub fn exists_by_username(pool: &DbPool, name: &str) -> Result<bool, diesel::result::Error> {
    Ok(find_by_username(pool, name)?.is_some())
}

pub fn exists_by_email(pool: &DbPool, addr: &str) -> Result<bool, diesel::result::Error> {
    Ok(find_by_email(pool, addr)?.is_some())
}

pub fn insert_user(pool: &DbPool, new_user: NewUser) -> Result<User, diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::insert_into(users)
        .values(&new_user)
        .get_result(&mut conn)
}

pub fn record_login(pool: &DbPool, uid: Uuid, ip: Option<&str>, token: &str) -> Result<(), diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::update(users.filter(id.eq(uid)))
        .set((
            last_ip.eq(ip),
            last_token.eq(token),
            last_login.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;
    Ok(())
}

pub fn clear_token(pool: &DbPool, uid: Uuid) -> Result<(), diesel::result::Error> {
    use crate::schema::users::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::update(users.filter(id.eq(uid)))
        .set(last_token.eq(None::<String>))
        .execute(&mut conn)?;
    Ok(())
}

pub fn list_permissions(pool: &DbPool, uid: Uuid) -> Result<Vec<UserPermission>, diesel::result::Error> {
    use crate::schema::user_permissions::dsl::*;
    let mut conn = pool.get().expect("db pool exhausted");
    user_permissions
        .filter(user_id.eq(uid))
        .select(UserPermission::as_select())
        .load(&mut conn)
}

/// Idempotent: repeating the same `(user, permission)` twice leaves exactly
/// one row, enforced by the `UNIQUE` constraint.
pub fn grant_permission(pool: &DbPool, uid: Uuid, permission: &str, minrole: i32) -> Result<(), diesel::result::Error> {
    use crate::schema::user_permissions::dsl;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::insert_into(dsl::user_permissions)
        .values(NewUserPermission {
            user_id: uid,
            permission: permission.to_string(),
            minrole,
        })
        .on_conflict((dsl::user_id, dsl::permission))
        .do_update()
        .set(dsl::minrole.eq(minrole))
        .execute(&mut conn)?;
    Ok(())
}

pub fn insert_ban(
    pool: &DbPool,
    uid: Uuid,
    reason: &str,
    banned_by: Option<Uuid>,
    expires_at: Option<chrono::NaiveDateTime>,
    permaban: bool,
) -> Result<Ban, diesel::result::Error> {
    use crate::schema::bans::dsl;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::insert_into(dsl::bans)
        .values((
            dsl::user_id.eq(uid),
            dsl::reason.eq(reason),
            dsl::banned_by.eq(banned_by),
            dsl::expires_at.eq(expires_at),
            dsl::permaban.eq(permaban),
        ))
        .get_result(&mut conn)
}

pub fn active_ban_for(pool: &DbPool, uid: Uuid) -> Result<Option<Ban>, diesel::result::Error> {
    use crate::schema::bans::dsl;
    let mut conn = pool.get().expect("db pool exhausted");
    let now = Utc::now().naive_utc();
    dsl::bans
        .filter(dsl::user_id.eq(uid))
        .filter(dsl::permaban.eq(true).or(dsl::expires_at.gt(now)))
        .select(Ban::as_select())
        .first(&mut conn)
        .optional()
}

pub fn find_by_oauth_identity(
    pool: &DbPool,
    provider: &str,
    provider_id: &str,
) -> Result<Option<User>, diesel::result::Error> {
    use crate::schema::oauth_identities::dsl as oi;
    use crate::schema::users::dsl as u;
    let mut conn = pool.get().expect("db pool exhausted");
    u::users
        .inner_join(oi::oauth_identities.on(oi::user_id.eq(u::id)))
        .filter(oi::provider.eq(provider))
        .filter(oi::provider_id.eq(provider_id))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
}

pub fn upsert_oauth_identity(
    pool: &DbPool,
    uid: Uuid,
    provider: &str,
    provider_id: &str,
) -> Result<OauthIdentity, diesel::result::Error> {
    use crate::schema::oauth_identities::dsl;
    let mut conn = pool.get().expect("db pool exhausted");
    diesel::insert_into(dsl::oauth_identities)
        .values(NewOauthIdentity {
            user_id: uid,
            provider: provider.to_string(),
            provider_id: provider_id.to_string(),
        })
        .on_conflict((dsl::provider, dsl::provider_id))
        .do_update()
        .set(dsl::user_id.eq(uid))
        .get_result(&mut conn)
}
