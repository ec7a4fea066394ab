use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of `users`. Never serialised directly to a client —
/// `Identity` below is the sanitised projection that is.
#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub last_ip: Option<String>,
    pub last_token: Option<String>,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = crate::schema::user_permissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub minrole: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::user_permissions)]
pub struct NewUserPermission {
    pub user_id: Uuid,
    pub permission: String,
    pub minrole: i32,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = crate::schema::oauth_identities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OauthIdentity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::oauth_identities)]
pub struct NewOauthIdentity {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_id: String,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = crate::schema::bans)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ban {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub banned_by: Option<Uuid>,
    pub expires_at: Option<NaiveDateTime>,
    pub permaban: bool,
    pub banned_at: NaiveDateTime,
}

/// Sanitised user record attached to authenticated requests.
/// Never carries `passwordHash`, `passwordSalt`, or `lastIp`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub permissions: Vec<String>,
}

impl From<(User, Vec<UserPermission>)> for Identity {
    fn from((user, perms): (User, Vec<UserPermission>)) -> Self {
        Identity {
            user_id: user.id,
            username: user.username,
            permissions: perms.into_iter().map(|p| p.permission).collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponseUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub repassword: Option<String>,
}
