use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::sql::UpdateField;
use crate::validation::{Kind, Rule, Schema, Validated};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

/// Columns selected for every user read. Never includes the password hash.
pub const USER_COLUMNS: &str = "username, first_name, last_name, email, is_admin";

/// A user plus the ids of the jobs they applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub jobs: Vec<i32>,
}

/// Stored credentials, only read while logging in.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNew {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_admin: bool,
}

const USERNAME: Kind = Kind::Text { min_len: 1, max_len: 25 };
const PASSWORD: Kind = Kind::Text { min_len: 5, max_len: 20 };
const NAME: Kind = Kind::Text { min_len: 1, max_len: 30 };
const EMAIL: Kind = Kind::Email { min_len: 6, max_len: 60 };

/// Admin-created user; may be an admin.
pub const USER_NEW_SCHEMA: Schema = Schema::new(&[
    Rule::required("username", USERNAME),
    Rule::required("password", PASSWORD),
    Rule::required("firstName", NAME),
    Rule::required("lastName", NAME),
    Rule::required("email", EMAIL),
    Rule::optional("isAdmin", Kind::Boolean),
]);

/// Self-registration; never an admin.
pub const USER_REGISTER_SCHEMA: Schema = Schema::new(&[
    Rule::required("username", USERNAME),
    Rule::required("password", PASSWORD),
    Rule::required("firstName", NAME),
    Rule::required("lastName", NAME),
    Rule::required("email", EMAIL),
]);

/// Fields a `PATCH /users/:username` may set.
///
/// `isAdmin` is accepted for any caller that passes the self-or-admin gate,
/// so a user editing their own record can grant themselves admin. Routes
/// that must not allow this need a stricter schema or gate.
pub const USER_UPDATE_SCHEMA: Schema = Schema::new(&[
    Rule::optional("firstName", NAME),
    Rule::optional("lastName", NAME),
    Rule::optional("password", PASSWORD),
    Rule::optional("email", EMAIL),
    Rule::optional("isAdmin", Kind::Boolean),
]);

pub const USER_AUTH_SCHEMA: Schema = Schema::new(&[
    Rule::required("username", USERNAME),
    Rule::required("password", Kind::Text { min_len: 1, max_len: 20 }),
]);

impl From<Validated> for UserNew {
    fn from(v: Validated) -> Self {
        Self {
            username: v.text("username").unwrap_or_default(),
            password: v.text("password").unwrap_or_default(),
            first_name: v.text("firstName").unwrap_or_default(),
            last_name: v.text("lastName").unwrap_or_default(),
            email: v.text("email").unwrap_or_default(),
            is_admin: v.bool("isAdmin").unwrap_or(false),
        }
    }
}

/// User columns open to partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    FirstName,
    LastName,
    Password,
    Email,
    IsAdmin,
}

impl UpdateField for UserField {
    const ALL: &'static [Self] = &[
        UserField::FirstName,
        UserField::LastName,
        UserField::Password,
        UserField::Email,
        UserField::IsAdmin,
    ];

    fn field_name(self) -> &'static str {
        match self {
            UserField::FirstName => "firstName",
            UserField::LastName => "lastName",
            UserField::Password => "password",
            UserField::Email => "email",
            UserField::IsAdmin => "isAdmin",
        }
    }

    fn column_name(self) -> &'static str {
        match self {
            UserField::FirstName => "first_name",
            UserField::LastName => "last_name",
            UserField::IsAdmin => "is_admin",
            other => other.field_name(),
        }
    }
}
