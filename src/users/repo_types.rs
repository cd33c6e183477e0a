use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

pub const USER_TABLE: &str = "users";
pub const USER_COLUMNS: &str = "id, name, email, status, created_at, updated_at";

/// Column names usable in list filters.
pub mod columns {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";

    pub const FILTERABLE: &[&str] = &[NAME, EMAIL];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum UserStatus {
    Inactive = 0,
    Active = 1,
}

impl UserStatus {
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(UserStatus::Inactive),
            1 => Some(UserStatus::Active),
            _ => None,
        }
    }

    pub fn code(self) -> i16 {
        self as i16
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,                 // UUID v4, assigned by the service
    pub name: String,               // display name
    pub email: String,              // unique, compared case-sensitively
    pub status: UserStatus,         // inactive users cannot place orders
    pub created_at: OffsetDateTime, // set by the store on insert
    pub updated_at: OffsetDateTime, // refreshed by the store on every update
}

/// Fields supplied by the service when inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
}
