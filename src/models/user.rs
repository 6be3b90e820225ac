use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal model – stored exactly as it lives in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash, never exposed to clients.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// What we expose to the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
        }
    }
}
