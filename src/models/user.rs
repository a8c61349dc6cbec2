//! User account model returned by the create-user endpoints.

use serde::{Deserialize, Serialize};

/// Credentials handed out by the server when a user is created.
///
/// Every field is optional so that unknown response shapes still yield a
/// session; the raw body is kept alongside for login replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAccount {
    /// Whether the server reports the creation as successful
    #[serde(default)]
    pub success: Option<bool>,
    /// Server-assigned user id (UUID)
    #[serde(default)]
    pub user_id: Option<String>,
    /// Generated password, needed to log in again later
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
}
