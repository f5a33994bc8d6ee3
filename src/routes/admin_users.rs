//! Identity administration routes
//!
//! - GET    /users         - list identities (secrets redacted)
//! - GET    /users/active  - count of online sessions
//! - DELETE /users/:email  - remove an identity
//! - PATCH  /users/:email  - update allow-listed fields
//!
//! PATCH accepts an explicit allow-list of mutable fields, each with its
//! own handling; unknown fields are rejected outright. Toggling
//! passwordless login binds or releases a key-pool wallet identity.

use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Role;
use crate::db::schemas::UserDoc;
use crate::routes::{
    error_json, internal_error, json_response, parse_json_body, BoxBody, SuccessResponse,
};
use crate::server::AppState;

/// Identity view with credentials and private key material stripped
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    #[serde(rename = "isPWLess")]
    pub is_pwless: bool,
    pub is_online: bool,
}

impl From<UserDoc> for UserSummary {
    fn from(user: UserDoc) -> Self {
        Self {
            username: user.username,
            email: user.email,
            phone: user.phone,
            role: user.role,
            blockchain_address: user.blockchain_address,
            public_key: user.public_key,
            did: user.did,
            is_pwless: user.is_pwless,
            is_online: user.is_online,
        }
    }
}

#[derive(Debug, Serialize)]
struct ActiveUsersResponse {
    active_users: usize,
}

/// Allow-listed mutable fields. Unknown fields are a client error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UserPatch {
    username: Option<String>,
    phone: Option<String>,
    role: Option<Role>,
    #[serde(rename = "isPWLess")]
    is_pwless: Option<bool>,
}

/// GET /users
pub async fn handle_list_users(state: Arc<AppState>) -> Response<BoxBody> {
    match state.store.list_all().await {
        Ok(users) => {
            let summaries: Vec<UserSummary> = users.into_iter().map(UserSummary::from).collect();
            json_response(StatusCode::OK, &summaries)
        }
        Err(e) => internal_error(e),
    }
}

/// GET /users/active
pub async fn handle_active_users(state: Arc<AppState>) -> Response<BoxBody> {
    match state.auth.active_sessions().await {
        Ok(active_users) => json_response(StatusCode::OK, &ActiveUsersResponse { active_users }),
        Err(e) => internal_error(e),
    }
}

/// DELETE /users/:email
pub async fn handle_delete_user(state: Arc<AppState>, email: &str) -> Response<BoxBody> {
    match state.store.delete(email).await {
        Ok(true) => json_response(
            StatusCode::OK,
            &SuccessResponse {
                success: true,
                message: "User deleted".into(),
            },
        ),
        Ok(false) => error_json(StatusCode::NOT_FOUND, "User not found", None),
        Err(e) => internal_error(e),
    }
}

/// PATCH /users/:email
pub async fn handle_patch_user(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    email: &str,
) -> Response<BoxBody> {
    let patch: UserPatch = match parse_json_body(req).await {
        Ok(p) => p,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    let mut user = match state.store.find_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => return error_json(StatusCode::NOT_FOUND, "User not found", None),
        Err(e) => return internal_error(e),
    };

    if let Some(username) = patch.username {
        user.username = username;
    }
    if let Some(phone) = patch.phone {
        user.phone = phone;
    }
    if let Some(role) = patch.role {
        user.role = role;
    }

    if let Err(e) = state.store.update(&user).await {
        return internal_error(e);
    }

    // Wallet binding last: it re-reads and persists under the allocator
    // lock, so the plain-field update above must already be stored.
    match patch.is_pwless {
        Some(true) => {
            if let Err(e) = state.auth.enable_passwordless(email).await {
                return internal_error(e);
            }
        }
        Some(false) => {
            if let Err(e) = state.auth.disable_passwordless(email).await {
                return internal_error(e);
            }
        }
        None => {}
    }

    match state.store.find_by_email(email).await {
        Ok(Some(updated)) => json_response(StatusCode::OK, &UserSummary::from(updated)),
        Ok(None) => error_json(StatusCode::NOT_FOUND, "User not found", None),
        Err(e) => internal_error(e),
    }
}
