//! HTTP routes for Wicket

pub mod admin_users;
pub mod auth_routes;
pub mod health;
pub mod pki_routes;

pub use admin_users::{
    handle_active_users, handle_delete_user, handle_list_users, handle_patch_user,
};
pub use auth_routes::{handle_register, handle_token, handle_verify_token};
pub use health::{health_check, root_banner};
pub use pki_routes::{handle_challenge, handle_sign, handle_verify};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::types::WicketError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Uniform error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Uniform success payload for operations with nothing else to say
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub(crate) fn error_json(status: StatusCode, error: &str, code: Option<&str>) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(str::to_string),
        },
    )
}

/// Map an internal error to a response without leaking detail
pub(crate) fn internal_error(e: WicketError) -> Response<BoxBody> {
    match e {
        WicketError::NoAvailableAccounts => error_json(
            StatusCode::SERVICE_UNAVAILABLE,
            "No available accounts",
            Some("POOL_EXHAUSTED"),
        ),
        WicketError::Database(_) => {
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Database error", Some("DB_ERROR"))
        }
        _ => error_json(StatusCode::INTERNAL_SERVER_ERROR, "Internal error", None),
    }
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, WicketError> {
    let body = req
        .collect()
        .await
        .map_err(|e| WicketError::Http(format!("Failed to read body: {e}")))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(WicketError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes).map_err(|e| WicketError::Http(format!("Invalid JSON: {e}")))
}
