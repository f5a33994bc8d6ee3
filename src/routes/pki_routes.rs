//! Passwordless (challenge-signature) authentication routes
//!
//! - GET  /challenge?address=A - issue a challenge for an address
//! - POST /sign                - verify a signed challenge
//! - POST /verify              - legacy two-step variant of /sign
//!
//! A malformed address is an input-validation error and gets a 400. A
//! failed verification is always the same uniform shape: the caller is
//! never told whether the challenge, the signature, or the identity
//! lookup failed.

use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Role;
use crate::routes::{error_json, json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::services::SignatureLogin;
use crate::wallet;

#[derive(Debug, Deserialize)]
struct ChallengeQuery {
    address: String,
}

#[derive(Debug, Serialize)]
struct ChallengeResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SignRequest {
    address: String,
    message: String,
    signature: String,
}

#[derive(Debug, Serialize)]
struct SignResponse {
    authenticated: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

/// GET /challenge?address=A
pub async fn handle_challenge(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let query: ChallengeQuery = match serde_urlencoded::from_str(req.uri().query().unwrap_or("")) {
        Ok(q) => q,
        Err(_) => {
            return error_json(
                StatusCode::BAD_REQUEST,
                "Missing required query parameter: address",
                None,
            )
        }
    };

    if !wallet::is_valid_address(&query.address) {
        return error_json(StatusCode::BAD_REQUEST, "Invalid address", None);
    }

    let message = state.auth.issue_challenge(&query.address);
    json_response(StatusCode::OK, &ChallengeResponse { message })
}

/// POST /sign
pub async fn handle_sign(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: SignRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    if !wallet::is_valid_address(&body.address) {
        return error_json(StatusCode::BAD_REQUEST, "Invalid address", None);
    }

    match state
        .auth
        .verify_challenge_signature(&body.address, &body.message, &body.signature)
        .await
    {
        Ok(SignatureLogin::Granted { .. }) => json_response(
            StatusCode::OK,
            &SignResponse {
                authenticated: true,
                message: "Signature verified".into(),
            },
        ),
        Ok(SignatureLogin::Rejected) => json_response(
            StatusCode::OK,
            &SignResponse {
                authenticated: false,
                message: "Authentication failed".into(),
            },
        ),
        Err(e) => crate::routes::internal_error(e),
    }
}

/// POST /verify (legacy two-step variant)
pub async fn handle_verify(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: SignRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    if !wallet::is_valid_address(&body.address) {
        return error_json(StatusCode::BAD_REQUEST, "Invalid address", None);
    }

    match state
        .auth
        .verify_challenge_signature(&body.address, &body.message, &body.signature)
        .await
    {
        Ok(SignatureLogin::Granted { role }) => json_response(
            StatusCode::OK,
            &VerifyResponse {
                success: true,
                role: Some(role),
            },
        ),
        Ok(SignatureLogin::Rejected) => json_response(
            StatusCode::OK,
            &VerifyResponse {
                success: false,
                role: None,
            },
        ),
        Err(e) => crate::routes::internal_error(e),
    }
}
