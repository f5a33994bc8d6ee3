//! Password authentication and registration routes
//!
//! - POST /token        - password login, returns a bearer token
//! - POST /verify-token - validate a token and claim the online session
//! - POST /register     - create an identity, optionally wallet-bound

use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::Role;
use crate::routes::{
    error_json, internal_error, json_response, parse_json_body, BoxBody, SuccessResponse,
};
use crate::server::AppState;
use crate::services::{NewIdentity, PasswordLogin, Registration, SessionConfirmation};

#[derive(Debug, Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    role: Role,
    token_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct VerifyTokenRequest {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: String,
    email: String,
    #[serde(default)]
    phone: String,
    password: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(rename = "isPWLess", default)]
    is_pwless: bool,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

/// POST /token
pub async fn handle_token(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: TokenRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    if body.email.is_empty() || body.password.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Missing required fields: email, password",
            None,
        );
    }

    match state.auth.password_login(&body.email, &body.password).await {
        Ok(PasswordLogin::Granted { access_token, role }) => json_response(
            StatusCode::OK,
            &TokenResponse {
                access_token,
                role,
                token_type: "bearer",
            },
        ),
        // One shape for every rejection: no hint which check failed
        Ok(PasswordLogin::Rejected) => error_json(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
            Some("INVALID_CREDENTIALS"),
        ),
        Err(e) => internal_error(e),
    }
}

/// POST /verify-token
pub async fn handle_verify_token(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: VerifyTokenRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    match state.auth.confirm_session(&body.token).await {
        Ok(SessionConfirmation::Confirmed(claims)) => {
            info!("Session claimed by {}", claims.sub);
            json_response(
                StatusCode::OK,
                &SuccessResponse {
                    success: true,
                    message: "Token is valid".into(),
                },
            )
        }
        Ok(SessionConfirmation::Rejected) => error_json(
            StatusCode::FORBIDDEN,
            "Token is invalid or expired",
            Some("INVALID_TOKEN"),
        ),
        Err(e) => internal_error(e),
    }
}

/// POST /register
pub async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, &e.to_string(), None),
    };

    if body.email.is_empty() || body.password.is_empty() || body.username.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Missing required fields: username, email, password",
            None,
        );
    }

    if !body.email.contains('@') {
        return error_json(StatusCode::BAD_REQUEST, "Invalid email", None);
    }

    if body.password.len() < 8 {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
            Some("WEAK_PASSWORD"),
        );
    }

    let result = state
        .auth
        .register(NewIdentity {
            username: body.username,
            email: body.email,
            phone: body.phone,
            password: body.password,
            role: body.role,
            pwless: body.is_pwless,
        })
        .await;

    match result {
        Ok(Registration::Created { address }) => {
            json_response(StatusCode::CREATED, &RegisterResponse { success: true, address })
        }
        Ok(Registration::AlreadyExists) => error_json(
            StatusCode::CONFLICT,
            "An account with this email already exists",
            Some("USER_EXISTS"),
        ),
        Err(e) => internal_error(e),
    }
}
