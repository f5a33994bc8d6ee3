//! Authentication and authorization for Wicket
//!
//! Provides:
//! - JWT session token generation and validation
//! - Password hashing with Argon2
//! - Role derivation policy for identities

pub mod jwt;
pub mod password;
pub mod roles;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{hash_password, verify_password};
pub use roles::Role;
