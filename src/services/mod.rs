//! Services for Wicket

pub mod auth_flow;

pub use auth_flow::{
    AuthFlowService, NewIdentity, PasswordLogin, Registration, SessionConfirmation, SignatureLogin,
};
