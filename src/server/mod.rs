//! HTTP server for Wicket

mod http;

pub use http::{run, AppState};
