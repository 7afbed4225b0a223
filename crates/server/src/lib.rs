//! HTTP front end for the chain relay.
//!
//! [`app::create_app`] assembles the axum router and its tower layers; [`router`] holds the
//! request handlers and shared [`router::AppState`].

pub mod app;
pub mod middleware;
pub mod router;
