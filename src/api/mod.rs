//! # API Module
//!
//! HTTP handlers of the playlist tuner web service.
//!
//! ## Endpoints
//!
//! ### Browser
//!
//! - [`index`] - landing page, or a redirect to the dashboard when logged in
//! - [`login`], [`callback`], [`logout`] - the Spotify authorization-code flow
//! - [`dashboard`] - list of the user's playlists
//!
//! ### JSON API
//!
//! Every `/api` handler answers with the envelope from [`response`]:
//! `{"status": "success", "data": ...}` or `{"status": "error", "message": ...}`.
//!
//! - [`me`], [`playlists`]
//! - [`analyze`], [`changes`], [`similar`], [`add_similar`]
//! - [`optimize`], [`submit_optimize`], [`task_status`]
//!
//! ### Monitoring
//!
//! - [`health`] - status and version for load balancers
//!
//! Handlers that need a logged-in user take an [`AuthSession`]; without one,
//! API routes answer `401` and browser routes redirect to `/login`.

mod auth;
mod health;
mod optimize;
mod pages;
mod playlists;
pub mod response;
pub mod session;

pub use auth::{callback, login, logout};
pub use health::health;
pub use optimize::{optimize, submit_optimize, task_status};
pub use pages::{dashboard, index};
pub use playlists::{add_similar, analyze, changes, me, playlists, similar};
pub use response::{ApiResponse, ApiResult};
pub use session::AuthSession;
