//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod events;
pub mod organizer;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(events::routes())
        .merge(checkout::routes())
        .merge(organizer::routes())
        .merge(admin::routes())
}
