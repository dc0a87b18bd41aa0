use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod admission;
pub mod completion;
pub mod dedup;
pub mod dispatcher;
pub mod dto;
pub mod handler;
pub mod launcher;
pub mod notifier;
pub mod ports;
pub mod reconciler;
pub mod scheduler;
pub mod service;


pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications/object-created", post(handler::object_created))
        .route("/admission", get(handler::admission))
}
