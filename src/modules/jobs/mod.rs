use axum::Router;
use axum::routing::{get, put};
use crate::state::AppState;
use axum::middleware;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router(state: AppState) -> axum::Router<AppState> {
    let public_routes = Router::new()
        .route("/{id}", get(handler::get_job));

    let callback_routes = Router::new()
        .route("/{id}/status", put(handler::update_status))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::callback_auth,
        ));

    public_routes.merge(callback_routes)
}
