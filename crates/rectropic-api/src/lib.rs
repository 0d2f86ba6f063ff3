pub mod access;
pub mod auth;
pub mod content;
pub mod error;
pub mod lists;
pub mod middleware;
pub mod quota;
pub mod reactions;
pub mod store;
pub mod thumbnail;
pub mod token;
pub mod users;
pub mod validate;
pub mod views;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Every route the service exposes. Transport layers (CORS, tracing,
/// request timeout) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/auth/anonymous", post(auth::anonymous))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/auth/verify", post(auth::verify).get(auth::verify))
        .route("/lists", get(lists::get_lists).post(lists::create_list))
        .route(
            "/lists/{id}",
            get(lists::get_list).put(lists::update_list).delete(lists::delete_list),
        )
        .route("/lists/{id}/feed", get(content::get_feed))
        .route("/lists/{id}/invite", post(lists::invite_member))
        .route("/lists/{id}/members/{user_id}", delete(lists::remove_member))
        .route("/lists/{id}/leave", post(lists::leave_list))
        .route("/content", post(content::add_content))
        .route("/content/{id}", get(content::get_content).delete(content::delete_content))
        .route(
            "/content/{id}/reaction",
            post(reactions::set_reaction).delete(reactions::remove_reaction),
        )
        .route("/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/users/upgrade", post(users::upgrade))
        .route("/users/search", get(users::search))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
