use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Version prefix of every API route.
pub const API_PREFIX: &str = "/v0.1";

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/workspaces", workspace_routes())
        .nest("/channels", channel_routes())
        .nest("/messages", message_routes())
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::users::register))
        .route("/login", post(handlers::users::login))
        .route("/confirm", post(handlers::users::confirm))
        .route("/forgot-password", post(handlers::users::forgot_password))
        .route("/reset-password", post(handlers::users::reset_password))
        .route("/change-email", post(handlers::users::change_email))
        .route(
            "/me",
            get(handlers::users::me).delete(handlers::users::deactivate),
        )
        .route("/{id}", get(handlers::users::get_user))
}

fn workspace_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::workspaces::list_workspaces)
                .post(handlers::workspaces::create_workspace),
        )
        .route("/create", post(handlers::workspaces::create_workspace))
        .route("/chdcreate", post(handlers::workspaces::create_child))
        .route("/topworkspaces", get(handlers::workspaces::list_top_level))
        .route(
            "/{id}",
            get(handlers::workspaces::get_workspace)
                .put(handlers::workspaces::update_workspace)
                .delete(handlers::workspaces::delete_workspace),
        )
        .route("/{id}/chdn", get(handlers::workspaces::list_children))
        .route("/{id}/getparent", get(handlers::workspaces::get_parent))
        .route("/{id}/channels", get(handlers::workspaces::get_with_channels))
        .route("/{id}/recount", post(handlers::workspaces::recount_children))
}

fn channel_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::channels::list_channels).post(handlers::channels::create_channel),
        )
        .route("/create", post(handlers::channels::create_channel))
        .route("/byname", get(handlers::channels::get_by_name))
        .route(
            "/{id}",
            get(handlers::channels::show_channel)
                .put(handlers::channels::update_channel)
                .delete(handlers::channels::delete_channel),
        )
        .route("/{id}/messages", get(handlers::channels::list_messages))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::messages::list_messages).post(handlers::messages::create_message),
        )
        .route("/create", post(handlers::messages::create_message))
        .route(
            "/{id}",
            get(handlers::messages::get_message)
                .put(handlers::messages::update_message)
                .delete(handlers::messages::delete_message),
        )
        .route("/{id}/like", post(handlers::messages::like_message))
        .route("/{id}/vote", post(handlers::messages::vote_message))
}
