pub mod authz;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seed;
pub mod services;
pub mod sessions;
pub mod state;
pub mod store;
pub mod utils;

use axum::{Json, Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable};

use crate::handlers::{channels, messages, users, workspaces};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Agora API",
        version = "0.1.0",
        description = "Workspaces, channels and messages with per-user read state"
    ),
    servers((url = "/v0.1")),
    paths(
        users::register,
        users::login,
        users::confirm,
        users::forgot_password,
        users::reset_password,
        users::change_email,
        users::me,
        users::deactivate,
        users::get_user,
        workspaces::list_workspaces,
        workspaces::create_workspace,
        workspaces::create_child,
        workspaces::list_top_level,
        workspaces::get_workspace,
        workspaces::list_children,
        workspaces::get_parent,
        workspaces::get_with_channels,
        workspaces::update_workspace,
        workspaces::delete_workspace,
        workspaces::recount_children,
        channels::list_channels,
        channels::get_by_name,
        channels::create_channel,
        channels::show_channel,
        channels::list_messages,
        channels::update_channel,
        channels::delete_channel,
        messages::list_messages,
        messages::create_message,
        messages::get_message,
        messages::update_message,
        messages::delete_message,
        messages::like_message,
        messages::vote_message,
    ),
    tags(
        (name = "Users", description = "Accounts, sessions and email confirmation"),
        (name = "Workspaces", description = "Workspace hierarchy"),
        (name = "Channels", description = "Channels and per-user read state"),
        (name = "Messages", description = "Messages, edits and reactions"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest(routes::API_PREFIX, routes::api_routes())
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .fallback(middleware::unknown_route)
        .method_not_allowed_fallback(middleware::unknown_route)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_context,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
