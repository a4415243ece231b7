pub mod error;
pub mod gateway;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All chat routes. Everything except `/gateway` sits behind bearer auth;
/// the gateway authenticates its own upgrade request.
pub fn router(state: AppState) -> Router {
    let thread = "/cars/{car}/threads/{owner}/{member}";

    let protected = Router::new()
        .route(
            &format!("{thread}/messages"),
            get(messages::open_thread)
                .post(messages::send_message)
                .delete(messages::clear_thread),
        )
        .route(&format!("{thread}/files"), post(messages::send_file))
        .route(&format!("{thread}/messages/{{id}}"), delete(messages::delete_message))
        .route(&format!("{thread}/messages/{{id}}/read"), post(messages::mark_read))
        .route(&format!("{thread}/messages/{{id}}/retry"), post(messages::retry_message))
        .route(&format!("{thread}/messages/{{id}}/attachment"), get(messages::get_attachment))
        .route(&format!("{thread}/reports"), post(moderation::file_report))
        .route(
            "/cars/{car}/blocks/{user}",
            post(moderation::block_user).delete(moderation::unblock_user),
        )
        .route("/reports", get(moderation::list_reports))
        .route("/reports/{id}/revised", post(moderation::mark_revised))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(gateway::ws_upgrade))
        .with_state(state);

    Router::new().merge(protected).merge(ws_route)
}
