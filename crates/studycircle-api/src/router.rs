use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use studycircle_gateway::connection;

use crate::middleware::resolve_actor;
use crate::state::AppState;
use crate::{answers, auth, badges, chat, groups, notifications, profiles, questions, resources, subjects, suggestions};

/// Full HTTP surface: auth, content routes behind actor resolution, the
/// suggestion proxy and the chat gateway.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/functions/suggestions", post(suggestions::suggest))
        .route("/gateway", get(gateway_upgrade))
        .route("/subjects", get(subjects::list))
        .route("/badges", get(badges::catalog))
        .with_state(state.clone());

    let actor_routes = Router::new()
        .route("/profiles/me", get(profiles::me).patch(profiles::update_me))
        .route("/profiles/{user_id}", get(profiles::get))
        .route("/users/{user_id}/badges", get(badges::user_badges))
        .route("/badges/progress", get(badges::my_progress))
        .route("/questions", get(questions::list).post(questions::create))
        .route("/questions/{id}", get(questions::get).patch(questions::update))
        .route("/questions/{id}/upvote", post(questions::upvote))
        .route("/questions/{id}/answers", get(answers::list).post(answers::create))
        .route("/questions/{id}/answers/{answer_id}/accept", post(answers::accept))
        .route("/answers/{id}", patch(answers::update))
        .route("/answers/{id}/vote", post(answers::vote))
        .route("/groups", get(groups::list).post(groups::create))
        .route("/groups/{id}", get(groups::get).patch(groups::update))
        .route("/groups/{id}/join", post(groups::join))
        .route("/groups/{id}/members", get(groups::members))
        .route("/groups/{id}/invite", post(groups::invite))
        .route("/groups/{id}/messages", get(chat::list).post(chat::send))
        .route("/resources", get(resources::list).post(resources::create))
        .route("/resources/{id}", get(resources::get).patch(resources::update))
        .route("/resources/{id}/download", post(resources::download))
        .route("/resources/{id}/share", post(resources::share))
        .route("/resources/{id}/rate", post(resources::rate))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::count_unread))
        .route("/notifications/read-all", post(notifications::read_all))
        .route("/notifications/{id}/read", post(notifications::read_one))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_actor))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(actor_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn gateway_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let db = state.db.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, db, jwt_secret))
}
