//! HTTP API
//!
//! JSON endpoints for questions, votes and tallies, plus admin-only state
//! export/import. Every route sits behind the voter token middleware.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{self, AdminAuthConfig, Owner};
use crate::error::{PollError, PollJson, PollResult};
use crate::identity;
use crate::ratelimit;
use crate::state::export::{PollSnapshot, SnapshotError};
use crate::state::AppState;
use crate::types::*;

/// Build the application router
pub fn router(state: Arc<AppState>, admin: Arc<AdminAuthConfig>) -> Router {
    // Admin routes (with HTTP Basic Auth)
    let admin_routes = Router::new()
        .route("/api/state/export", get(export_state))
        .route("/api/state/import", post(import_state))
        .layer(middleware::from_fn_with_state(
            admin,
            auth::admin_auth_middleware,
        ));

    // Vote submission is rate limited per voter token
    let vote_routes = Router::new()
        .route("/api/questions/{id}/votes", post(cast_vote))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            ratelimit::vote_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/questions", get(list_questions).post(create_question))
        .route(
            "/api/questions/{id}",
            get(get_question).delete(delete_question),
        )
        .route("/api/questions/{id}/tally", get(get_tally))
        .merge(vote_routes)
        .merge(admin_routes)
        // Wraps every route above, so every response carries the voter cookie
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity::voter_token_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

/// GET /api/questions
///
/// Questions owned by the authenticated caller.
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    owner: Owner,
) -> PollResult<Json<Vec<Question>>> {
    let questions = state.list_questions(owner.id()).await?;
    Ok(Json(questions))
}

/// POST /api/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    PollJson(input): PollJson<CreateQuestion>,
) -> PollResult<(StatusCode, Json<Question>)> {
    let question = state.create_question(owner.id(), input).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// GET /api/questions/{id}
///
/// The question, whether the caller owns it, and the caller's tally.
pub async fn get_question(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Extension(voter): Extension<VoterToken>,
    Path(id): Path<QuestionId>,
) -> PollResult<Json<QuestionView>> {
    let view = state.view_question(&id, owner.id(), &voter).await?;
    view.map(Json).ok_or(PollError::NotFound(id))
}

/// DELETE /api/questions/{id}
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    Path(id): Path<QuestionId>,
) -> PollResult<StatusCode> {
    state.delete_question(owner.id(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/questions/{id}/votes
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Extension(voter): Extension<VoterToken>,
    Path(id): Path<QuestionId>,
    PollJson(body): PollJson<CastVote>,
) -> PollResult<(StatusCode, Json<VoteReceipt>)> {
    let receipt = state.submit_vote(&id, &voter, body.choice).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/questions/{id}/tally
pub async fn get_tally(
    State(state): State<Arc<AppState>>,
    Extension(voter): Extension<VoterToken>,
    Path(id): Path<QuestionId>,
) -> PollResult<Json<Tally>> {
    let tally = state.tally(&id, &voter).await?;
    tally.map(Json).ok_or(PollError::NotFound(id))
}

/// GET /api/state/export
pub async fn export_state(
    State(state): State<Arc<AppState>>,
) -> PollResult<Json<PollSnapshot>> {
    match state.export_snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(SnapshotError::Store(e)) => Err(e),
        Err(e) => Err(PollError::Storage(format!("Export failed: {}", e))),
    }
}

/// POST /api/state/import
///
/// Replaces every question and vote with the snapshot.
pub async fn import_state(
    State(state): State<Arc<AppState>>,
    PollJson(snapshot): PollJson<PollSnapshot>,
) -> PollResult<Response> {
    match state.import_snapshot(snapshot).await {
        Ok(()) => Ok((StatusCode::OK, "State imported successfully").into_response()),
        Err(SnapshotError::Store(e)) => Err(e),
        Err(e) => {
            tracing::warn!("State import rejected: {}", e);
            Err(PollError::BadRequest(format!("Import failed: {}", e)))
        }
    }
}
