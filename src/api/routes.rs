//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::types::{
    AgentReply, ErrorResponse, HealthResponse, MessageRequest, SongVocabularyResponse,
};
use crate::agent::{Agent, AgentOutcome};
use crate::config::Config;
use crate::models::SongRecord;
use crate::store::{SharedResultStore, SqliteResultStore};
use crate::tools::generate_song_id;

/// Language stored with songs saved from agent answers.
const SAVED_LANGUAGE: &str = "japanese";

/// Shared application state.
pub struct AppState {
    pub agent: Arc<Agent>,
    pub store: SharedResultStore,
}

/// Error returned by handlers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl ToString) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Build the router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/agent", post(run_agent))
        .route("/api/songs/:song_id/vocabulary", get(song_vocabulary))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, wire up the agent and serve until the listener closes.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: SharedResultStore = Arc::new(SqliteResultStore::open(&config.database_path)?);
    store.init().await?;
    info!("Result store ready at {}", config.database_path.display());

    let agent = Agent::from_config(&config, Arc::clone(&store))?;
    let state = Arc::new(AppState {
        agent: Arc::new(agent),
        store,
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        persistent_store: state.store.is_persistent(),
    })
}

/// Run the agent and store its answer under a deterministic song id.
async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    let answer = match state.agent.process_request(&req.message_request).await {
        AgentOutcome::Final(answer) => answer,
        AgentOutcome::Error { error } => {
            tracing::warn!("Agent request failed: {}", error);
            return Err(ApiError::not_found(error));
        }
    };

    let title = answer.title().unwrap_or("Unknown");
    let artist = answer.artist().unwrap_or("Unknown");
    let song = SongRecord {
        id: generate_song_id(title, artist, Some("ja")),
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
        lyrics: answer.lyrics.clone(),
        language: Some(SAVED_LANGUAGE.to_string()),
    };

    let song_id = state
        .store
        .add_song_and_vocabulary(&song, &answer.vocabulary)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store song {}: {}", song.id, e);
            ApiError::internal(e)
        })?;
    info!(
        "Stored song {} with {} vocabulary items",
        song_id,
        answer.vocabulary.len()
    );

    Ok(Json(AgentReply {
        lyrics: answer.lyrics,
        vocabulary: answer.vocabulary,
    }))
}

async fn song_vocabulary(
    State(state): State<Arc<AppState>>,
    Path(song_id): Path<String>,
) -> Result<Json<SongVocabularyResponse>, ApiError> {
    if state
        .store
        .get_song(&song_id)
        .await
        .map_err(ApiError::internal)?
        .is_none()
    {
        return Err(ApiError::not_found(format!("Song not found: {}", song_id)));
    }

    let vocabulary = state
        .store
        .get_song_vocabulary(&song_id)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(SongVocabularyResponse {
        song_id,
        vocabulary,
    }))
}
