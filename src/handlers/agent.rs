//! Non-streaming voice agent over HTTP.
//!
//! `POST /agent/chat/{session_id}` takes a complete recording as multipart
//! form data and runs the batch pipeline: upload-and-poll transcription, an
//! LLM turn over the session's server-side history, then Murf synthesis. The
//! response carries the Murf clip URL rather than audio bytes.
//!
//! Unlike the realtime path, vendor keys come from the server environment,
//! and history lives in a shared map keyed by the caller-chosen session id.
//! Any pipeline failure degrades to a canned MP3 response flagged with an
//! `X-Error: true` header, so voice-only clients always get something to
//! play.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info};

use crate::core::llm::{GeminiClient, Persona};
use crate::core::stt::{BatchTranscriber, BatchTranscriberConfig};
use crate::core::tts::{MurfTts, TtsConfig};
use crate::dispatch::LLM_FALLBACK;
use crate::errors::AppError;
use crate::session::Turn;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgentChatResponse {
    pub audio_url: String,
    pub user_query_text: String,
    pub llm_response_text: String,
}

pub async fn agent_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> Response {
    let audio = match read_audio_part(multipart).await {
        Ok(audio) => audio,
        Err(e) => return e.into_response(),
    };

    match run_pipeline(&state, &session_id, audio).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            error!(session_id = %session_id, "Agent pipeline failed: {}", e);
            fallback_response(&state)
        }
    }
}

/// Pull the `audio_file` part out of the multipart body.
async fn read_audio_part(mut multipart: Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("audio_file") {
            return field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("failed to read audio: {e}")));
        }
    }
    Err(AppError::BadRequest(
        "missing 'audio_file' form field".to_string(),
    ))
}

async fn run_pipeline(
    state: &AppState,
    session_id: &str,
    audio: Bytes,
) -> Result<AgentChatResponse, AppError> {
    let config = &state.config;
    let assemblyai_key = config
        .assemblyai_api_key
        .clone()
        .ok_or_else(|| AppError::Internal("ASSEMBLYAI_API_KEY not configured".to_string()))?;
    let gemini_key = config
        .gemini_api_key
        .clone()
        .ok_or_else(|| AppError::Internal("GEMINI_API_KEY not configured".to_string()))?;
    let murf_key = config
        .murf_api_key
        .clone()
        .ok_or_else(|| AppError::Internal("MURF_API_KEY not configured".to_string()))?;

    // Transcribe.
    let mut stt_config = BatchTranscriberConfig::new(assemblyai_key);
    if let Some(endpoint) = &config.endpoints.stt_api {
        stt_config.endpoint = endpoint.clone();
    }
    let transcriber = BatchTranscriber::new(stt_config, state.http.clone())
        .map_err(|e| AppError::Vendor(e.to_string()))?;
    let transcript = transcriber
        .transcribe(audio)
        .await
        .map_err(|e| AppError::Vendor(e.to_string()))?;
    if transcript.trim().is_empty() {
        return Err(AppError::BadRequest("no speech detected".to_string()));
    }

    info!(session_id = %session_id, "Agent transcript: {}", transcript);

    // LLM over the stored history for this id.
    let history = state
        .agent_histories
        .get(session_id)
        .map(|entry| entry.clone())
        .unwrap_or_default();

    let llm = GeminiClient::new(
        gemini_key,
        config.endpoints.gemini.clone(),
        state.http.clone(),
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    let reply = match llm
        .chat(Persona::default().system_prompt(), &history, &transcript)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            error!("Agent LLM call failed: {}", e);
            LLM_FALLBACK.to_string()
        }
    };

    // Synthesize, keeping only the vendor URL.
    let mut tts_config = TtsConfig::new(murf_key);
    tts_config.endpoint = config.endpoints.murf.clone();
    let tts = MurfTts::new(tts_config, state.http.clone())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let audio_url = tts
        .generate_url(&reply)
        .await
        .map_err(|e| AppError::Vendor(e.to_string()))?;

    // Record the exchange only after the whole pipeline succeeded.
    let mut entry = state
        .agent_histories
        .entry(session_id.to_string())
        .or_default();
    entry.push(Turn::user(&transcript));
    entry.push(Turn::assistant(&reply));

    Ok(AgentChatResponse {
        audio_url,
        user_query_text: transcript,
        llm_response_text: reply,
    })
}

/// Canned MP3 with `X-Error: true`, so the client still plays an apology.
fn fallback_response(state: &AppState) -> Response {
    let body = state
        .config
        .fallback_audio_path
        .as_ref()
        .and_then(|path| std::fs::read(path).ok())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::HeaderName::from_static("x-error"), "true"),
        ],
        body,
    )
        .into_response()
}
