//! Actix Web HTTP server.
//!
//! Exposes the relay surface:
//! - `POST /chat` — session-aware chat, buffered or streamed
//! - `POST /v1/chat/completions` — stateless pass-through variant
//! - `GET /` — liveness

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use mallard_protocol::{ChatReply, ChatRequest, CompletionsRequest, ErrorBody, Frame};
use mallard_providers::{collect_reply, DuckChatClient, FrameStream, UpstreamError};

use crate::config::ProxyConfig;
use crate::rate_limit::FixedWindowLimiter;
use crate::session::{approx_input_tokens, MemorySessionStore, Session, SessionStore};

pub struct AppState {
    pub config: ProxyConfig,
    pub client: DuckChatClient,
    pub sessions: Arc<dyn SessionStore>,
    pub limiter: FixedWindowLimiter,
}

pub(crate) fn app_state(config: ProxyConfig) -> Result<AppState> {
    let client = DuckChatClient::new(config.to_duckchat_config())
        .context("failed to build upstream client")?;
    let limiter = FixedWindowLimiter::new(
        Duration::from_secs(config.rate_limit.window_secs),
        config.rate_limit.max_requests,
    );
    Ok(AppState {
        config,
        client,
        sessions: Arc::new(MemorySessionStore::new()),
        limiter,
    })
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(liveness))
        .route("/chat", web::post().to(handle_chat))
        .route("/v1/chat/completions", web::post().to(handle_completions));
}

pub async fn serve(config: ProxyConfig) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    info!(addr = %addr, "mallard listening");

    let state = web::Data::new(app_state(config)?);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

async fn liveness() -> &'static str {
    "mallard is up"
}

fn upstream_error_response(err: &UpstreamError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error!(error = %err, status = status.as_u16(), "request failed");
    HttpResponse::build(status).json(ErrorBody::new(err.to_string()))
}

async fn handle_chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> HttpResponse {
    if !state.limiter.try_acquire() {
        return HttpResponse::TooManyRequests().json(ErrorBody::new("Rate limit exceeded"));
    }

    let req = body.into_inner();
    let session_id = req
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut session = state.sessions.get(&session_id).await.unwrap_or_default();

    // Reuse the session's token; a fresh conversation acquires one.
    let token = match &session.vqd {
        Some(token) => token.clone(),
        None => match state.client.acquire_token().await {
            Ok(token) => token,
            Err(err) => return upstream_error_response(&err),
        },
    };
    session.vqd = Some(token.clone());
    session.push_user(&req.message);

    let model = state.client.config().resolve_model(req.model.as_deref());

    let exchange = match state.client.chat(&token, &session.turns, &model).await {
        Ok(exchange) => exchange,
        Err(err) => return upstream_error_response(&err),
    };
    if let Some(rotated) = &exchange.refreshed_token {
        session.vqd = Some(rotated.clone());
    }

    if req.stream.unwrap_or(false) {
        return forward_stream(state.sessions.clone(), session_id, session, exchange.frames);
    }

    let reply = match collect_reply(exchange.frames).await {
        Ok(reply) => reply,
        Err(err) => return upstream_error_response(&err),
    };

    session.push_assistant(&reply);
    let tokens = session.tokens;
    // The session is only written back after a fully successful exchange.
    state.sessions.put(&session_id, session).await;

    HttpResponse::Ok().json(ChatReply {
        response: reply,
        session_id,
        tokens,
        timestamp: Utc::now().timestamp_millis(),
    })
}

/// Forward message fragments to the client as they arrive.
///
/// On clean completion the accumulated reply is written back to the session,
/// so a streamed turn leaves the same history as a buffered one. A mid-stream
/// failure terminates the body with the JSON error envelope on its own line
/// instead of silently truncating; the session is left untouched.
fn forward_stream(
    sessions: Arc<dyn SessionStore>,
    session_id: String,
    mut session: Session,
    mut frames: FrameStream,
) -> HttpResponse {
    let body = async_stream::stream! {
        let mut reply = String::new();
        let mut failed = false;

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(Frame::Message(text)) => {
                    reply.push_str(&text);
                    yield Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(text));
                }
                Ok(Frame::Done) => break,
                Err(err) => {
                    failed = true;
                    warn!(error = %err, "terminating forwarded stream");
                    let envelope = serde_json::to_string(&ErrorBody::new(err.to_string()))
                        .unwrap_or_default();
                    yield Ok(web::Bytes::from(format!("\n{}\n", envelope)));
                    break;
                }
            }
        }

        if !failed {
            session.push_assistant(&reply);
            sessions.put(&session_id, session).await;
        }
    };

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header(("cache-control", "no-cache"))
        .streaming(body)
}

async fn handle_completions(
    state: web::Data<AppState>,
    body: web::Json<CompletionsRequest>,
) -> HttpResponse {
    if !state.limiter.try_acquire() {
        return HttpResponse::TooManyRequests().json(ErrorBody::new("Rate limit exceeded"));
    }

    let req = body.into_inner();
    if req.messages.is_empty() {
        return HttpResponse::BadRequest().json(ErrorBody::new("messages must not be empty"));
    }

    // This surface takes a model *name* directly; no alias table.
    let model = req
        .model
        .unwrap_or_else(|| state.client.config().default_model.clone());

    let token = match state.client.acquire_token().await {
        Ok(token) => token,
        Err(err) => return upstream_error_response(&err),
    };

    let exchange = match state.client.chat(&token, &req.messages, &model).await {
        Ok(exchange) => exchange,
        Err(err) => return upstream_error_response(&err),
    };

    let reply = match collect_reply(exchange.frames).await {
        Ok(reply) => reply,
        Err(err) => return upstream_error_response(&err),
    };

    let tokens: u64 = req
        .messages
        .iter()
        .map(|turn| approx_input_tokens(&turn.content))
        .sum::<u64>()
        + reply.len() as u64;

    HttpResponse::Ok().json(ChatReply {
        response: reply,
        session_id: Uuid::new_v4().to_string(),
        tokens,
        timestamp: Utc::now().timestamp_millis(),
    })
}
