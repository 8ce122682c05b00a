//! Incremental decoding of the upstream pseudo-SSE stream.
//!
//! The chat endpoint streams frames shaped `data: <json-or-sentinel>`. Two
//! delimiter conventions exist depending on deployment target:
//!
//! - [`Dialect::Sse`]: newline-delimited `data: {json}` lines with a terminal
//!   `data: [DONE]` sentinel.
//! - [`Dialect::Duckchat`]: payload chunks separated by a bare `data:` token,
//!   with the literal `[DONE]LIMT_CVRSA\n` marker stripped from the text
//!   before splitting.
//!
//! Chunk boundaries do not align with frame boundaries, so both decoders
//! carry an unterminated tail across reads. Unparseable payloads are logged
//! and skipped; an upstream error frame terminates the stream with a typed
//! failure and nothing is emitted after it.

use std::pin::Pin;

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mallard_protocol::Frame;

use crate::error::{classify_error_frame, UpstreamError};

/// Lazy sequence of decoded frames, tied to one upstream connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, UpstreamError>> + Send>>;

/// Which delimiter convention the upstream speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Generic SSE-like lines: `data: {json}`, sentinel `[DONE]`.
    Sse,
    /// Bare `data:` separators, terminator `[DONE]LIMT_CVRSA`.
    #[default]
    Duckchat,
}

const DATA_PREFIX: &str = "data:";
const SSE_DONE: &str = "[DONE]";
const DUCKCHAT_DONE: &str = "[DONE]LIMT_CVRSA\n";

/// Decode an upstream byte stream into frames.
pub fn decode<S, E>(bytes: S, dialect: Dialect) -> FrameStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    match dialect {
        Dialect::Sse => Box::pin(decode_sse(bytes)),
        Dialect::Duckchat => Box::pin(decode_duckchat(bytes)),
    }
}

/// Concatenate every message fragment into the full assistant reply.
pub async fn collect_reply(mut frames: FrameStream) -> Result<String, UpstreamError> {
    let mut reply = String::new();
    while let Some(frame) = frames.next().await {
        match frame? {
            Frame::Message(text) => reply.push_str(&text),
            Frame::Done => break,
        }
    }
    Ok(reply)
}

fn decode_sse<S, E>(bytes: S) -> impl Stream<Item = Result<Frame, UpstreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = String::new();
        let mut done = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::Stream(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                match parse_sse_line(&line)? {
                    Some(Frame::Done) => {
                        done = true;
                        yield Frame::Done;
                        break 'read;
                    }
                    Some(frame) => yield frame,
                    None => {}
                }
            }
        }

        // The connection may close on an unterminated final line.
        if !done && !buffer.trim().is_empty() {
            match parse_sse_line(&buffer)? {
                Some(frame) => yield frame,
                None => {}
            }
        }
    }
}

fn decode_duckchat<S, E>(bytes: S) -> impl Stream<Item = Result<Frame, UpstreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = String::new();
        let mut done = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::Stream(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            if buffer.contains(DUCKCHAT_DONE) {
                buffer = buffer.replace(DUCKCHAT_DONE, "");
                done = true;
            }

            // A payload is complete once the next delimiter has arrived; the
            // tail past the last delimiter stays buffered.
            while let Some(start) = buffer.find(DATA_PREFIX) {
                let after = start + DATA_PREFIX.len();
                let Some(next) = buffer[after..].find(DATA_PREFIX) else {
                    break;
                };
                let payload: String = buffer[after..after + next].to_string();
                buffer.drain(..after + next);
                if let Some(frame) = classify_payload(&payload)? {
                    yield frame;
                }
            }

            if done {
                break 'read;
            }
        }

        if buffer.contains(DUCKCHAT_DONE) {
            buffer = buffer.replace(DUCKCHAT_DONE, "");
            done = true;
        }
        if let Some(start) = buffer.find(DATA_PREFIX) {
            let payload = buffer[start + DATA_PREFIX.len()..].to_string();
            if !payload.trim().is_empty() {
                if let Some(frame) = classify_payload(&payload)? {
                    yield frame;
                }
            }
        }
        if done {
            yield Frame::Done;
        }
    }
}

/// Parse one newline-delimited line of a Dialect-A stream.
fn parse_sse_line(line: &str) -> Result<Option<Frame>, UpstreamError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.trim_start();
    if payload == SSE_DONE {
        return Ok(Some(Frame::Done));
    }
    classify_payload(payload)
}

/// Classify one JSON payload.
///
/// Parse failures are non-fatal: the frame is skipped and decoding continues.
/// An `action: "error"` frame surfaces as the typed failure from the
/// classification table.
fn classify_payload(payload: &str) -> Result<Option<Frame>, UpstreamError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, payload, "skipping unparseable frame");
            return Ok(None);
        }
    };

    if value.get("action").and_then(|a| a.as_str()) == Some("error") {
        let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or_default();
        return Err(classify_error_frame(kind));
    }

    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        if !message.is_empty() {
            return Ok(Some(Frame::Message(message.to_string())));
        }
    }

    // Housekeeping frame (role announcements, model metadata, ...): no output.
    Ok(None)
}
