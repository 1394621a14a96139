//! Wire-format decoding shared by the streaming adapters
//!
//! Adapters decode their provider's framing (server-sent events or
//! newline-delimited JSON) into [`Chunk`]s; [`normalize`] then turns chunks
//! into the uniform [`TokenEvent`] protocol with exactly one trailing `Done`.

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::gateway::types::{BackendError, TokenEvent, TokenStream};

/// One decoded unit of a provider stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Generated text (may be empty; empty chunks are dropped)
    Text(String),
    /// The provider's explicit end-of-stream marker
    End,
}

/// How to treat a provider stream that runs out without an explicit end marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// The provider has no end marker; running out is a normal finish
    Completes,
    /// The provider always sends an end marker; running out is an interruption
    Interrupts,
}

struct NormalizeState {
    chunks: BoxStream<'static, Result<Chunk, BackendError>>,
    full_text: String,
    exhaustion: Exhaustion,
    finished: bool,
}

/// Convert decoded chunks into token events
///
/// Non-empty text chunks become `Token`s. The end marker (or exhaustion, for
/// providers without one) becomes a single `Done` carrying the concatenated
/// text. Errors are forwarded once and end the stream.
pub fn normalize<S>(chunks: S, exhaustion: Exhaustion) -> TokenStream
where
    S: Stream<Item = Result<Chunk, BackendError>> + Send + 'static,
{
    let state = NormalizeState {
        chunks: chunks.boxed(),
        full_text: String::new(),
        exhaustion,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            let item = match state.chunks.next().await {
                Some(Ok(Chunk::Text(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    state.full_text.push_str(&text);
                    Ok(TokenEvent::Token { text })
                }
                Some(Ok(Chunk::End)) => {
                    state.finished = true;
                    Ok(TokenEvent::done(std::mem::take(&mut state.full_text)))
                }
                Some(Err(e)) => {
                    state.finished = true;
                    Err(e)
                }
                None => {
                    state.finished = true;
                    match state.exhaustion {
                        Exhaustion::Completes => {
                            Ok(TokenEvent::done(std::mem::take(&mut state.full_text)))
                        }
                        Exhaustion::Interrupts => Err(BackendError::Stream(
                            "stream closed before completion".to_string(),
                        )),
                    }
                }
            };
            return Some((item, state));
        }
    })
    .boxed()
}

struct LineState<S> {
    bytes: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Split a byte stream into non-blank text lines
///
/// Lines may span network chunks; a trailing line without a newline is
/// yielded when the byte stream ends.
pub fn ndjson_lines<S, E>(bytes: S) -> impl Stream<Item = Result<String, BackendError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: std::fmt::Display,
{
    let state = LineState {
        bytes,
        buffer: Vec::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(line), state));
            }

            if state.exhausted {
                if state.buffer.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut state.buffer);
                let line = String::from_utf8_lossy(&rest).trim().to_string();
                if line.is_empty() {
                    return None;
                }
                return Some((Ok(line), state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(BackendError::Stream(e.to_string())), state));
                }
                None => state.exhausted = true,
            }
        }
    })
}
