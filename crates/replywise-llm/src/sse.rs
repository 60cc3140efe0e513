//! Incremental decoder for OpenAI-compatible SSE completion streams.
//!
//! The wire format is newline-delimited `data: ` lines:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: {"choices":[{"delta":{"content":" world"}}],"usage":{"prompt_tokens":9,"completion_tokens":2}}
//!
//! data: [DONE]
//! ```
//!
//! [`StreamDecoder`] accepts the body in arbitrary byte chunks. Chunk
//! boundaries may fall inside a UTF-8 sequence or inside a line; the emitted
//! events are the same however the bytes are split.
//!
//! Per line:
//! - anything not starting with the literal `data: ` is ignored
//! - `[DONE]` is ignored
//! - JSON that fails to parse skips that line only
//! - `choices[0].delta.content` becomes a [`StreamEvent::Token`]
//! - `usage` is remembered and reported once, in the final
//!   [`StreamEvent::Done`]

use replywise_types::Usage;
use tokio::time::Instant;
use tracing::trace;

/// Line prefix carrying a payload. The space is required.
const DATA_PREFIX: &str = "data: ";

/// The sentinel payload that carries no event.
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of completion text.
    Token { text: String },
    /// The body is exhausted. Always the last event.
    Done { usage: Option<Usage> },
}

/// Decoder state for one response body.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of an incomplete UTF-8 sequence from the previous chunk.
    pending: Vec<u8>,
    /// Decoded text after the last newline.
    buffer: String,
    /// Every token so far, concatenated. Append-only.
    accumulated: String,
    usage: Option<Usage>,
    first_token_at: Option<Instant>,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return the tokens it completed.
    ///
    /// Returns nothing once [`finish`](Self::finish) has been called.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.process_line(&line[..pos], &mut events);
        }
        events
    }

    /// Signal end of body. Processes any unterminated final line, then
    /// emits [`StreamEvent::Done`] with the last usage seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }

        let mut events = Vec::new();
        let tail = std::mem::take(&mut self.buffer);
        if !tail.is_empty() {
            self.process_line(&tail, &mut events);
        }
        events.push(StreamEvent::Done { usage: self.usage });
        events
    }

    /// All token text decoded so far.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    /// The last usage record seen.
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// When the first token was decoded.
    pub fn first_token_at(&self) -> Option<Instant> {
        self.first_token_at
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move every complete UTF-8 sequence from `pending` into `buffer`.
    ///
    /// Invalid sequences become U+FFFD; a truncated sequence at the end is
    /// kept for the next chunk.
    fn decode_pending(&mut self) {
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    self.buffer.push_str(
                        std::str::from_utf8(&self.pending[consumed..valid_end]).unwrap_or_default(),
                    );
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + bad;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            return;
        }

        let value: serde_json::Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, "skipping malformed stream line");
                return;
            }
        };

        if let Some(text) = value
            .pointer("/choices/0/delta/content")
            .and_then(|c| c.as_str())
            .filter(|t| !t.is_empty())
        {
            if self.first_token_at.is_none() {
                self.first_token_at = Some(Instant::now());
            }
            self.accumulated.push_str(text);
            events.push(StreamEvent::Token {
                text: text.to_string(),
            });
        }

        if let Some(usage) = value.get("usage").and_then(Usage::from_value) {
            self.usage = Some(usage);
        }
    }
}
