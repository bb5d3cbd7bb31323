//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! `streamGenerateContent?alt=sse` replies with one `data:` line per event, each carrying a
//! complete JSON [`GenerateContentResponse`].  A failure after the stream has started arrives
//! as a `data:` line whose JSON has a top-level `error` object.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::{Error, GenerateContentResponse, Result};

/// Process a stream of bytes into a stream of response chunks.
///
/// This function takes a byte stream from an HTTP response and converts it into a stream of
/// parsed [`GenerateContentResponse`] objects, handling SSE framing, buffering, multi-byte
/// characters split across reads, and error conditions.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });
    decode_sse(stream)
}

/// Decode SSE from a stream of already-converted byte chunks.
pub(crate) fn decode_sse<S>(stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send + 'static,
{
    let state = DecodeState {
        stream,
        buffer: String::new(),
        pending: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            // First check if we have a complete event in the buffer
            if let Some((event, remaining)) = extract_event(&state.buffer) {
                state.buffer = remaining;
                match event {
                    Some(event) => return Some((event, state)),
                    None => continue,
                }
            }

            if state.done {
                return None;
            }

            // Read more data
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    if let Err(e) = state.push(&bytes) {
                        state.done = true;
                        state.buffer.clear();
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if !state.pending.is_empty() {
                        state.buffer.clear();
                        return Some((
                            Err(Error::encoding(
                                "stream ended inside a UTF-8 sequence",
                                None,
                            )),
                            state,
                        ));
                    }
                    // A final event may be missing its trailing blank line.
                    if !state.buffer.trim().is_empty() {
                        state.buffer.push_str("\n\n");
                        continue;
                    }
                    return None;
                }
            }
        }
    })
}

struct DecodeState<S> {
    stream: S,
    buffer: String,
    pending: Vec<u8>,
    done: bool,
}

impl<S> DecodeState<S> {
    /// Append raw bytes, holding back an incomplete trailing UTF-8 sequence.
    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };
        let rest = self.pending.split_off(valid);
        let text = std::mem::replace(&mut self.pending, rest);
        // The prefix was validated above.
        self.buffer.push_str(std::str::from_utf8(&text)?);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        Ok(())
    }
}

/// The `error` member of an in-stream failure.  Only the well-formed shape is typed; anything
/// else under a top-level `error` key is still a failure.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Extract a complete SSE event from a buffer string.
///
/// Returns `None` when the buffer holds no complete event.  Otherwise returns the event (or
/// `None` for comment-only and data-less events) together with the unconsumed remainder.
fn extract_event(buffer: &str) -> Option<(Option<Result<GenerateContentResponse>>, String)> {
    let (event_text, rest) = buffer.split_once("\n\n")?;
    let rest = rest.to_string();

    let mut event_type = None;
    let mut data: Option<String> = None;
    for line in event_text.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    let Some(data) = data else {
        return Some((None, rest));
    };
    if event_type == Some("error") {
        return Some((Some(Err(Error::streaming(data, None))), rest));
    }
    Some((Some(parse_data(&data)), rest))
}

fn parse_data(data: &str) -> Result<GenerateContentResponse> {
    let mut value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        Error::serialization(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;
    let Some(error) = value.as_object_mut().and_then(|obj| obj.remove("error")) else {
        return serde_json::from_value(value).map_err(|e| {
            Error::serialization(
                format!("Failed to parse event JSON: {e}"),
                Some(Box::new(e)),
            )
        });
    };
    Err(stream_error(error))
}

fn stream_error(error: serde_json::Value) -> Error {
    match serde_json::from_value::<ErrorBody>(error.clone()) {
        Ok(body) => {
            let message = body
                .message
                .unwrap_or_else(|| "stream aborted by the service".to_string());
            match body.code {
                Some(code) => Error::from_status(code, body.status, message, None, None),
                None => Error::streaming(message, None),
            }
        }
        Err(_) => {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .or_else(|| error.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("stream aborted by the service: {error}"));
            Error::streaming(message, None)
        }
    }
}
