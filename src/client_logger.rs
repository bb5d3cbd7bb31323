//! Logging trait for client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all API interactions passing through the [`Gemini`](crate::Gemini) client.

use crate::{GenerateContentRequest, GenerateContentResponse};

/// A trait for logging client operations.
///
/// Implement this trait to capture and record all API interactions,
/// including requests, non-streaming responses and individual streamed chunks.
///
/// # Example
///
/// ```rust,ignore
/// use smart_advisor::{ClientLogger, GenerateContentRequest, GenerateContentResponse};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &GenerateContentRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, response: &GenerateContentResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(response).unwrap()).unwrap();
///     }
///
///     fn log_stream_chunk(&self, chunk: &GenerateContentResponse) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Chunk: {}", serde_json::to_string(chunk).unwrap()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing request body, before it is sent.
    fn log_request(&self, request: &GenerateContentRequest);

    /// Log a complete response from a non-streaming `generate_content` call.
    fn log_response(&self, response: &GenerateContentResponse);

    /// Log an individual streamed chunk.
    ///
    /// This method is called for each decoded chunk received during a streaming request,
    /// in arrival order.
    fn log_stream_chunk(&self, chunk: &GenerateContentResponse);
}
