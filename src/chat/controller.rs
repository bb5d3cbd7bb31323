//! The chat controller.
//!
//! [`ChatController`] runs one exchange at a time: it appends the user's message, opens a
//! reply placeholder, folds streamed fragments into it, and recovers from any failure by
//! appending a fallback notice.  A second submission while an exchange is in flight is
//! ignored.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::stream::StreamExt;

use crate::advisor::StreamingClient;
use crate::chat::config::{AdvisorConfig, DEFAULT_FALLBACK_MESSAGE, DEFAULT_GREETING};
use crate::error::{Error, Result};
use crate::observability::{
    CHAT_EXCHANGE_DURATION, CHAT_EXCHANGE_FAILURES, CHAT_EXCHANGES, CHAT_FRAGMENTS,
    CHAT_REJECTED_SUBMISSIONS,
};
use crate::render::Renderer;
use crate::transcript::{ChatMessage, MessageId, Transcript};
use crate::types::Content;

/// How often the interrupt flag is checked while waiting on the stream.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Controller settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Opening model message, if any.
    pub greeting: Option<String>,
    /// Text appended as a model message when a reply fails.
    pub fallback_message: String,
    /// Longest wait for the stream to open or for its next fragment.
    pub fragment_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_string()),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            fragment_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl From<&AdvisorConfig> for ControllerConfig {
    fn from(config: &AdvisorConfig) -> Self {
        Self {
            greeting: config.greeting.clone(),
            fallback_message: config.fallback_message.clone(),
            fragment_timeout: config.fragment_timeout,
        }
    }
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input was empty or whitespace.
    Empty,
    /// Another exchange is in flight.
    Busy,
}

/// Result of [`ChatController::submit`].
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Nothing was sent and the transcript is unchanged.
    Ignored(IgnoreReason),
    /// The reply streamed to completion.
    Completed {
        /// The user's message.
        user_id: MessageId,
        /// The finished reply.
        reply_id: MessageId,
        /// Number of fragments received.
        fragments: u64,
    },
    /// The reply failed; a fallback notice was appended.
    Failed {
        /// The user's message.
        user_id: MessageId,
        /// The placeholder, now `Failed`, holding any partial text.
        placeholder_id: MessageId,
        /// The appended fallback notice.
        fallback_id: MessageId,
        /// What went wrong.
        error: Error,
    },
    /// The user interrupted the reply.
    Interrupted {
        /// The user's message.
        user_id: MessageId,
        /// The placeholder, now `Failed`, holding any partial text.
        placeholder_id: MessageId,
    },
}

impl SubmitOutcome {
    /// True if the submission was ignored.
    pub fn is_ignored(&self) -> bool {
        matches!(self, SubmitOutcome::Ignored(_))
    }

    /// True if the reply completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }

    /// True if the reply failed and the fallback was shown.
    pub fn is_failed(&self) -> bool {
        matches!(self, SubmitOutcome::Failed { .. })
    }

    /// The error behind a failed exchange.
    pub fn error(&self) -> Option<&Error> {
        match self {
            SubmitOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Counters for one chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Messages in the transcript.
    pub message_count: usize,
    /// Exchanges that completed.
    pub completed: u64,
    /// Exchanges that failed and showed the fallback.
    pub failed: u64,
    /// Exchanges the user interrupted.
    pub interrupted: u64,
    /// Submissions ignored as empty or busy.
    pub ignored: u64,
    /// Fragments received.
    pub fragments: u64,
    /// Characters of reply text received.
    pub reply_chars: u64,
}

enum Watch<T> {
    Ready(T),
    TimedOut,
    Interrupted,
}

enum Flow {
    Finished { fragments: u64 },
    Interrupted,
}

/// Releases the in-flight gate on drop.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives exchanges between the user and a [`StreamingClient`].
pub struct ChatController<C: StreamingClient> {
    client: C,
    config: ControllerConfig,
    transcript: Mutex<Transcript>,
    in_flight: AtomicBool,
    interrupt: Option<Arc<AtomicBool>>,
    completed: AtomicU64,
    failed: AtomicU64,
    interrupted: AtomicU64,
    ignored: AtomicU64,
    fragments: AtomicU64,
    reply_chars: AtomicU64,
}

impl<C: StreamingClient> ChatController<C> {
    /// Create a controller.  The transcript opens with the configured greeting.
    pub fn new(client: C, config: ControllerConfig) -> Self {
        let transcript = match &config.greeting {
            Some(greeting) => Transcript::with_greeting(greeting.clone()),
            None => Transcript::new(),
        };
        Self {
            client,
            config,
            transcript: Mutex::new(transcript),
            in_flight: AtomicBool::new(false),
            interrupt: None,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            fragments: AtomicU64::new(0),
            reply_chars: AtomicU64::new(0),
        }
    }

    /// Attach a flag that interrupts the current reply when set.
    ///
    /// The flag is cleared at the start of every exchange.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// The streaming client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The controller settings.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// True while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// A snapshot of the transcript.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.lock().messages().to_vec()
    }

    /// The transcript as request history.
    pub fn history(&self) -> Vec<Content> {
        self.lock().history()
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.lock().len(),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            fragments: self.fragments.load(Ordering::Relaxed),
            reply_chars: self.reply_chars.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Transcript> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    fn ignore(&self, reason: IgnoreReason) -> SubmitOutcome {
        tracing::debug!(?reason, "submission ignored");
        CHAT_REJECTED_SUBMISSIONS.click();
        self.ignored.fetch_add(1, Ordering::Relaxed);
        SubmitOutcome::Ignored(reason)
    }

    fn interrupt_requested(&self, renderer: &dyn Renderer) -> bool {
        renderer.should_interrupt()
            || self
                .interrupt
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Send `input` and stream the reply into the transcript.
    ///
    /// On success `input` is cleared.  Empty input and submissions made while an exchange
    /// is in flight are ignored and leave `input` untouched.  Failures never escape: they
    /// are reported in the outcome and as a fallback message in the transcript.
    pub async fn submit(&self, input: &mut String, renderer: &mut dyn Renderer) -> SubmitOutcome {
        let prompt = input.trim();
        if prompt.is_empty() {
            return self.ignore(IgnoreReason::Empty);
        }
        let Some(_gate) = self.try_begin() else {
            return self.ignore(IgnoreReason::Busy);
        };
        let prompt = prompt.to_string();
        if let Some(flag) = &self.interrupt {
            flag.store(false, Ordering::Relaxed);
        }

        let (user_id, placeholder_id, history) = {
            let mut transcript = self.lock();
            if transcript.in_flight().is_some() {
                drop(transcript);
                return self.ignore(IgnoreReason::Busy);
            }
            let history = transcript.history();
            let user_id = transcript.push_user(prompt.clone());
            match transcript.open_placeholder() {
                Ok(placeholder_id) => (user_id, placeholder_id, history),
                Err(err) => {
                    drop(transcript);
                    tracing::warn!(error = %err, "could not open reply placeholder");
                    return self.ignore(IgnoreReason::Busy);
                }
            }
        };
        input.clear();
        tracing::debug!(user = %user_id, reply = %placeholder_id, turns = history.len(), "exchange started");
        renderer.start_reply();

        let started = Instant::now();
        let result = self
            .stream_into(placeholder_id, &prompt, &history, renderer)
            .await;
        CHAT_EXCHANGE_DURATION.add(started.elapsed().as_secs_f64());

        match result {
            Ok(Flow::Finished { fragments }) => {
                if let Err(err) = self.lock().finish(placeholder_id) {
                    tracing::warn!(error = %err, "could not finish reply");
                }
                renderer.finish_reply();
                CHAT_EXCHANGES.click();
                self.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(reply = %placeholder_id, fragments, "exchange complete");
                SubmitOutcome::Completed {
                    user_id,
                    reply_id: placeholder_id,
                    fragments,
                }
            }
            Ok(Flow::Interrupted) => {
                if let Err(err) = self.lock().fail(placeholder_id) {
                    tracing::warn!(error = %err, "could not close interrupted reply");
                }
                renderer.print_interrupted();
                self.interrupted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(reply = %placeholder_id, "exchange interrupted");
                SubmitOutcome::Interrupted {
                    user_id,
                    placeholder_id,
                }
            }
            Err(error) => {
                tracing::warn!(reply = %placeholder_id, error = %error, "reply failed");
                let fallback_id = {
                    let mut transcript = self.lock();
                    if let Err(err) = transcript.fail(placeholder_id) {
                        tracing::warn!(error = %err, "could not close failed reply");
                    }
                    transcript.push_model(self.config.fallback_message.clone())
                };
                renderer.finish_reply();
                renderer.print_fallback(&self.config.fallback_message);
                CHAT_EXCHANGE_FAILURES.click();
                self.failed.fetch_add(1, Ordering::Relaxed);
                SubmitOutcome::Failed {
                    user_id,
                    placeholder_id,
                    fallback_id,
                    error,
                }
            }
        }
    }

    async fn stream_into(
        &self,
        placeholder_id: MessageId,
        prompt: &str,
        history: &[Content],
        renderer: &mut dyn Renderer,
    ) -> Result<Flow> {
        let open = self.client.stream_reply(prompt, history);
        let mut stream = match self.watch(open, renderer).await {
            Watch::Ready(stream) => stream?,
            Watch::TimedOut => return Err(self.timed_out("opening the reply stream")),
            Watch::Interrupted => return Ok(Flow::Interrupted),
        };

        let mut fragments = 0u64;
        loop {
            let fragment = match self.watch(stream.next(), renderer).await {
                Watch::Ready(Some(fragment)) => fragment?,
                Watch::Ready(None) => return Ok(Flow::Finished { fragments }),
                Watch::TimedOut => return Err(self.timed_out("waiting for the next fragment")),
                Watch::Interrupted => return Ok(Flow::Interrupted),
            };
            self.lock().append_fragment(placeholder_id, &fragment)?;
            renderer.print_fragment(&fragment);
            fragments += 1;
            CHAT_FRAGMENTS.click();
            self.fragments.fetch_add(1, Ordering::Relaxed);
            self.reply_chars
                .fetch_add(fragment.chars().count() as u64, Ordering::Relaxed);
        }
    }

    fn timed_out(&self, what: &str) -> Error {
        let secs = self.config.fragment_timeout.map(|t| t.as_secs_f64());
        Error::timeout(format!("timed out {what}"), secs)
    }

    /// Await `fut`, giving up on the fragment timeout or an interrupt.
    async fn watch<F: Future>(&self, fut: F, renderer: &mut dyn Renderer) -> Watch<F::Output> {
        let interrupted = async move {
            while !self.interrupt_requested(&*renderer) {
                tokio::time::sleep(INTERRUPT_POLL).await;
            }
        };
        let deadline = async {
            match self.config.fragment_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = interrupted => Watch::Interrupted,
            out = fut => Watch::Ready(out),
            _ = deadline => Watch::TimedOut,
        }
    }
}
