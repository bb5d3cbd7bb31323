use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("advisor.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("advisor.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("advisor.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("advisor.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("advisor.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("advisor.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("advisor.stream.ttfb_seconds");

pub(crate) static CHAT_EXCHANGES: Counter = Counter::new("advisor.chat.exchanges");
pub(crate) static CHAT_EXCHANGE_FAILURES: Counter = Counter::new("advisor.chat.exchange_failures");
pub(crate) static CHAT_REJECTED_SUBMISSIONS: Counter =
    Counter::new("advisor.chat.rejected_submissions");
pub(crate) static CHAT_FRAGMENTS: Counter = Counter::new("advisor.chat.fragments");
pub(crate) static CHAT_EXCHANGE_DURATION: Moments =
    Moments::new("advisor.chat.exchange_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&CHAT_EXCHANGES);
    collector.register_counter(&CHAT_EXCHANGE_FAILURES);
    collector.register_counter(&CHAT_REJECTED_SUBMISSIONS);
    collector.register_counter(&CHAT_FRAGMENTS);
    collector.register_moments(&CHAT_EXCHANGE_DURATION);
}
