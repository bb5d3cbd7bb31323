use serde::{Deserialize, Serialize};

/// Reason the model stopped generating a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Default value; not used by the service in practice.
    FinishReasonUnspecified,
    /// Natural stop point or a stop sequence.
    Stop,
    /// The output token limit was reached.
    MaxTokens,
    /// The candidate was flagged for safety reasons.
    Safety,
    /// The candidate was flagged for recitation.
    Recitation,
    /// The candidate used an unsupported language.
    Language,
    /// Unknown reason reported by the service.
    Other,
    /// Forbidden terms were generated.
    Blocklist,
    /// Prohibited content was generated.
    ProhibitedContent,
    /// Sensitive personally identifiable information was generated.
    Spii,
    /// A reason this crate does not know about yet.
    #[serde(other)]
    Unrecognized,
}

impl FinishReason {
    /// True when the reply ended normally rather than being cut off or withheld.
    pub fn is_natural(&self) -> bool {
        matches!(self, FinishReason::Stop)
    }
}
