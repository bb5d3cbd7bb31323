use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Token accounting reported with a response.
///
/// Streamed responses report running totals, so the last chunk's value is the total for the
/// whole reply.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt, including history and system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u32>,

    /// Tokens across generated candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<u32>,

    /// Tokens spent on internal reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts_token_count: Option<u32>,

    /// Total tokens billed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u32>,
}

impl UsageMetadata {
    /// Create usage with prompt and candidate counts.
    pub fn new(prompt_token_count: u32, candidates_token_count: u32) -> Self {
        Self {
            prompt_token_count: Some(prompt_token_count),
            candidates_token_count: Some(candidates_token_count),
            thoughts_token_count: None,
            total_token_count: Some(prompt_token_count + candidates_token_count),
        }
    }

    /// Total tokens, computed from the parts when the service omitted it.
    pub fn total(&self) -> u64 {
        match self.total_token_count {
            Some(total) => total as u64,
            None => {
                self.prompt_token_count.unwrap_or(0) as u64
                    + self.candidates_token_count.unwrap_or(0) as u64
                    + self.thoughts_token_count.unwrap_or(0) as u64
            }
        }
    }
}

impl Add for UsageMetadata {
    type Output = UsageMetadata;

    fn add(self, rhs: UsageMetadata) -> UsageMetadata {
        fn sum(a: Option<u32>, b: Option<u32>) -> Option<u32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
            }
        }
        UsageMetadata {
            prompt_token_count: sum(self.prompt_token_count, rhs.prompt_token_count),
            candidates_token_count: sum(self.candidates_token_count, rhs.candidates_token_count),
            thoughts_token_count: sum(self.thoughts_token_count, rhs.thoughts_token_count),
            total_token_count: sum(self.total_token_count, rhs.total_token_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_falls_back_to_parts() {
        let usage = UsageMetadata {
            prompt_token_count: Some(10),
            candidates_token_count: Some(5),
            thoughts_token_count: Some(2),
            total_token_count: None,
        };
        assert_eq!(usage.total(), 17);
    }

    #[test]
    fn add_sums_fields() {
        let usage = UsageMetadata::new(10, 5) + UsageMetadata::new(20, 7);
        assert_eq!(usage.prompt_token_count, Some(30));
        assert_eq!(usage.candidates_token_count, Some(12));
        assert_eq!(usage.thoughts_token_count, None);
        assert_eq!(usage.total(), 42);
    }
}
