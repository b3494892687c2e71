//! Live transcript assembly.
//!
//! The streaming endpoint delivers the input transcription as an ordered
//! sequence of text fragments. The accumulator merges them into the single
//! authoritative transcript string shown to the caller: strictly in arrival
//! order, space-joined, append-only until the next capture starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A piece of transcript text delivered incrementally by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Transcribed text
    pub text: String,

    /// When this fragment was received
    pub received_at: DateTime<Utc>,
}

impl TranscriptFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Accumulates fragments into the live transcript.
///
/// No deduplication, no reordering, no coalescing: the remote service is
/// trusted to deliver fragments in temporal order.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    text: String,
    fragment_count: usize,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the transcript. Called exactly once per capture start.
    pub fn reset(&mut self) {
        self.text.clear();
        self.fragment_count = 0;
    }

    /// Append a fragment, inserting one space separator when the accumulated
    /// text is non-empty.
    pub fn append(&mut self, fragment: &TranscriptFragment) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&fragment.text);
        self.fragment_count += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator_is_empty_string() {
        let acc = TranscriptAccumulator::new();
        assert_eq!(acc.text(), "");
        assert_eq!(acc.fragment_count(), 0);
    }

    #[test]
    fn test_single_fragment_has_no_leading_space() {
        let mut acc = TranscriptAccumulator::new();
        acc.reset();
        acc.append(&TranscriptFragment::new("hello"));

        assert_eq!(acc.text(), "hello");
    }

    #[test]
    fn test_fragments_are_space_joined_in_arrival_order() {
        let mut acc = TranscriptAccumulator::new();
        acc.reset();
        for text in ["The quick", "brown fox", "jumps"] {
            acc.append(&TranscriptFragment::new(text));
        }

        assert_eq!(acc.text(), "The quick brown fox jumps");
        assert_eq!(acc.fragment_count(), 3);
    }

    #[test]
    fn test_reset_discards_previous_capture() {
        let mut acc = TranscriptAccumulator::new();
        acc.append(&TranscriptFragment::new("stale text"));

        acc.reset();
        acc.append(&TranscriptFragment::new("fresh"));

        assert_eq!(acc.text(), "fresh");
        assert_eq!(acc.fragment_count(), 1);
    }

    #[test]
    fn test_no_deduplication() {
        let mut acc = TranscriptAccumulator::new();
        acc.append(&TranscriptFragment::new("again"));
        acc.append(&TranscriptFragment::new("again"));

        assert_eq!(acc.text(), "again again");
    }
}
