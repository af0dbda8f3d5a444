//! Loop detection over recent tool-call signatures
//!
//! Tracks a sliding window of (name + input hash) signatures. A repeating
//! block - the same three calls twice in a row - marks the run as
//! looping. The flag latches once set.

use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;
use tracing::debug;

/// Signatures kept in the window
const WINDOW_CAPACITY: usize = 12;

/// Block length compared for repetition
const BLOCK_LEN: usize = 3;

/// Sliding-window loop detector
#[derive(Debug, Default)]
pub struct LoopDetector {
    window: VecDeque<u64>,
    detected: bool,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed tool call
    pub fn record(&mut self, tool_name: &str, input: &Value) {
        let mut hasher = DefaultHasher::new();
        tool_name.hash(&mut hasher);
        input.to_string().hash(&mut hasher);
        let signature = hasher.finish();

        self.window.push_back(signature);
        while self.window.len() > WINDOW_CAPACITY {
            self.window.pop_front();
        }

        if !self.detected && self.tail_repeats() {
            debug!(tool = tool_name, "LoopDetector: repeating block detected");
            self.detected = true;
        }
    }

    /// Whether a repeating block has been seen; latches once true
    pub fn is_looping(&self) -> bool {
        self.detected
    }

    fn tail_repeats(&self) -> bool {
        if self.window.len() < BLOCK_LEN * 2 {
            return false;
        }
        let tail: Vec<u64> = self.window.iter().rev().take(BLOCK_LEN * 2).cloned().collect();
        (0..BLOCK_LEN).all(|i| tail[i] == tail[i + BLOCK_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_loop_on_varied_calls() {
        let mut detector = LoopDetector::new();
        for i in 0..10 {
            detector.record("fs_read", &json!({"path": format!("file{}.rs", i)}));
        }
        assert!(!detector.is_looping());
    }

    #[test]
    fn test_same_three_calls_repeated_twice_detected() {
        let mut detector = LoopDetector::new();
        for _ in 0..2 {
            detector.record("fs_read", &json!({"path": "a.rs"}));
            detector.record("grep_search", &json!({"pattern": "x"}));
            detector.record("fs_read", &json!({"path": "b.rs"}));
        }
        assert!(detector.is_looping());
    }

    #[test]
    fn test_same_name_different_input_is_not_a_loop() {
        let mut detector = LoopDetector::new();
        for i in 0..6 {
            detector.record("grep_search", &json!({"pattern": format!("p{}", i % 4)}));
        }
        assert!(!detector.is_looping());
    }

    #[test]
    fn test_flag_latches() {
        let mut detector = LoopDetector::new();
        for _ in 0..2 {
            detector.record("a", &json!({}));
            detector.record("b", &json!({}));
            detector.record("c", &json!({}));
        }
        assert!(detector.is_looping());

        // Fresh, varied calls do not clear the flag
        detector.record("fs_read", &json!({"path": "new.rs"}));
        detector.record("fs_list", &json!({"path": "src"}));
        assert!(detector.is_looping());
    }

    #[test]
    fn test_five_repeats_not_enough_without_block() {
        let mut detector = LoopDetector::new();
        // a b a b a: no aligned three-block repetition
        detector.record("a", &json!({}));
        detector.record("b", &json!({}));
        detector.record("a", &json!({}));
        detector.record("b", &json!({}));
        detector.record("a", &json!({}));
        assert!(!detector.is_looping());
    }
}
