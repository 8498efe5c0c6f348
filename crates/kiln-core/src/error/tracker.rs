use std::{collections::HashMap, sync::Mutex};

use super::fallback_suggestions;

/// Failures of one kind after which alternatives are suggested.
const FALLBACK_THRESHOLD: u32 = 2;

/// Per-session failure counters used to decide when to suggest a fallback.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    counts: Mutex<HashMap<(String, &'static str), u32>>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failure and return the new total for that session and kind.
    pub fn record(&self, session_id: &str, error_type: &'static str) -> u32 {
        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        let n = counts.entry((session_id.to_string(), error_type)).or_insert(0);
        *n += 1;
        *n
    }

    pub fn count(&self, session_id: &str, error_type: &'static str) -> u32 {
        let counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts
            .get(&(session_id.to_string(), error_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn should_suggest_fallback(&self, session_id: &str, error_type: &'static str) -> bool {
        self.count(session_id, error_type) >= FALLBACK_THRESHOLD
    }

    /// Suggestions for `error_type`, or nothing while under the threshold.
    pub fn suggestions(&self, session_id: &str, error_type: &'static str) -> Vec<String> {
        if self.should_suggest_fallback(session_id, error_type) {
            fallback_suggestions(error_type)
        } else {
            Vec::new()
        }
    }

    /// Forget a session, e.g. after a successful build.
    pub fn reset(&self, session_id: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts.retain(|(sid, _), _| sid != session_id);
    }
}
