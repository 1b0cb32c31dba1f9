//! Diagnostics toggles
//!
//! All three default to off; turning them on costs something on every
//! allocation, which is the intended tradeoff for a debugging session.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_OUTPUT: AtomicBool = AtomicBool::new(false);
static STACK_TRACES: AtomicBool = AtomicBool::new(false);
static LEAK_DETECTION: AtomicBool = AtomicBool::new(false);

/// Log every tracked allocation and release.
pub fn set_debug_output(enabled: bool) {
    DEBUG_OUTPUT.store(enabled, Ordering::Relaxed);
}

/// Whether per-allocation logging is on.
pub fn debug_output() -> bool {
    DEBUG_OUTPUT.load(Ordering::Relaxed)
}

/// Capture a stack trace with every tracked allocation, so leak reports
/// can say where a leaked buffer came from.
pub fn set_stack_traces(enabled: bool) {
    STACK_TRACES.store(enabled, Ordering::Relaxed);
}

/// Whether allocation stack capture is on.
pub fn stack_traces() -> bool {
    STACK_TRACES.load(Ordering::Relaxed)
}

/// Escalate leaks found at context teardown from a log line to an
/// assertion failure (debug builds).
pub fn set_leak_detection(enabled: bool) {
    LEAK_DETECTION.store(enabled, Ordering::Relaxed);
}

/// Whether leak escalation is on.
pub fn leak_detection() -> bool {
    LEAK_DETECTION.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_round_trip() {
        assert!(!debug_output());
        set_debug_output(true);
        assert!(debug_output());
        set_debug_output(false);
        assert!(!debug_output());
    }
}
