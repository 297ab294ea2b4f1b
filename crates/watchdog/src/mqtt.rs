// ---------------------------------------------------------------------------
// Topic helpers
// ---------------------------------------------------------------------------

/// Metric the box publishes every cycle; its arrival is the heartbeat.
const HEARTBEAT_METRIC: &str = "temperature";

const STATUS_METRIC: &str = "status";

/// "<prefix>/temperature"
pub(crate) fn heartbeat_topic(prefix: &str) -> String {
    format!("{prefix}/{HEARTBEAT_METRIC}")
}

/// "<prefix>/status"
pub(crate) fn status_topic(prefix: &str) -> String {
    format!("{prefix}/{STATUS_METRIC}")
}

/// Extract the box prefix from "<prefix>/temperature".
pub(crate) fn extract_box_prefix(topic: &str) -> Option<&str> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && parts[1] == HEARTBEAT_METRIC {
        Some(parts[0])
    } else {
        None
    }
}

/// Whether `topic` is the heartbeat of the box under `prefix`.
pub(crate) fn is_heartbeat(topic: &str, prefix: &str) -> bool {
    extract_box_prefix(topic) == Some(prefix)
}

// ===========================================================================
// Tests
// ===========================================================================
