//! Best-effort agent host identity

use tracing::warn;

/// Resolve the agent's hostname. Returns `None` on failure so callers can
/// omit the corresponding tag rather than emit a bogus value.
pub fn agent_hostname() -> Option<String> {
    match hostname::get() {
        Ok(name) => Some(name.to_string_lossy().to_string()),
        Err(e) => {
            warn!("Failed to resolve agent hostname: {}", e);
            None
        }
    }
}
