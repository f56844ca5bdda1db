//! Thread placement
//!
//! The producer context (capture + recognition) and the consumer context
//! (feedback + playback drain) each run on their own core when the host has
//! enough of them. Placement is best-effort: a missing core is logged and the
//! thread keeps running wherever the scheduler puts it.

use tracing::{debug, warn};

/// Pin the calling thread to `core`, if given.
///
/// Returns true when the thread was pinned.
pub fn pin_current_thread(core: Option<usize>, role: &str) -> bool {
    let Some(core) = core else {
        debug!("{} thread left unpinned", role);
        return false;
    };

    let Some(core_ids) = core_affinity::get_core_ids() else {
        warn!("Cannot enumerate cores, {} thread left unpinned", role);
        return false;
    };

    match core_ids.into_iter().find(|id| id.id == core) {
        Some(id) if core_affinity::set_for_current(id) => {
            debug!("{} thread pinned to core {}", role, core);
            true
        }
        Some(_) => {
            warn!("Failed to pin {} thread to core {}", role, core);
            false
        }
        None => {
            warn!("Core {} not available, {} thread left unpinned", core, role);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_core_requested() {
        assert!(!pin_current_thread(None, "test"));
    }

    #[test]
    fn test_missing_core_is_not_fatal() {
        assert!(!pin_current_thread(Some(usize::MAX), "test"));
    }
}
