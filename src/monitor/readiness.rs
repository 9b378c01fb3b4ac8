//! Liveness marker lookup
//!
//! The streaming host logs a fixed marker once it has initialized. The time
//! of the latest marker is only used as a cooldown hint, so a marker line
//! without a timestamp counts as "ready now".

use chrono::{DateTime, Local};
use std::path::Path;
use tracing::warn;

use super::classifier::{scan_latest, ClassifyError};

/// Time of the latest line containing `marker`, or `None` if absent
pub fn find_ready_marker(
    path: &Path,
    marker: &str,
) -> Result<Option<DateTime<Local>>, ClassifyError> {
    if marker.is_empty() {
        return Ok(None);
    }

    let latest = scan_latest(path, |line| line.contains(marker))?;
    if latest.corrupted {
        warn!(path = %path.display(), "log corrupted while looking for ready marker");
    }

    match (latest.at, latest.matched) {
        (Some(at), _) => Ok(Some(at)),
        (None, 0) => Ok(None),
        (None, _) => Ok(Some(Local::now())),
    }
}
