use std::time::Duration;

use tokio::{fs, time};
use tracing::{info, warn};

use crate::state::MediaLog;

/// Periodically drop the oldest uploads while the total exceeds `cap`.
pub async fn task(log: MediaLog, cap: u64, every: Duration) {
    let mut tick = time::interval(every);
    loop {
        tick.tick().await;
        let removed = sweep(&log, cap).await;
        if removed > 0 {
            info!(removed, "upload janitor freed space");
        }
    }
}

pub async fn sweep(log: &MediaLog, cap: u64) -> usize {
    let used: u64 = log.read().await.iter().map(|m| m.size).sum();
    if used <= cap {
        return 0;
    }

    let mut lg = log.write().await;
    let mut space = used;
    let mut removed = 0;
    while space > cap {
        let Some(old) = lg.pop_front() else { break };
        match fs::remove_file(&old.path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %old.path.display(), error = %e, "could not remove upload"),
        }
        // a file that is already gone no longer takes space either
        space = space.saturating_sub(old.size);
    }
    removed
}
