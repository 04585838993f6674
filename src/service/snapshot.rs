use std::time::{Duration, Instant};

use anyhow::Result;

use crate::store::SharedProjectStore;

use super::LoopService;

/// Periodically pushes pending ledger changes to the snapshot file.
/// Iterations stay short so the stop flag is observed quickly.
pub struct SnapshotService {
    store: SharedProjectStore,
    interval: Duration,
    last_flush: Instant,
}

impl SnapshotService {
    pub fn new(store: SharedProjectStore, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last_flush: Instant::now(),
        }
    }
}

impl LoopService for SnapshotService {
    fn run_iteration(&mut self) -> Result<()> {
        std::thread::sleep(Duration::from_millis(250));

        if self.last_flush.elapsed() >= self.interval {
            self.store.flush()?;
            self.last_flush = Instant::now();
        }
        Ok(())
    }
}
