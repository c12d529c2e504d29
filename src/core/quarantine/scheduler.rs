//! Periodic purge of expired quarantine entries.

use super::QuarantineManager;
use crate::core::store::GalleryStore;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Runs [`QuarantineManager::purge_expired`] on a background thread every
/// `interval` until stopped or dropped.
pub struct PurgeScheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PurgeScheduler {
    pub fn start<S>(manager: Arc<QuarantineManager<S>>, interval: Duration) -> Self
    where
        S: GalleryStore + ?Sized + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("quarantine-purge".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        let now = chrono::Utc::now().timestamp_millis();
                        match manager.purge_expired(now) {
                            Ok(report) => tracing::debug!("Scheduled purge: {:?}", report),
                            Err(e) => tracing::warn!("Scheduled purge failed: {}", e),
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to start purge scheduler: {}", e);
                None
            }
        };

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop ticking and wait for an in-flight purge to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender also wakes the select
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Purge scheduler thread panicked");
            }
        }
    }
}

impl Drop for PurgeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::store::test_support::quarantine;
    use crate::core::store::{InMemoryStore, QuarantineStore};
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn scheduler_purges_expired_records() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.insert(&quarantine("/a.jpg", 0)).unwrap();
        let manager = Arc::new(QuarantineManager::new(
            Arc::clone(&store),
            dir.path(),
            &EngineConfig::default(),
        ));

        let scheduler = PurgeScheduler::start(manager, Duration::from_millis(10));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.list().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.stop();

        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn stop_joins_promptly() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let manager = Arc::new(QuarantineManager::new(
            store,
            dir.path(),
            &EngineConfig::default(),
        ));

        let scheduler = PurgeScheduler::start(manager, Duration::from_secs(3600));
        assert!(scheduler.is_running());

        let started = Instant::now();
        scheduler.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
