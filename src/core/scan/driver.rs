//! Scan driver implementation.

use crate::config::EngineConfig;
use crate::core::fingerprint::{Fingerprint, Fingerprinter};
use crate::core::media::{AssetDescriptor, CollectionEnumerator, MediaAccess};
use crate::core::oracle::{ChangeOracle, Decision};
use crate::core::store::{AssetRecord, AssetStore};
use crate::error::{MediaError, Result};
use crate::events::{Broadcaster, ScanEvent, ScanOutcome, ScanSummary};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Token for cancelling a running scan.
///
/// Clones share state, so one can be handed to a UI thread while the
/// driver polls another.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect before the next asset is committed.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the token can be reused
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// How a call to [`ScanDriver::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Every asset was visited and stale records were removed
    Completed,
    /// Stopped early; stale records were left alone
    Cancelled,
    /// Another pass was already running on this driver; nothing was done
    AlreadyRunning,
}

/// Result of a scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub summary: ScanSummary,
}

/// Builder for [`ScanDriver`]
pub struct ScanDriverBuilder<S: AssetStore + ?Sized> {
    store: Arc<S>,
    config: EngineConfig,
    broadcaster: Option<Broadcaster<ScanEvent>>,
}

impl<S: AssetStore + ?Sized> ScanDriverBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            broadcaster: None,
        }
    }

    /// Engine settings (thresholds, version, worker count)
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish progress to an existing broadcaster
    pub fn broadcaster(mut self, broadcaster: Broadcaster<ScanEvent>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn build(self) -> ScanDriver<S> {
        let workers = self.config.scan_workers.max(1);
        let pool = if workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("scan-worker-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!("Falling back to sequential scanning: {}", e);
                    None
                }
            }
        } else {
            None
        };

        ScanDriver {
            fingerprinter: Fingerprinter::from_config(&self.config),
            broadcaster: self
                .broadcaster
                .unwrap_or_else(|| Broadcaster::from_config(&self.config)),
            store: self.store,
            config: self.config,
            pool,
            active: AtomicBool::new(false),
        }
    }
}

/// Clears the active flag when a pass ends, however it ends
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// An asset after the oracle looked at it
struct Planned<'a> {
    asset: &'a AssetDescriptor,
    decision: Decision,
    existing: Option<AssetRecord>,
}

/// Drives incremental fingerprinting of a collection.
///
/// Only assets whose size, modification time or fingerprint version changed
/// are read. Everything else reuses the stored record.
pub struct ScanDriver<S: AssetStore + ?Sized> {
    store: Arc<S>,
    config: EngineConfig,
    fingerprinter: Fingerprinter,
    broadcaster: Broadcaster<ScanEvent>,
    pool: Option<rayon::ThreadPool>,
    active: AtomicBool,
}

impl<S: AssetStore + ?Sized> ScanDriver<S> {
    pub fn builder(store: Arc<S>) -> ScanDriverBuilder<S> {
        ScanDriverBuilder::new(store)
    }

    /// Where progress events go; subscribe here to observe scans
    pub fn broadcaster(&self) -> &Broadcaster<ScanEvent> {
        &self.broadcaster
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run one pass over the collection.
    ///
    /// `on_outcome` sees every outcome in enumeration order, after it was
    /// persisted and published. A storage failure stops the pass and is
    /// returned; unreadable assets are reported in their outcome instead.
    pub fn run<F>(
        &self,
        enumerator: &dyn CollectionEnumerator,
        media: &dyn MediaAccess,
        token: &CancellationToken,
        mut on_outcome: F,
    ) -> Result<ScanReport>
    where
        F: FnMut(&ScanOutcome),
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Scan already running; ignoring request");
            return Ok(ScanReport {
                status: ScanStatus::AlreadyRunning,
                summary: ScanSummary::default(),
            });
        }
        let _guard = ActiveGuard(&self.active);

        let result = self.run_pass(enumerator, media, token, &mut on_outcome);
        if let Err(e) = &result {
            tracing::error!("Scan failed: {}", e);
            self.broadcaster.publish(ScanEvent::Failed {
                message: e.to_string(),
            });
        }
        result
    }

    fn run_pass(
        &self,
        enumerator: &dyn CollectionEnumerator,
        media: &dyn MediaAccess,
        token: &CancellationToken,
        on_outcome: &mut dyn FnMut(&ScanOutcome),
    ) -> Result<ScanReport> {
        let start_time = Instant::now();
        let assets = enumerator.enumerate()?;
        let total = assets.len();

        tracing::info!("Scan started: {} assets", total);
        self.broadcaster.publish(ScanEvent::Started { total });

        let oracle = ChangeOracle::new(self.store.as_ref());
        let version = self.config.algorithm_version;
        let batch_size = self.config.scan_workers.max(1);

        let mut summary = ScanSummary::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(total);
        let mut cancelled = false;

        'batches: for (batch_index, batch) in assets.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            let mut planned = Vec::with_capacity(batch.len());
            for asset in batch {
                let (decision, existing) = oracle.inspect(
                    &asset.identifier,
                    asset.size_bytes,
                    asset.modified_at,
                    version,
                )?;
                planned.push(Planned {
                    asset,
                    decision,
                    existing,
                });
            }

            let mut computed = self.fingerprint_batch(media, &planned).into_iter();

            for (offset, plan) in planned.into_iter().enumerate() {
                if token.is_cancelled() {
                    cancelled = true;
                    break 'batches;
                }

                let index = batch_index * batch_size + offset + 1;
                let asset = plan.asset;
                seen.insert(asset.identifier.clone());

                let (fingerprint, error) = if plan.decision.needs_processing() {
                    match computed.next().flatten() {
                        Some(Ok(fingerprint)) => {
                            self.store.upsert(&self.build_record(asset, &fingerprint))?;
                            summary.processed += 1;
                            tracing::debug!("{}: {} ({})", index, asset.identifier, plan.decision);
                            (Some(fingerprint), None)
                        }
                        Some(Err(e)) => {
                            summary.failed += 1;
                            tracing::warn!("Skipping {}: {}", asset.identifier, e);
                            (None, Some(e.to_string()))
                        }
                        None => (None, None),
                    }
                } else {
                    computed.next();
                    summary.reused += 1;
                    (plan.existing.as_ref().and_then(AssetRecord::fingerprint), None)
                };

                let outcome = ScanOutcome {
                    identifier: asset.identifier.clone(),
                    display_name: asset.display_name.clone(),
                    fingerprint,
                    index,
                    total,
                    decision: plan.decision,
                    error,
                };
                summary.visited += 1;

                self.broadcaster.publish(ScanEvent::Item(outcome.clone()));
                on_outcome(&outcome);
            }
        }

        if cancelled {
            summary.duration_ms = start_time.elapsed().as_millis() as u64;
            tracing::info!(
                "Scan cancelled after {} of {} assets; stale records kept",
                summary.visited,
                total
            );
            self.broadcaster.publish(ScanEvent::Cancelled(summary.clone()));
            return Ok(ScanReport {
                status: ScanStatus::Cancelled,
                summary,
            });
        }

        summary.removed = self.store.delete_where_identifier_not_in(&seen)?;
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        tracing::info!(
            "Scan completed: {} processed, {} reused, {} failed, {} removed in {}ms",
            summary.processed,
            summary.reused,
            summary.failed,
            summary.removed,
            summary.duration_ms
        );
        self.broadcaster.publish(ScanEvent::Completed(summary.clone()));

        Ok(ScanReport {
            status: ScanStatus::Completed,
            summary,
        })
    }

    /// Fingerprint every planned asset that needs it, in parallel when a
    /// pool is configured. Output is aligned with `planned`; skipped slots
    /// hold `None`.
    fn fingerprint_batch(
        &self,
        media: &dyn MediaAccess,
        planned: &[Planned<'_>],
    ) -> Vec<Option<std::result::Result<Fingerprint, MediaError>>> {
        let fingerprinter = &self.fingerprinter;
        let max_dimension = self.config.thumbnail_max_dimension;
        let work = |plan: &Planned<'_>| {
            plan.decision
                .needs_processing()
                .then(|| fingerprint_asset(fingerprinter, media, plan.asset, max_dimension))
        };

        match &self.pool {
            Some(pool) if planned.len() > 1 => {
                pool.install(|| planned.par_iter().map(work).collect())
            }
            _ => planned.iter().map(work).collect(),
        }
    }

    fn build_record(&self, asset: &AssetDescriptor, fingerprint: &Fingerprint) -> AssetRecord {
        AssetRecord {
            id: None,
            identifier: asset.identifier.clone(),
            digest: Some(fingerprint.digest.clone()),
            perceptual_hash: Some(fingerprint.perceptual_hash.clone()),
            sharpness: Some(fingerprint.sharpness),
            is_blurry: Some(fingerprint.is_blurry),
            width: asset.width,
            height: asset.height,
            size_bytes: asset.size_bytes,
            modified_at: asset.modified_at,
            last_scanned_at: chrono::Utc::now().timestamp_millis(),
            algorithm_version: self.config.algorithm_version,
        }
    }
}

fn fingerprint_asset(
    fingerprinter: &Fingerprinter,
    media: &dyn MediaAccess,
    asset: &AssetDescriptor,
    max_dimension: u32,
) -> std::result::Result<Fingerprint, MediaError> {
    let pixels = media.decode_pixels(&asset.identifier, max_dimension)?;
    let stream = media.open_stream(&asset.identifier)?;
    fingerprinter
        .fingerprint(&pixels, stream)
        .map_err(|source| MediaError::Read {
            identifier: asset.identifier.clone(),
            source,
        })
}
