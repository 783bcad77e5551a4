//! Resource manager - cross-instance inactivity tracking and reclamation
//!
//! A single process-wide registry tracks every live codec instance. An
//! instance is *active* while it has emitted an output within the inactivity
//! window (10 seconds by default); *background* only when an embedder says
//! so. Reclamation is always embedder-driven: there is no internal timer.
//! Reclaimed instances observe a QuotaExceededError through their error
//! callback and close, indistinguishable from any other error-triggered
//! close.
//!
//! The registry lock is never held while closing an instance: reclamation
//! copies the registry under the lock, then works on the snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::webcodecs::error::WebCodecsError;

/// Which of the four codec types an instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    VideoEncoder,
    VideoDecoder,
    AudioEncoder,
    AudioDecoder,
}

impl CodecKind {
    pub fn is_encoder(&self) -> bool {
        matches!(self, CodecKind::VideoEncoder | CodecKind::AudioEncoder)
    }

    pub fn is_decoder(&self) -> bool {
        !self.is_encoder()
    }
}

/// How the manager closes an instance it decided to reclaim.
pub(crate) trait ReclaimTarget: Send + Sync {
    /// Dispatch the error and close. Returns false when the instance was
    /// already closed (such instances are not counted as reclaimed).
    fn reclaim(&self, error: WebCodecsError) -> bool;
}

struct Entry {
    kind: CodecKind,
    target: Weak<dyn ReclaimTarget>,
    last_activity: Instant,
    background: bool,
    group: Option<u64>,
}

/// Default window after an output emission during which an instance counts
/// as active.
pub const DEFAULT_INACTIVITY_WINDOW: Duration = Duration::from_secs(10);

/// Process-wide codec registry driving QuotaExceeded reclamation.
///
/// Reached through [`ResourceManager::global`] in production; tests build
/// isolated instances (usually with a short inactivity window) and hand them
/// to the codec constructors.
pub struct ResourceManager {
    inactivity_window: Duration,
    registry: Mutex<HashMap<u64, Entry>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::with_inactivity_window(DEFAULT_INACTIVITY_WINDOW)
    }

    pub fn with_inactivity_window(inactivity_window: Duration) -> Self {
        Self {
            inactivity_window,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide manager used by the default codec constructors.
    pub fn global() -> Arc<ResourceManager> {
        static GLOBAL: OnceLock<Arc<ResourceManager>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ResourceManager::new())).clone()
    }

    fn lock_registry(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creation counts as activity, so a freshly built instance is never
    /// immediately eligible.
    pub(crate) fn register(&self, id: u64, kind: CodecKind, target: Weak<dyn ReclaimTarget>) {
        debug!(id, ?kind, "registering codec instance");
        self.lock_registry().insert(
            id,
            Entry {
                kind,
                target,
                last_activity: Instant::now(),
                background: false,
                group: None,
            },
        );
    }

    pub(crate) fn unregister(&self, id: u64) {
        debug!(id, "unregistering codec instance");
        self.lock_registry().remove(&id);
    }

    /// Called on every output emission.
    pub(crate) fn record_activity(&self, id: u64) {
        if let Some(entry) = self.lock_registry().get_mut(&id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Embedder marking; there is no implicit visibility signal.
    pub fn set_background(&self, id: u64, background: bool) {
        if let Some(entry) = self.lock_registry().get_mut(&id) {
            entry.background = background;
        }
    }

    /// Logical grouping for the transcoding-pair protection rule.
    pub fn set_group(&self, id: u64, group: Option<u64>) {
        if let Some(entry) = self.lock_registry().get_mut(&id) {
            entry.group = group;
        }
    }

    /// Number of currently registered instances.
    pub fn registered_count(&self) -> usize {
        self.lock_registry().len()
    }

    #[cfg(test)]
    pub(crate) fn backdate_activity(&self, id: u64, age: Duration) {
        if let Some(entry) = self.lock_registry().get_mut(&id) {
            entry.last_activity = Instant::now() - age;
        }
    }

    /// Close every eligible instance with QuotaExceededError and return how
    /// many were actually reclaimed.
    ///
    /// Protection rules, in order:
    /// 1. active foreground instances are never reclaimed;
    /// 2. active background encoders are never reclaimed;
    /// 3. an active background decoder is kept while an active encoder
    ///    coexists in the same logical group;
    /// 4. already-closed instances are skipped.
    pub fn reclaim(&self) -> usize {
        struct Candidate {
            id: u64,
            kind: CodecKind,
            target: Weak<dyn ReclaimTarget>,
            active: bool,
            background: bool,
            group: Option<u64>,
        }

        let now = Instant::now();
        let snapshot: Vec<Candidate> = {
            let registry = self.lock_registry();
            registry
                .iter()
                .map(|(id, entry)| Candidate {
                    id: *id,
                    kind: entry.kind,
                    target: entry.target.clone(),
                    active: now.duration_since(entry.last_activity) <= self.inactivity_window,
                    background: entry.background,
                    group: entry.group,
                })
                .collect()
        };

        let mut reclaimed = 0;
        for candidate in &snapshot {
            if candidate.active {
                if !candidate.background {
                    continue;
                }
                if candidate.kind.is_encoder() {
                    continue;
                }
                let paired_encoder_active = candidate.group.is_some()
                    && snapshot.iter().any(|other| {
                        other.id != candidate.id
                            && other.group == candidate.group
                            && other.kind.is_encoder()
                            && other.active
                    });
                if paired_encoder_active {
                    continue;
                }
            }
            let Some(target) = candidate.target.upgrade() else {
                continue;
            };
            info!(id = candidate.id, kind = ?candidate.kind, "reclaiming codec instance");
            if target.reclaim(WebCodecsError::QuotaExceeded(
                "codec reclaimed due to resource pressure".to_string(),
            )) {
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTarget {
        reclaimed: AtomicUsize,
        already_closed: bool,
    }

    impl StubTarget {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                reclaimed: AtomicUsize::new(0),
                already_closed: false,
            })
        }

        fn closed() -> Arc<Self> {
            Arc::new(Self {
                reclaimed: AtomicUsize::new(0),
                already_closed: true,
            })
        }

        fn reclaim_count(&self) -> usize {
            self.reclaimed.load(Ordering::SeqCst)
        }
    }

    impl ReclaimTarget for StubTarget {
        fn reclaim(&self, error: WebCodecsError) -> bool {
            assert_eq!(error.name(), "QuotaExceededError");
            if self.already_closed {
                return false;
            }
            self.reclaimed.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn register(manager: &ResourceManager, id: u64, kind: CodecKind, target: &Arc<StubTarget>) {
        let target: Arc<dyn ReclaimTarget> = target.clone();
        manager.register(id, kind, Arc::downgrade(&target));
        // Keep the trait-object Arc alive for the duration of the test.
        std::mem::forget(target);
    }

    #[test]
    fn active_foreground_is_never_reclaimed() {
        let manager = ResourceManager::new();
        let decoder = StubTarget::new();
        register(&manager, 1, CodecKind::VideoDecoder, &decoder);
        assert_eq!(manager.reclaim(), 0);
        assert_eq!(decoder.reclaim_count(), 0);
    }

    #[test]
    fn inactive_instance_is_reclaimed() {
        let manager = ResourceManager::new();
        let decoder = StubTarget::new();
        register(&manager, 1, CodecKind::VideoDecoder, &decoder);
        manager.backdate_activity(1, Duration::from_secs(30));
        assert_eq!(manager.reclaim(), 1);
        assert_eq!(decoder.reclaim_count(), 1);
    }

    #[test]
    fn active_background_encoder_is_protected() {
        let manager = ResourceManager::new();
        let encoder = StubTarget::new();
        register(&manager, 1, CodecKind::AudioEncoder, &encoder);
        manager.set_background(1, true);
        assert_eq!(manager.reclaim(), 0);
    }

    #[test]
    fn active_background_decoder_is_reclaimed_without_paired_encoder() {
        let manager = ResourceManager::new();
        let decoder = StubTarget::new();
        register(&manager, 1, CodecKind::AudioDecoder, &decoder);
        manager.set_background(1, true);
        assert_eq!(manager.reclaim(), 1);
        assert_eq!(decoder.reclaim_count(), 1);
    }

    #[test]
    fn transcoding_pair_protects_background_decoder() {
        let manager = ResourceManager::new();
        let decoder = StubTarget::new();
        let encoder = StubTarget::new();
        register(&manager, 1, CodecKind::VideoDecoder, &decoder);
        register(&manager, 2, CodecKind::VideoEncoder, &encoder);
        manager.set_background(1, true);
        manager.set_group(1, Some(7));
        manager.set_group(2, Some(7));
        assert_eq!(manager.reclaim(), 0);

        // Once the paired encoder goes inactive the decoder loses protection.
        manager.backdate_activity(2, Duration::from_secs(30));
        let reclaimed = manager.reclaim();
        assert_eq!(reclaimed, 2);
    }

    #[test]
    fn closed_instances_are_not_counted() {
        let manager = ResourceManager::new();
        let closed = StubTarget::closed();
        register(&manager, 1, CodecKind::VideoDecoder, &closed);
        manager.backdate_activity(1, Duration::from_secs(30));
        assert_eq!(manager.reclaim(), 0);
    }
}
