//! Progress-callback trait for per-batch translation events.
//!
//! Inject an [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! events while the batch translator works through a document. Translation is
//! the only long-running stage (one network call per batch plus the pacing
//! delay), so events are emitted per batch rather than per page.
//!
//! # Example
//!
//! ```rust
//! use pdf_layout_translate::{TranslationProgressCallback, TranslationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranslationProgressCallback for CountingCallback {
//!     fn on_batch_complete(&self, batch: usize, total_batches: usize, items: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("batch {batch}/{total_batches}: {items} strings");
//!     }
//! }
//!
//! let config = TranslationConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch translator as it processes each batch.
///
/// All methods have no-op defaults. With `max_in_flight > 1` batch events
/// may arrive out of order and from different tasks.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once before the first batch is dispatched.
    ///
    /// * `total_batches`   — number of batches that will be sent
    /// * `total_fragments` — translatable (non-blank) fragments
    fn on_job_start(&self, total_batches: usize, total_fragments: usize) {
        let _ = (total_batches, total_fragments);
    }

    /// Called just before a batch is sent. `batch` is 1-indexed.
    fn on_batch_start(&self, batch: usize, total_batches: usize) {
        let _ = (batch, total_batches);
    }

    /// Called when a batch came back translated.
    fn on_batch_complete(&self, batch: usize, total_batches: usize, items: usize) {
        let _ = (batch, total_batches, items);
    }

    /// Called when a batch fell back to its source text.
    fn on_batch_error(&self, batch: usize, total_batches: usize, error: &str) {
        let _ = (batch, total_batches, error);
    }

    /// Called once after every batch has been attempted.
    fn on_job_complete(&self, total_batches: usize, failed_batches: usize) {
        let _ = (total_batches, failed_batches);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        failed_total: AtomicUsize,
    }

    impl TranslationProgressCallback for TrackingCallback {
        fn on_batch_start(&self, _batch: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _batch: usize, _total: usize, _items: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_error(&self, _batch: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _total: usize, failed: usize) {
            self.failed_total.store(failed, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(3, 50);
        cb.on_batch_start(1, 3);
        cb.on_batch_complete(1, 3, 20);
        cb.on_batch_error(2, 3, "timeout");
        cb.on_job_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_batch_start(1, 2);
        tracker.on_batch_complete(1, 2, 20);
        tracker.on_batch_start(2, 2);
        tracker.on_batch_error(2, 2, "HTTP 503");
        tracker.on_job_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failed_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_start(1, 1);
        cb.on_batch_complete(1, 1, 1);
    }
}
