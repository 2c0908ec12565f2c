//! Progress-callback trait for per-document batch events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::sign::sign_documents`] to receive events as each document of a
//! batch is processed. The CLI uses it to drive a terminal progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsign::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_document_complete(&self, index: usize, total: usize, name: &str, pages: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {} ({} pages)", index + 1, total, name, pages);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the batch runner as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Documents are processed sequentially, so events
/// arrive in order.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first document.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is loaded.
    ///
    /// # Arguments
    /// * `index`: 0-indexed position in the batch
    /// * `total`: documents in the batch
    /// * `name`: source file name
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document has been signed.
    ///
    /// `pages_stamped` is the number of pages that received the signature.
    fn on_document_complete(&self, index: usize, total: usize, name: &str, pages_stamped: usize) {
        let _ = (index, total, name, pages_stamped);
    }

    /// Called when a document fails; the batch continues with the next one.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        let _ = (total_documents, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Shared callback handle.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        completes: AtomicUsize,
    }

    impl BatchProgressCallback for Recorder {
        fn on_batch_start(&self, total: usize) {
            self.events.lock().unwrap().push(format!("start {total}"));
        }

        fn on_document_complete(&self, index: usize, _total: usize, name: &str, pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.events
                .lock()
                .unwrap()
                .push(format!("done {index} {name} {pages}"));
        }

        fn on_document_error(&self, index: usize, _total: usize, name: &str, _error: &str) {
            self.events.lock().unwrap().push(format!("fail {index} {name}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(0, 2, "a.pdf");
        cb.on_document_complete(0, 2, "a.pdf", 1);
        cb.on_document_error(1, 2, "b.pdf", "corrupt");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn recorder_sees_events_in_order() {
        let rec = Recorder::default();
        rec.on_batch_start(2);
        rec.on_document_start(0, 2, "a.pdf");
        rec.on_document_complete(0, 2, "a.pdf", 3);
        rec.on_document_error(1, 2, "b.pdf", "corrupt");
        rec.on_batch_complete(2, 1);

        assert_eq!(rec.completes.load(Ordering::SeqCst), 1);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start 2", "done 0 a.pdf 3", "fail 1 b.pdf"]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_document_complete(0, 1, "a.pdf", 1);
    }
}
