//! Extension hooks for reporting progress back to the host.
//!
//! The host task runner exposes `logProgress`/`logSuccess`-style channels;
//! callers inject an observer to mirror run phases there. Observer failures
//! never abort a run.

use std::time::Duration;

use crate::chart::ChartKind;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        personalities: usize,
        bias_count: usize,
    },
    PersonalityStarted {
        index: usize,
        name: String,
    },
    AttemptStarted {
        personality: String,
        attempt: u32,
        max_attempts: u32,
    },
    AttemptFailed {
        personality: String,
        attempt: u32,
        error: String,
    },
    RetryScheduled {
        personality: String,
        attempts_remaining: u32,
        delay: Duration,
    },
    PersonalityCompleted {
        index: usize,
        name: String,
        attempts: u32,
    },
    ChartRendered {
        kind: ChartKind,
        bytes: usize,
    },
    ImageUploaded {
        kind: ChartKind,
        image_id: String,
    },
    DocumentCreated {
        document_id: String,
        chapters: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("{0}")]
    Message(String),
}

#[async_trait::async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, event: ProgressEvent) -> Result<(), ObserverError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressObserver;

#[async_trait::async_trait]
impl ProgressObserver for NoopProgressObserver {
    async fn on_progress(&self, _event: ProgressEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Deliver an event, logging instead of propagating observer failures.
pub(crate) async fn notify(observer: &dyn ProgressObserver, event: ProgressEvent) {
    if let Err(e) = observer.on_progress(event).await {
        tracing::warn!(error = %e, "Progress observer failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Broken(AtomicUsize);

    #[async_trait::async_trait]
    impl ProgressObserver for Broken {
        async fn on_progress(&self, _event: ProgressEvent) -> Result<(), ObserverError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ObserverError::Message("sink closed".into()))
        }
    }

    #[tokio::test]
    async fn observer_failures_are_swallowed() {
        let observer = Broken(AtomicUsize::new(0));
        notify(
            &observer,
            ProgressEvent::ChartRendered {
                kind: ChartKind::Balance,
                bytes: 10,
            },
        )
        .await;
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }
}
