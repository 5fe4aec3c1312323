//! Render job and completion event types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::types::{PageBitmap, PageKey};

/// Cancellation flag shared between the service and a queued job
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A single rasterization job
#[derive(Debug)]
pub struct RenderJob {
    pub key: PageKey,
    pub cancel: CancelFlag,
}

/// Message sent to render workers
#[derive(Debug)]
pub enum WorkerMessage {
    Render(RenderJob),
    Shutdown,
}

/// Errors from rasterization
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Completion signal for a job, sent from workers to the UI side
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Ready {
        key: PageKey,
        bitmap: Arc<PageBitmap>,
    },
    Failed {
        key: PageKey,
        reason: Arc<str>,
    },
    /// Job was dropped because its page scrolled out of interest
    Cancelled { key: PageKey },
}

impl RenderEvent {
    #[must_use]
    pub fn key(&self) -> PageKey {
        match self {
            Self::Ready { key, .. } | Self::Failed { key, .. } | Self::Cancelled { key } => *key,
        }
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub enum PageLookup {
    Ready(Arc<PageBitmap>),
    /// Rasterization is queued or running; a `RenderEvent` will follow
    Pending,
    /// Rasterization failed earlier; the page shows an error placeholder
    Failed(Arc<str>),
}

impl PageLookup {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn bitmap(&self) -> Option<&Arc<PageBitmap>> {
        match self {
            Self::Ready(bitmap) => Some(bitmap),
            _ => None,
        }
    }
}
