//! Single-slot latest-frame mailbox.
//!
//! A context that renders keeps the publisher; the context that displays holds the view.
//! Publishing replaces the previous frame, readers always see the newest one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;

use crate::PixelBuffer;

#[derive(Debug, Default)]
struct FrameSlot {
    latest: ArcSwapOption<PixelBuffer>,
    sequence: AtomicU64,
}

/// Write side. Not `Clone`: exactly one context publishes into a mailbox.
#[derive(Debug)]
pub struct FramePublisher {
    slot: Arc<FrameSlot>,
}

/// Read side. Not `Clone`: exactly one context displays a mailbox.
#[derive(Debug)]
pub struct FrameView {
    slot: Arc<FrameSlot>,
}

pub fn frame_mailbox() -> (FramePublisher, FrameView) {
    let slot = Arc::new(FrameSlot::default());
    (
        FramePublisher { slot: slot.clone() },
        FrameView { slot },
    )
}

impl FramePublisher {
    /// Returns the sequence number assigned to `frame`, starting at 1.
    pub fn publish(&self, frame: PixelBuffer) -> u64 {
        self.slot.latest.store(Some(Arc::new(frame)));
        self.slot.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn clear(&self) {
        self.slot.latest.store(None);
    }
}

impl FrameView {
    pub fn latest(&self) -> Option<Arc<PixelBuffer>> {
        self.slot.latest.load_full()
    }

    pub fn sequence(&self) -> u64 {
        self.slot.sequence.load(Ordering::Acquire)
    }

    /// False once the publishing side has been dropped.
    pub fn is_connected(&self) -> bool {
        Arc::strong_count(&self.slot) > 1
    }
}
