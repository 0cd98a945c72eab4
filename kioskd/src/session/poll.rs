//! One-shot poll timer

use kiosk_core::SensorClass;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::events::SessionEvent;

/// A pending poll tick
///
/// The timer task is aborted when the handle is cancelled or dropped. A tick
/// that was already queued is recognised as stale by its generation.
#[derive(Debug)]
pub(crate) struct ScheduledPoll {
    generation: u64,
    handle: JoinHandle<()>,
}

impl ScheduledPoll {
    /// Post `PollTick { class, generation }` after `delay`
    pub fn schedule(
        class: SensorClass,
        generation: u64,
        delay: Duration,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            // Manager gone means nothing left to poll
            let _ = events
                .send(SessionEvent::PollTick { class, generation })
                .await;
        });

        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for ScheduledPoll {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
