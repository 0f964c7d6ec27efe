//! Deferred side effects of a core transaction.
//!
//! The transactional core never talks to the fetch queue or the notification
//! channel directly: it records what should happen, and the boundary
//! dispatches after commit. A rolled-back transition therefore leaves no
//! trace outside the database, and dispatch failures are logged without
//! affecting the committed transition.

use crate::ports::{EngineEvent, FetchRequest, NotificationPort, ResultFetchQueue};

#[derive(Default)]
pub(crate) struct Effects {
    pub(crate) fetches: Vec<FetchRequest>,
    pub(crate) events: Vec<(String, EngineEvent)>,
}

impl Effects {
    pub(crate) fn notify(&mut self, topic: String, event: EngineEvent) {
        self.events.push((topic, event));
    }

    /// Dispatch everything collected during the transaction, best-effort.
    pub(crate) async fn dispatch(
        self,
        queue: &dyn ResultFetchQueue,
        notifier: &dyn NotificationPort,
    ) {
        for request in &self.fetches {
            if let Err(e) = queue.enqueue(request).await {
                log::error!(
                    "Failed to enqueue result fetch for match {}: {}",
                    request.match_id,
                    e
                );
            }
        }
        for (topic, event) in &self.events {
            notifier.publish(topic, event).await;
        }
    }
}
