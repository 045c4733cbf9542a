use crate::results::PollResults;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PollEvent {
    #[serde(rename_all = "camelCase")]
    NewResponse { poll_id: String },
    #[serde(rename_all = "camelCase")]
    Results {
        poll_id: String,
        results: PollResults,
    },
}

impl PollEvent {
    pub fn poll_id(&self) -> &str {
        match self {
            PollEvent::NewResponse { poll_id } | PollEvent::Results { poll_id, .. } => poll_id,
        }
    }
}

/// Receives freshly recomputed results after every accepted submission.
#[async_trait]
pub trait ResultsNotifier: Send + Sync {
    async fn notify_new_response(&self, poll_id: &str, results: &PollResults);
}

/// Fans events out to in-process subscribers, one broadcast channel per poll.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    capacity: usize,
    rooms: Arc<Mutex<HashMap<String, broadcast::Sender<PollEvent>>>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: Arc::default(),
        }
    }

    /// Receives the events of `poll_id` only.
    pub fn subscribe(&self, poll_id: &str) -> broadcast::Receiver<PollEvent> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.retain(|_, tx| tx.receiver_count() > 0);
        rooms
            .entry(poll_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, poll_id: &str) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.get(poll_id).map_or(0, |tx| tx.receiver_count())
    }

    fn publish(&self, event: PollEvent) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = rooms.get(event.poll_id()) else {
            debug!("No subscribers for poll {}", event.poll_id());
            return;
        };
        // Sending only fails once every receiver for the poll is gone.
        if let Err(broadcast::error::SendError(event)) = tx.send(event) {
            debug!("Last subscriber left poll {}", event.poll_id());
            rooms.remove(event.poll_id());
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// One subscriber's view of a poll: the results current when it joined,
/// followed by live events as submissions arrive.
#[derive(Debug)]
pub struct PollSubscription {
    snapshot: Option<PollEvent>,
    events: broadcast::Receiver<PollEvent>,
}

impl PollSubscription {
    pub fn new(snapshot: PollEvent, events: broadcast::Receiver<PollEvent>) -> Self {
        Self {
            snapshot: Some(snapshot),
            events,
        }
    }

    /// Waits for the next event. `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<PollEvent> {
        if let Some(snapshot) = self.snapshot.take() {
            return Some(snapshot);
        }
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber fell behind and missed {} event(s)", skipped)
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// The next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<PollEvent> {
        if let Some(snapshot) = self.snapshot.take() {
            return Some(snapshot);
        }
        loop {
            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber fell behind and missed {} event(s)", skipped)
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl ResultsNotifier for BroadcastNotifier {
    async fn notify_new_response(&self, poll_id: &str, results: &PollResults) {
        self.publish(PollEvent::NewResponse {
            poll_id: poll_id.to_string(),
        });
        self.publish(PollEvent::Results {
            poll_id: poll_id.to_string(),
            results: results.clone(),
        });
    }
}
