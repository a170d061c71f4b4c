use tokio::sync::broadcast;

use crate::cache::QueryKey;

/// Capacity of the event channel; slow subscribers see `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Change notifications for cached queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// The entry was dropped; subscribers should refetch it.
    Invalidated(QueryKey),
    /// The entry was patched in place with server-confirmed data.
    Updated(QueryKey),
}

impl QueryEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            QueryEvent::Invalidated(key) | QueryEvent::Updated(key) => key,
        }
    }
}

pub fn channel() -> broadcast::Sender<QueryEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

pub fn emit_event(tx: &broadcast::Sender<QueryEvent>, event: QueryEvent) {
    // No subscribers is not an error: nothing is on screen.
    if tx.send(event.clone()).is_err() {
        tracing::trace!(?event, "No subscribers for query event");
    }
}
