//! # Event Subscriber
//!
//! A subscription filters on receive. Events that fall out of a full buffer
//! are counted in [`Subscription::lagged`] rather than reported as errors.

use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;
use tracing::warn;

use crate::events::{ControlPlaneEvent, EventFilter};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("event bus closed")]
    Closed,
}

pub struct Subscription {
    receiver: Receiver<ControlPlaneEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: Receiver<ControlPlaneEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            lagged: 0,
        }
    }

    /// Next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ControlPlaneEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => self.note_lag(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already buffered, if any.
    pub fn try_recv(&mut self) -> Result<Option<ControlPlaneEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => self.note_lag(missed),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Every matching event buffered right now, oldest first.
    pub fn drain(&mut self) -> Vec<ControlPlaneEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Events this subscription missed because its buffer overflowed.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    fn note_lag(&mut self, missed: u64) {
        self.lagged += missed;
        warn!(missed, total = self.lagged, topics = ?self.filter.topics, "Subscriber fell behind");
    }
}
