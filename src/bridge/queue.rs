//! Bounded hand-off of GUI events from the receive thread to the publisher

use crate::error::{Error, Result};
use crate::link::telemetry::{EventSink, GuiEvent};
use crossbeam_queue::ArrayQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lock-free event queue
///
/// `emit` never blocks: a full queue or a closed bridge drops the event and
/// reports `SinkUnavailable`. Clones share the same queue.
#[derive(Clone)]
pub struct EventQueue {
    queue: Arc<ArrayQueue<GuiEvent>>,
    open: Arc<AtomicBool>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Next queued event
    pub fn pop(&self) -> Option<GuiEvent> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// More than 80% of the capacity is in use
    pub fn is_near_full(&self) -> bool {
        self.len() > self.capacity() * 8 / 10
    }

    /// Refuse further events
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl EventSink for EventQueue {
    fn emit(&self, event: GuiEvent) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(Error::SinkUnavailable("bridge stopped".into()));
        }
        self.queue
            .push(event)
            .map_err(|_| Error::SinkUnavailable("event queue full".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LogicalRobotId;
    use crate::link::telemetry::ErrorEvent;
    use serde_json::json;

    fn event(n: i64) -> GuiEvent {
        GuiEvent::Error(ErrorEvent {
            robot_id: LogicalRobotId::new(n).unwrap(),
            severity: json!(1),
            error: json!("e"),
        })
    }

    #[test]
    fn test_full_queue_reports_unavailable() {
        let queue = EventQueue::new(2);
        queue.emit(event(1)).unwrap();
        queue.emit(event(2)).unwrap();
        assert!(matches!(queue.emit(event(3)), Err(Error::SinkUnavailable(_))));

        assert_eq!(queue.pop().unwrap().robot_id().get(), 1);
        queue.emit(event(4)).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_near_full_threshold() {
        let queue = EventQueue::new(10);
        assert_eq!(queue.capacity(), 10);
        for n in 0..8 {
            queue.emit(event(n % 4 + 1)).unwrap();
        }
        assert!(!queue.is_near_full());
        queue.emit(event(1)).unwrap();
        assert!(queue.is_near_full());
    }

    #[test]
    fn test_closed_queue_refuses_events() {
        let queue = EventQueue::new(4);
        let producer = queue.clone();
        queue.close();
        assert!(producer.emit(event(1)).is_err());
        assert!(queue.is_empty());
    }
}
