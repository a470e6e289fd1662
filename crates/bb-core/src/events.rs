//! Output channel for side effects
//!
//! The engine never touches the UI. Annotations, hide requests and object-tab
//! offers are appended to a sink in the order they are decided; the host
//! drains and applies them on its own schedule.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::matcher::RuleMatch;
use crate::types::ResourceKind;

/// A side effect decided by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyEvent<N> {
    /// Record a processed load against its top-level context.
    AddNode {
        top: N,
        node: Option<N>,
        kind: ResourceKind,
        location: String,
        matched: Option<RuleMatch>,
        collapse_hint: bool,
    },
    /// Hide a blocked node; `collapse` also removes the space it takes.
    HideNode { node: N, window: N, collapse: bool },
    /// Offer a tab for a standalone object. The host runs it deferred.
    OfferObjectTab { node: N, location: String, top: N },
}

impl<N> PolicyEvent<N> {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "add-node",
            Self::HideNode { .. } => "hide-node",
            Self::OfferObjectTab { .. } => "object-tab",
        }
    }
}

/// Receives engine events.
pub trait EventSink<N>: Send + Sync {
    fn emit(&self, event: PolicyEvent<N>);
}

/// Ordered in-memory queue of events.
#[derive(Debug)]
pub struct EventQueue<N> {
    events: Mutex<VecDeque<PolicyEvent<N>>>,
}

impl<N> EventQueue<N> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<PolicyEvent<N>> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Send> EventSink<N> for EventQueue<N> {
    fn emit(&self, event: PolicyEvent<N>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<N> EventSink<N> for NullSink {
    fn emit(&self, _event: PolicyEvent<N>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_preserves_order() {
        let queue: EventQueue<u32> = EventQueue::new();
        queue.emit(PolicyEvent::HideNode { node: 1, window: 0, collapse: true });
        queue.emit(PolicyEvent::OfferObjectTab {
            node: 2,
            location: "https://a.example/movie.swf".to_string(),
            top: 0,
        });
        assert_eq!(queue.len(), 2);

        let events = queue.drain();
        assert_eq!(events[0].name(), "hide-node");
        assert_eq!(events[1].name(), "object-tab");
        assert!(queue.is_empty());
    }
}
