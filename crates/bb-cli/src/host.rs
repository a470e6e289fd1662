//! Host integration for replays
//!
//! Drains engine events and applies them: annotations are recorded per
//! top-level window, hide requests are tracked per node and object-tab offers
//! are run as delayed tasks that can be cancelled until they fire.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bb_core::page::{NodeId, PageNode};
use bb_core::{PolicyEvent, ResourceKind, RuleMatch};

/// One processed load, as recorded for its top-level window.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub node: Option<NodeId>,
    pub kind: ResourceKind,
    pub location: String,
    pub matched: Option<RuleMatch>,
}

/// An object tab that was offered after its delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedTab {
    pub node: NodeId,
    pub location: String,
    pub top: NodeId,
}

// =============================================================================
// Object Tab Scheduler
// =============================================================================

/// Runs object-tab offers after a fixed delay.
pub struct ObjectTabScheduler {
    delay: Duration,
    tasks: Vec<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<OfferedTab>,
    rx: mpsc::UnboundedReceiver<OfferedTab>,
}

impl ObjectTabScheduler {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            delay,
            tasks: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn schedule(&mut self, tab: OfferedTab) {
        let tx = self.tx.clone();
        let delay = self.delay;
        self.tasks.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(tab);
        }));
    }

    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Abort every task that has not fired yet.
    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Wait for every scheduled task and return the offers, in firing order.
    pub async fn finish(mut self) -> Vec<OfferedTab> {
        for task in self.tasks.drain(..) {
            // Aborted tasks simply produce no offer
            let _ = task.await;
        }
        drop(self.tx);

        let mut offered = Vec::new();
        while let Some(tab) = self.rx.recv().await {
            offered.push(tab);
        }
        offered
    }
}

// =============================================================================
// Replay Host
// =============================================================================

/// Applies engine events the way a browser binding would.
pub struct ReplayHost {
    annotations: BTreeMap<NodeId, Vec<Annotation>>,
    hidden: BTreeMap<NodeId, bool>,
    scheduler: ObjectTabScheduler,
}

impl ReplayHost {
    pub fn new(object_tab_delay: Duration) -> Self {
        Self {
            annotations: BTreeMap::new(),
            hidden: BTreeMap::new(),
            scheduler: ObjectTabScheduler::new(object_tab_delay),
        }
    }

    pub fn apply(&mut self, events: Vec<PolicyEvent<PageNode>>) {
        for event in events {
            tracing::trace!("applying {} event", event.name());
            match event {
                PolicyEvent::AddNode {
                    top,
                    node,
                    kind,
                    location,
                    matched,
                    ..
                } => {
                    self.annotations.entry(top.id()).or_default().push(Annotation {
                        node: node.map(|n| n.id()),
                        kind,
                        location,
                        matched,
                    });
                }
                PolicyEvent::HideNode { node, collapse, .. } => {
                    let entry = self.hidden.entry(node.id()).or_insert(false);
                    *entry |= collapse;
                }
                PolicyEvent::OfferObjectTab { node, location, top } => {
                    self.scheduler.schedule(OfferedTab {
                        node: node.id(),
                        location,
                        top: top.id(),
                    });
                }
            }
        }
    }

    /// Hidden nodes and whether each was collapsed.
    pub fn hidden(&self) -> &BTreeMap<NodeId, bool> {
        &self.hidden
    }

    pub fn scheduler_mut(&mut self) -> &mut ObjectTabScheduler {
        &mut self.scheduler
    }

    /// Wait for pending object tabs.
    pub async fn finish(self) -> (BTreeMap<NodeId, Vec<Annotation>>, BTreeMap<NodeId, bool>, Vec<OfferedTab>) {
        let tabs = self.scheduler.finish().await;
        (self.annotations, self.hidden, tabs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb_core::page::PageBuilder;
    use bb_core::MatchKind;

    fn page() -> (bb_core::page::Page, NodeId) {
        let mut builder = PageBuilder::new("https://site.example/");
        let object = builder.element(builder.top_document(), "object");
        (builder.build(), object)
    }

    #[tokio::test]
    async fn test_object_tab_fires_after_delay() {
        let (page, object) = page();
        let mut host = ReplayHost::new(Duration::from_millis(5));
        host.apply(vec![PolicyEvent::OfferObjectTab {
            node: page.node(object),
            location: "https://media.example/m.swf".to_string(),
            top: page.node(0),
        }]);

        let (_, _, tabs) = host.finish().await;
        assert_eq!(
            tabs,
            vec![OfferedTab {
                node: object,
                location: "https://media.example/m.swf".to_string(),
                top: 0,
            }]
        );
    }

    #[tokio::test]
    async fn test_cancelled_tabs_never_fire() {
        let (page, object) = page();
        let mut host = ReplayHost::new(Duration::from_secs(30));
        host.apply(vec![PolicyEvent::OfferObjectTab {
            node: page.node(object),
            location: "https://media.example/m.swf".to_string(),
            top: page.node(0),
        }]);
        assert_eq!(host.scheduler_mut().pending(), 1);

        host.scheduler_mut().cancel_all();
        let (_, _, tabs) = host.finish().await;
        assert!(tabs.is_empty());
    }

    #[tokio::test]
    async fn test_annotations_and_hides_recorded() {
        let (page, object) = page();
        let rule = RuleMatch::new(MatchKind::Block, 0, "ads");
        let mut host = ReplayHost::new(Duration::ZERO);
        host.apply(vec![
            PolicyEvent::AddNode {
                top: page.node(0),
                node: Some(page.node(object)),
                kind: ResourceKind::OBJECT,
                location: "https://ads.example/a.swf".to_string(),
                matched: Some(rule.clone()),
                collapse_hint: false,
            },
            PolicyEvent::HideNode {
                node: page.node(object),
                window: page.node(0),
                collapse: true,
            },
        ]);

        assert_eq!(host.hidden().get(&object), Some(&true));

        let (annotations, hidden, tabs) = host.finish().await;
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[&0].len(), 1);
        assert_eq!(annotations[&0][0].node, Some(object));
        assert_eq!(annotations[&0][0].matched, Some(rule));
        assert_eq!(hidden.len(), 1);
        assert!(tabs.is_empty());
    }
}
