//! In-memory page model
//!
//! A static tree of windows, documents and elements implementing the host
//! capability traits. Used by the CLI to replay recorded pages and by tests.

use std::fmt;
use std::sync::Arc;

use crate::node::{HasHref, HasParent, WindowLike};

/// Index of a node inside its page.
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Window,
    Document,
    Element,
}

#[derive(Debug, Clone)]
struct NodeData {
    node_type: NodeType,
    tag: String,
    /// DOM parent; for a window, the frame element hosting it
    parent: Option<NodeId>,
    /// Owning window (self for windows)
    window: Option<NodeId>,
    href: Option<String>,
    location: Option<String>,
    document: Option<NodeId>,
    content_window: Option<NodeId>,
}

impl NodeData {
    fn new(node_type: NodeType, tag: &str) -> Self {
        Self {
            node_type,
            tag: tag.to_string(),
            parent: None,
            window: None,
            href: None,
            location: None,
            document: None,
            content_window: None,
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Incrementally builds a [`Page`].
#[derive(Debug, Clone)]
pub struct PageBuilder {
    nodes: Vec<NodeData>,
}

impl PageBuilder {
    /// Start a page whose top window shows `location`.
    pub fn new(location: &str) -> Self {
        let mut builder = Self { nodes: Vec::new() };
        builder.push_window(location, None);
        builder
    }

    /// The top-level window.
    pub fn top_window(&self) -> NodeId {
        0
    }

    /// Document of a window created by this builder.
    pub fn document_of(&self, window: NodeId) -> Option<NodeId> {
        self.nodes.get(window).and_then(|n| n.document)
    }

    /// Document of the top-level window.
    pub fn top_document(&self) -> NodeId {
        1
    }

    /// Append an element under `parent`.
    pub fn element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let window = self.nodes[parent].window;
        let mut data = NodeData::new(NodeType::Element, tag);
        data.parent = Some(parent);
        data.window = window;
        self.push(data)
    }

    /// Append an element with an `href` under `parent`.
    pub fn link(&mut self, parent: NodeId, tag: &str, href: &str) -> NodeId {
        let id = self.element(parent, tag);
        self.nodes[id].href = Some(href.to_string());
        id
    }

    /// Append a frame element under `parent` hosting a window at `location`.
    /// Returns `(frame element, inner window)`.
    pub fn frame(&mut self, parent: NodeId, location: &str) -> (NodeId, NodeId) {
        let frame = self.element(parent, "iframe");
        let inner = self.push_window(location, Some(frame));
        self.nodes[frame].content_window = Some(inner);
        (frame, inner)
    }

    /// An element that is not attached to any window.
    pub fn detached(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::new(NodeType::Element, tag))
    }

    pub fn build(self) -> Page {
        Page {
            nodes: self.nodes.into(),
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        self.nodes.len() - 1
    }

    fn push_window(&mut self, location: &str, host: Option<NodeId>) -> NodeId {
        let window = self.nodes.len();
        let mut data = NodeData::new(NodeType::Window, "#window");
        data.parent = host;
        data.window = Some(window);
        data.location = Some(location.to_string());
        data.document = Some(window + 1);
        self.push(data);

        let mut doc = NodeData::new(NodeType::Document, "#document");
        doc.window = Some(window);
        self.push(doc);
        window
    }
}

// =============================================================================
// Page
// =============================================================================

/// A finished, immutable page.
#[derive(Debug, Clone)]
pub struct Page {
    nodes: Arc<[NodeData]>,
}

impl Page {
    /// Handle for node `id`. Panics if the id was not produced by the builder.
    pub fn node(&self, id: NodeId) -> PageNode {
        assert!(id < self.nodes.len(), "node {} out of range", id);
        PageNode {
            nodes: Arc::clone(&self.nodes),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Handle to one node of a [`Page`].
#[derive(Clone)]
pub struct PageNode {
    nodes: Arc<[NodeData]>,
    id: NodeId,
}

impl PageNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_type(&self) -> NodeType {
        self.data().node_type
    }

    pub fn tag(&self) -> &str {
        &self.data().tag
    }

    fn data(&self) -> &NodeData {
        &self.nodes[self.id]
    }

    fn sibling(&self, id: NodeId) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
            id,
        }
    }
}

impl PartialEq for PageNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.nodes, &other.nodes)
    }
}

impl Eq for PageNode {}

impl fmt::Debug for PageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag(), self.id)
    }
}

impl HasParent for PageNode {
    fn parent_node(&self) -> Option<Self> {
        // Windows are not part of the element tree.
        if self.data().node_type == NodeType::Window {
            return None;
        }
        self.data().parent.map(|id| self.sibling(id))
    }
}

impl HasHref for PageNode {
    fn href(&self) -> Option<String> {
        self.data().href.clone()
    }
}

impl WindowLike for PageNode {
    fn is_window(&self) -> bool {
        self.data().node_type == NodeType::Window
    }

    fn is_document(&self) -> bool {
        self.data().node_type == NodeType::Document
    }

    fn owner_window(&self) -> Option<Self> {
        self.data().window.map(|id| self.sibling(id))
    }

    fn top_window(&self) -> Option<Self> {
        let mut current = self.owner_window()?;
        while let Some(frame) = current.data().parent {
            current = self.sibling(frame).owner_window()?;
        }
        Some(current)
    }

    fn location_href(&self) -> Option<String> {
        self.data().location.clone()
    }

    fn document(&self) -> Option<Self> {
        self.data().document.map(|id| self.sibling(id))
    }

    fn content_window(&self) -> Option<Self> {
        self.data().content_window.map(|id| self.sibling(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_relations() {
        let mut builder = PageBuilder::new("https://site.example/");
        let body = builder.element(builder.top_document(), "body");
        let anchor = builder.link(body, "a", "https://ads.example/click");
        let img = builder.element(anchor, "img");
        let page = builder.build();

        let img = page.node(img);
        assert_eq!(img.parent_node(), Some(page.node(anchor)));
        assert_eq!(page.node(anchor).href().as_deref(), Some("https://ads.example/click"));
        assert_eq!(img.owner_window(), Some(page.node(0)));
        assert_eq!(img.top_window(), Some(page.node(0)));
        assert_eq!(page.node(1).parent_node(), None);
        assert!(page.node(1).is_document());
    }

    #[test]
    fn test_frames_resolve_to_top() {
        let mut builder = PageBuilder::new("https://site.example/");
        let body = builder.element(builder.top_document(), "body");
        let (frame, inner) = builder.frame(body, "https://frame.example/");
        let inner_doc = builder.document_of(inner).unwrap();
        let (_, nested) = builder.frame(inner_doc, "https://nested.example/");
        let script = builder.element(builder.document_of(nested).unwrap(), "script");
        let page = builder.build();

        assert_eq!(page.node(frame).content_window(), Some(page.node(inner)));
        assert!(page.node(inner).is_window());
        assert_eq!(page.node(inner).parent_node(), None);
        assert_eq!(page.node(script).owner_window(), Some(page.node(nested)));
        assert_eq!(page.node(script).top_window(), Some(page.node(0)));
        assert_eq!(
            page.node(nested).location_href().as_deref(),
            Some("https://nested.example/")
        );
    }

    #[test]
    fn test_detached_has_no_window() {
        let mut builder = PageBuilder::new("https://site.example/");
        let orphan = builder.detached("img");
        let page = builder.build();
        assert_eq!(page.node(orphan).owner_window(), None);
        assert_eq!(page.node(orphan).top_window(), None);
    }
}
