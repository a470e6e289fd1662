//! Host capability traits
//!
//! The engine never sees concrete DOM objects. A host binding implements
//! these traits on whatever handle it uses for windows, documents and
//! elements; one handle type covers all three.

use std::fmt;

/// Access to the DOM parent relation.
pub trait HasParent: Sized {
    /// Parent node, or `None` at the root.
    fn parent_node(&self) -> Option<Self>;
}

/// Access to a hyperlink-like target.
pub trait HasHref {
    /// Resolved `href` of the node, if it has one.
    fn href(&self) -> Option<String>;
}

/// Window and document relations.
pub trait WindowLike: Sized {
    /// The node is a window.
    fn is_window(&self) -> bool;

    /// The node is a whole document.
    fn is_document(&self) -> bool;

    /// Window that owns the node. A window owns itself.
    fn owner_window(&self) -> Option<Self>;

    /// Top-level window of the browsing context this window belongs to.
    fn top_window(&self) -> Option<Self>;

    /// Current location of a window.
    fn location_href(&self) -> Option<String>;

    /// Document of a window.
    fn document(&self) -> Option<Self>;

    /// Inner window of a frame element.
    fn content_window(&self) -> Option<Self>;
}

/// Everything the engine needs from a host node handle.
pub trait HostNode: HasParent + HasHref + WindowLike + Clone + fmt::Debug + Send + Sync {}

impl<T> HostNode for T where T: HasParent + HasHref + WindowLike + Clone + fmt::Debug + Send + Sync {}
