//! Core type definitions for BetterBlocker
//!
//! Resource kinds use the host's content-policy codes so that a kind the
//! registry does not know about can still flow through the engine untouched.

use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Resource Kinds
// =============================================================================

/// Kind of resource a load is for.
///
/// A transparent wrapper over the host's numeric code. Only the constants
/// below are registered; any other code is passed through as-is and is never
/// blockable unless a configuration names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ResourceKind(pub u32);

impl ResourceKind {
    pub const OTHER: Self = Self(1);
    pub const SCRIPT: Self = Self(2);
    pub const IMAGE: Self = Self(3);
    pub const STYLESHEET: Self = Self(4);
    pub const OBJECT: Self = Self(5);
    pub const DOCUMENT: Self = Self(6);
    pub const SUBDOCUMENT: Self = Self(7);

    /// Synthetic kind for hyperlinks found by link tracing.
    pub const LINK: Self = Self(0xFFFF);
    /// Synthetic kind for images loaded by a window or whole document.
    pub const BACKGROUND: Self = Self(0xFFFE);

    /// Raw host code.
    #[inline]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl From<u32> for ResourceKind {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KINDS.iter().find(|(_, kind, _)| kind == self) {
            Some((name, _, _)) => f.pad(name),
            None => f.pad(&format!("#{}", self.0)),
        }
    }
}

/// Registered kinds: description, code, default display label.
const KINDS: [(&str, ResourceKind, &str); 9] = [
    ("OTHER", ResourceKind::OTHER, "other"),
    ("SCRIPT", ResourceKind::SCRIPT, "script"),
    ("IMAGE", ResourceKind::IMAGE, "image"),
    ("STYLESHEET", ResourceKind::STYLESHEET, "stylesheet"),
    ("OBJECT", ResourceKind::OBJECT, "object"),
    ("SUBDOCUMENT", ResourceKind::SUBDOCUMENT, "frame"),
    ("DOCUMENT", ResourceKind::DOCUMENT, "document"),
    ("LINK", ResourceKind::LINK, "link"),
    ("BACKGROUND", ResourceKind::BACKGROUND, "background image"),
];

// =============================================================================
// Type Registry
// =============================================================================

/// Bidirectional lookup between kind names, codes and display labels.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_name: HashMap<&'static str, ResourceKind>,
    names: HashMap<ResourceKind, &'static str>,
    labels: HashMap<ResourceKind, String>,
}

impl TypeRegistry {
    /// Build the registry with the default English labels.
    pub fn new() -> Self {
        let mut by_name = HashMap::with_capacity(KINDS.len());
        let mut names = HashMap::with_capacity(KINDS.len());
        let mut labels = HashMap::with_capacity(KINDS.len());

        for (name, kind, label) in KINDS {
            by_name.insert(name, kind);
            names.insert(kind, name);
            labels.insert(kind, label.to_string());
        }

        Self { by_name, names, labels }
    }

    /// Build the registry with localized labels.
    ///
    /// Keys are kind names (case-insensitive); kinds missing from the map keep
    /// their default label and unknown names are ignored.
    pub fn with_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut registry = Self::new();
        for (name, label) in labels {
            if let Some(kind) = registry.code_for(name.as_ref()) {
                registry.labels.insert(kind, label.into());
            }
        }
        registry
    }

    /// Look up the kind registered under `name`.
    pub fn code_for(&self, name: &str) -> Option<ResourceKind> {
        self.by_name.get(name.to_ascii_uppercase().as_str()).copied()
    }

    /// Upper-case description of a registered kind.
    pub fn name_for(&self, kind: ResourceKind) -> Option<&'static str> {
        self.names.get(&kind).copied()
    }

    /// Display label of a registered kind.
    pub fn label_for(&self, kind: ResourceKind) -> Option<&str> {
        self.labels.get(&kind).map(String::as_str)
    }

    /// All registered kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = (&'static str, ResourceKind)> + '_ {
        KINDS.iter().map(|(name, kind, _)| (*name, *kind))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Decision
// =============================================================================

/// Verdict handed back to the host for a single load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the load proceed under the host's usual policy
    Allow,
    /// Reject the load
    Block,
}

impl Decision {
    #[inline]
    pub fn is_allow(self) -> bool {
        self == Self::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Block
        }
    }
}
