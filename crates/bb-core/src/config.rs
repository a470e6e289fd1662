//! Policy configuration and the derived lookup sets
//!
//! `PolicyConfig` is what a preferences store hands us. `ConfigSnapshot` is the
//! immutable, pre-parsed form the engine consults on every load.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{ResourceKind, TypeRegistry};
use crate::url::normalized_scheme;

// =============================================================================
// Raw Configuration
// =============================================================================

/// Configuration as supplied by the host preferences.
///
/// List-valued fields are space separated and case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Resource kinds the engine may block
    pub block_types: String,
    /// Resource kinds whose enclosing links are traced
    pub link_types: String,
    /// Resource kinds that are hidden but never collapsed
    pub non_collapsible_types: String,
    /// Schemes that are never filtered
    pub whitelist_schemes: String,
    /// Schemes of local pages
    pub local_schemes: String,
    /// Master switch for rule matching
    pub enabled: bool,
    /// Trace ancestor links of loads
    pub link_check: bool,
    /// Filter loads on local pages too
    pub block_local_pages: bool,
    /// Offer tabs for standalone objects
    pub frame_objects: bool,
    /// Disable collapsing of blocked elements
    pub fast_collapse_disabled: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            block_types: "SCRIPT IMAGE STYLESHEET OBJECT SUBDOCUMENT BACKGROUND".to_string(),
            link_types: "IMAGE OBJECT".to_string(),
            non_collapsible_types: "DOCUMENT BACKGROUND".to_string(),
            whitelist_schemes: "about chrome file irc moz-safe-about news resource snews x-jsd \
                                addbook cid imap mailbox nntp pop data javascript moz-icon"
                .to_string(),
            local_schemes: "file".to_string(),
            enabled: true,
            link_check: false,
            block_local_pages: false,
            frame_objects: true,
            fast_collapse_disabled: false,
        }
    }
}

// =============================================================================
// Flags
// =============================================================================

bitflags::bitflags! {
    /// Boolean switches of a configuration snapshot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PolicyFlags: u8 {
        const ENABLED = 1 << 0;
        const LINK_CHECK = 1 << 1;
        const BLOCK_LOCAL_PAGES = 1 << 2;
        const FRAME_OBJECTS = 1 << 3;
        const FAST_COLLAPSE_DISABLED = 1 << 4;
    }
}

impl PolicyFlags {
    fn from_config(config: &PolicyConfig) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ENABLED, config.enabled);
        flags.set(Self::LINK_CHECK, config.link_check);
        flags.set(Self::BLOCK_LOCAL_PAGES, config.block_local_pages);
        flags.set(Self::FRAME_OBJECTS, config.frame_objects);
        flags.set(Self::FAST_COLLAPSE_DISABLED, config.fast_collapse_disabled);
        flags
    }
}

// =============================================================================
// List Translation
// =============================================================================

/// Translate a space separated list of kind names into a set of kinds.
/// Unknown names are dropped.
pub fn translate_type_list(registry: &TypeRegistry, list: &str) -> HashSet<ResourceKind> {
    list.to_ascii_uppercase()
        .split(' ')
        .filter_map(|name| registry.code_for(name))
        .collect()
}

/// Translate a space separated list into a set of upper-case entries.
pub fn translate_list(list: &str) -> HashSet<String> {
    list.to_ascii_uppercase()
        .split(' ')
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable, pre-parsed configuration.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Incremented on every rebuild
    pub version: u64,
    pub registry: TypeRegistry,
    pub block_types: HashSet<ResourceKind>,
    pub link_types: HashSet<ResourceKind>,
    pub non_collapsible_types: HashSet<ResourceKind>,
    pub whitelist_schemes: HashSet<String>,
    pub local_schemes: HashSet<String>,
    pub flags: PolicyFlags,
}

impl ConfigSnapshot {
    /// Build a snapshot with the default registry.
    pub fn build(config: &PolicyConfig, version: u64) -> Self {
        Self::build_with_registry(config, TypeRegistry::new(), version)
    }

    /// Build a snapshot around an existing (possibly localized) registry.
    pub fn build_with_registry(config: &PolicyConfig, registry: TypeRegistry, version: u64) -> Self {
        Self {
            version,
            block_types: translate_type_list(&registry, &config.block_types),
            link_types: translate_type_list(&registry, &config.link_types),
            non_collapsible_types: translate_type_list(&registry, &config.non_collapsible_types),
            whitelist_schemes: translate_list(&config.whitelist_schemes),
            local_schemes: translate_list(&config.local_schemes),
            flags: PolicyFlags::from_config(config),
            registry,
        }
    }

    #[inline]
    pub fn is_block_type(&self, kind: ResourceKind) -> bool {
        self.block_types.contains(&kind)
    }

    #[inline]
    pub fn should_check_links(&self, kind: ResourceKind) -> bool {
        self.link_types.contains(&kind)
    }

    #[inline]
    pub fn is_collapsible(&self, kind: ResourceKind) -> bool {
        !self.non_collapsible_types.contains(&kind)
    }

    /// True unless the URL's scheme is whitelisted. Unparsable URLs are
    /// never blockable.
    pub fn is_blockable_scheme(&self, url: &str) -> bool {
        match normalized_scheme(url) {
            Ok(scheme) => !self.whitelist_schemes.contains(&scheme),
            Err(err) => {
                log::trace!("unblockable location {:?}: {}", url, err);
                false
            }
        }
    }

    /// True if the URL's scheme is one of the local schemes.
    pub fn is_local_scheme(&self, url: &str) -> bool {
        normalized_scheme(url)
            .map(|scheme| self.local_schemes.contains(&scheme))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_type_list() {
        let registry = TypeRegistry::new();
        let set = translate_type_list(&registry, "script Image  BOGUS link");
        assert_eq!(set.len(), 3);
        assert!(set.contains(&ResourceKind::SCRIPT));
        assert!(set.contains(&ResourceKind::IMAGE));
        assert!(set.contains(&ResourceKind::LINK));
    }

    #[test]
    fn test_translate_is_idempotent() {
        let registry = TypeRegistry::new();
        let a = translate_type_list(&registry, "OBJECT subdocument");
        let b = translate_type_list(&registry, "OBJECT subdocument");
        assert_eq!(a, b);
        assert_eq!(translate_list("about chrome"), translate_list("about chrome"));
        assert!(translate_list("about chrome").contains("CHROME"));
    }

    #[test]
    fn test_scheme_classification() {
        let snapshot = ConfigSnapshot::build(&PolicyConfig::default(), 1);
        assert!(snapshot.is_blockable_scheme("https://ads.example/a.js"));
        assert!(!snapshot.is_blockable_scheme("chrome://browser/content"));
        assert!(!snapshot.is_blockable_scheme("DATA:image/png;base64,AA"));
        assert!(!snapshot.is_blockable_scheme("not a url"));
        assert!(!snapshot.is_blockable_scheme(""));

        assert!(snapshot.is_local_scheme("file:///tmp/index.html"));
        assert!(!snapshot.is_local_scheme("https://example.com"));
        assert!(!snapshot.is_local_scheme("garbage"));
    }

    #[test]
    fn test_flags_follow_config() {
        let config = PolicyConfig {
            enabled: false,
            link_check: true,
            ..PolicyConfig::default()
        };
        let snapshot = ConfigSnapshot::build(&config, 7);
        assert_eq!(snapshot.version, 7);
        assert!(!snapshot.flags.contains(PolicyFlags::ENABLED));
        assert!(snapshot.flags.contains(PolicyFlags::LINK_CHECK));
        assert!(snapshot.flags.contains(PolicyFlags::FRAME_OBJECTS));
    }

    #[test]
    fn test_default_sets() {
        let snapshot = ConfigSnapshot::build(&PolicyConfig::default(), 0);
        assert!(snapshot.is_block_type(ResourceKind::SCRIPT));
        assert!(!snapshot.is_block_type(ResourceKind::OTHER));
        assert!(snapshot.should_check_links(ResourceKind::IMAGE));
        assert!(!snapshot.is_collapsible(ResourceKind::BACKGROUND));
        assert!(snapshot.is_collapsible(ResourceKind::IMAGE));
    }

    #[test]
    fn test_partial_json_config() {
        let config: PolicyConfig =
            serde_json::from_str(r#"{"link_check": true, "local_schemes": "file jar"}"#).unwrap();
        assert!(config.link_check);
        assert!(config.enabled);
        assert_eq!(config.local_schemes, "file jar");
        assert_eq!(config.block_types, PolicyConfig::default().block_types);
    }
}
