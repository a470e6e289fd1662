//! Content Policy Engine
//!
//! This is the hot path - every sub-resource of every page is checked here.
//! Every failure mode falls back to letting the load through.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::cache::{CachedMatch, DecisionCache};
use crate::config::{ConfigSnapshot, PolicyConfig, PolicyFlags};
use crate::events::{EventSink, PolicyEvent};
use crate::matcher::{HitCounter, RuleMatch, RulePools};
use crate::node::HostNode;
use crate::types::{Decision, ResourceKind};

/// Maximum number of ancestors walked, and of nested link checks, while
/// tracing links. Beyond it no blocking link is assumed.
pub const MAX_LINK_DEPTH: usize = 32;

// =============================================================================
// Host Calls
// =============================================================================

/// Arguments of a load check, in either host calling convention.
#[derive(Debug, Clone)]
pub enum HostCall<'a, N> {
    /// Current interface: the requesting node is passed directly.
    Current {
        request_origin: Option<&'a str>,
        node: Option<N>,
        mime_guess: Option<&'a str>,
    },
    /// Older interface passing `(context, window)`; the context node wins.
    Legacy { context: Option<N>, window: Option<N> },
}

impl<'a, N> HostCall<'a, N> {
    /// Current-convention call with only a node.
    pub fn node(node: N) -> Self {
        Self::Current {
            request_origin: None,
            node: Some(node),
            mime_guess: None,
        }
    }

    fn into_node(self) -> Option<N> {
        match self {
            Self::Current { node, .. } => node,
            Self::Legacy { context, window } => context.or(window),
        }
    }
}

// =============================================================================
// Content Policy
// =============================================================================

/// The decision engine.
///
/// Configuration and rule pools are immutable snapshots swapped atomically;
/// a decision keeps the snapshots it started with.
pub struct ContentPolicy<N> {
    config: ArcSwap<ConfigSnapshot>,
    pools: ArcSwap<RulePools>,
    cache: DecisionCache,
    hits: Arc<dyn HitCounter>,
    sink: Arc<dyn EventSink<N>>,
}

/// Snapshots a single decision works against.
struct Frame<'s> {
    config: &'s ConfigSnapshot,
    pools: &'s RulePools,
}

impl<N: HostNode> ContentPolicy<N> {
    /// Create an engine from raw configuration.
    pub fn new(
        config: &PolicyConfig,
        pools: RulePools,
        hits: Arc<dyn HitCounter>,
        sink: Arc<dyn EventSink<N>>,
    ) -> Self {
        Self::from_snapshot(ConfigSnapshot::build(config, 1), pools, hits, sink)
    }

    /// Create an engine from a prepared snapshot (e.g. with localized labels).
    pub fn from_snapshot(
        snapshot: ConfigSnapshot,
        pools: RulePools,
        hits: Arc<dyn HitCounter>,
        sink: Arc<dyn EventSink<N>>,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(snapshot),
            pools: ArcSwap::from_pointee(pools),
            cache: DecisionCache::new(),
            hits,
            sink,
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ConfigSnapshot> {
        self.config.load_full()
    }

    /// Current rule pools.
    pub fn pools(&self) -> Arc<RulePools> {
        self.pools.load_full()
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    /// Rebuild every configuration set from `config`.
    ///
    /// Decisions started after this returns see the new snapshot.
    pub fn reconfigure(&self, config: &PolicyConfig) {
        let current = self.config.load();
        let version = current.version + 1;
        let snapshot = ConfigSnapshot::build_with_registry(config, current.registry.clone(), version);
        self.config.store(Arc::new(snapshot));
        self.cache.clear();
        log::debug!("content policy reconfigured (version {})", version);
    }

    /// Swap in new rule pools and drop every cached match.
    pub fn replace_rules(&self, pools: RulePools) {
        self.pools.store(Arc::new(pools));
        self.cache.clear();
        log::debug!("rule pools replaced, decision cache cleared");
    }

    pub fn is_blockable_scheme(&self, url: &str) -> bool {
        self.config.load().is_blockable_scheme(url)
    }

    pub fn is_local_scheme(&self, url: &str) -> bool {
        self.config.load().is_local_scheme(url)
    }

    /// Page exemption matching `url`, if any.
    pub fn is_whitelisted(&self, url: &str) -> Option<RuleMatch> {
        self.pools.load().document_whitelist.matches_any(url)
    }

    // =========================================================================
    // Host Entry Points
    // =========================================================================

    /// Decide whether a load may proceed.
    pub fn should_load(&self, kind: ResourceKind, location: &str, call: HostCall<'_, N>) -> Decision {
        let config = self.config.load_full();

        // Not a blockable type or a whitelisted scheme: usual policy
        if !(config.is_block_type(kind) && config.is_blockable_scheme(location)) {
            return Decision::Allow;
        }

        let mut node = match call.into_node() {
            Some(node) => node,
            None => return Decision::Allow,
        };

        // Frame loads report the frame element; decide for its window
        if kind == ResourceKind::SUBDOCUMENT {
            if let Some(window) = node.content_window() {
                node = window;
            }
        }

        let pools = self.pools.load_full();
        let frame = Frame {
            config: &config,
            pools: &pools,
        };
        let allowed = self.decide(&frame, &node, kind, location, false, 0);
        if !allowed {
            log::debug!("blocked {} load of {}", kind, location);
        }
        Decision::from(allowed)
    }

    /// Processing-stage check. Filtering happens at load time only.
    pub fn should_process(&self, _kind: ResourceKind, _location: &str, _call: HostCall<'_, N>) -> Decision {
        Decision::Allow
    }

    /// Check a node, annotate it and hide it if blocked.
    /// Returns `false` if the node is blocked.
    pub fn process_node(&self, node: &N, kind: ResourceKind, location: &str, force_collapse: bool) -> bool {
        let config = self.config.load_full();
        let pools = self.pools.load_full();
        let frame = Frame {
            config: &config,
            pools: &pools,
        };
        self.decide(&frame, node, kind, location, force_collapse, 0)
    }

    /// Tests whether some ancestor of `node` is a link matching a filter.
    /// Returns `false` if such a link is blocked.
    pub fn check_links(&self, node: &N) -> bool {
        let config = self.config.load_full();
        let pools = self.pools.load_full();
        let frame = Frame {
            config: &config,
            pools: &pools,
        };
        self.trace_links(&frame, node, 0)
    }

    // =========================================================================
    // Decision
    // =========================================================================

    fn decide(
        &self,
        frame: &Frame<'_>,
        node: &N,
        mut kind: ResourceKind,
        location: &str,
        force_collapse: bool,
        depth: usize,
    ) -> bool {
        let config = frame.config;

        let Some(window) = node.owner_window() else {
            log::trace!("no window for {:?}, allowing {}", node, location);
            return true;
        };
        let Some(top) = window.top_window() else {
            return true;
        };

        let top_location = top.location_href().unwrap_or_default();
        let mut blockable = config.is_blockable_scheme(&top_location);
        if !blockable
            && config.flags.contains(PolicyFlags::BLOCK_LOCAL_PAGES)
            && config.is_local_scheme(&top_location)
        {
            blockable = true;
        }
        if !blockable {
            return true;
        }

        if let Some(page_match) = frame.pools.document_whitelist.matches_any(&top_location) {
            self.hits.increase_hit_count(&page_match);
            log::trace!("page {} whitelisted by {}", top_location, page_match);
            return true;
        }

        let mut matched = None;
        let mut links_ok = true;
        if config.flags.contains(PolicyFlags::ENABLED) {
            matched = self.lookup(frame.pools, location);
            if let Some(rule) = &matched {
                self.hits.increase_hit_count(rule);
            }

            if !node.is_window() {
                if config.flags.contains(PolicyFlags::LINK_CHECK) && config.should_check_links(kind) {
                    // A link's own href is the location being decided, so only
                    // enclosing links are traced
                    let start = if kind == ResourceKind::LINK {
                        node.parent_node()
                    } else {
                        Some(node.clone())
                    };
                    if let Some(start) = start {
                        links_ok = self.trace_links(frame, &start, depth);
                    }
                }

                // Object tabs, unless the object is the window's own document
                if matched.is_none()
                    && config.flags.contains(PolicyFlags::FRAME_OBJECTS)
                    && kind == ResourceKind::OBJECT
                    && window.location_href().as_deref() != Some(location)
                {
                    self.sink.emit(PolicyEvent::OfferObjectTab {
                        node: node.clone(),
                        location: location.to_string(),
                        top: top.clone(),
                    });
                }
            }
        }

        // Images loaded by a window or document are background images
        let mut target = Some(node.clone());
        if kind == ResourceKind::IMAGE && (node.is_window() || node.is_document()) {
            kind = ResourceKind::BACKGROUND;
            if node.is_window() {
                target = node.document();
            }
        }

        self.sink.emit(PolicyEvent::AddNode {
            top,
            node: target.clone(),
            kind,
            location: location.to_string(),
            matched: matched.clone(),
            collapse_hint: force_collapse,
        });

        if let (Some(rule), Some(target)) = (&matched, target) {
            if !rule.is_whitelist() {
                let mut collapse = force_collapse || !config.flags.contains(PolicyFlags::FAST_COLLAPSE_DISABLED);
                collapse = collapse && config.is_collapsible(kind);
                self.sink.emit(PolicyEvent::HideNode {
                    node: target,
                    window,
                    collapse,
                });
            }
        }

        match matched {
            Some(rule) => rule.is_whitelist(),
            None => links_ok,
        }
    }

    /// Cached match for `location`, querying the pools on a miss.
    fn lookup(&self, pools: &RulePools, location: &str) -> Option<RuleMatch> {
        if let Some(cached) = self.cache.get(location) {
            return cached.into_option();
        }

        let result = pools
            .block
            .matches_any(location)
            .or_else(|| pools.exception.matches_any(location));
        log::trace!("cache miss for {}: {:?}", location, result);
        self.cache.insert(location, CachedMatch::from(result.clone()));
        result
    }

    fn trace_links(&self, frame: &Frame<'_>, node: &N, depth: usize) -> bool {
        if depth >= MAX_LINK_DEPTH {
            log::debug!("link tracing depth exceeded at {:?}", node);
            return true;
        }

        let mut current = Some(node.clone());
        let mut steps = 0;
        while let Some(candidate) = current {
            if steps >= MAX_LINK_DEPTH {
                return true;
            }

            if let Some(href) = candidate.href() {
                if !href.is_empty() && frame.config.is_blockable_scheme(&href) {
                    return self.decide(frame, &candidate, ResourceKind::LINK, &href, false, depth + 1);
                }
            }

            current = candidate.parent_node();
            steps += 1;
        }

        true
    }
}
