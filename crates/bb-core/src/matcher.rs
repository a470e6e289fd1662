//! Rule pool contract
//!
//! Compiling filter text is someone else's job. The engine only asks a
//! compiled pool for the best match of a URL and reports hits back.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

// =============================================================================
// Rule Match
// =============================================================================

/// What a matched rule asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Blocking filter
    Block,
    /// Exception filter (@@...) - allows the request
    Whitelist,
    /// Whole-page exemption
    WhitelistPage,
}

/// Identifier of a rule inside its pool.
pub type RuleId = u32;

/// Result of a successful pattern query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleMatch {
    pub kind: MatchKind,
    /// Rule ID that matched (for hit counting)
    pub rule_id: RuleId,
    /// Filter text of the rule, for display
    pub text: Arc<str>,
}

impl RuleMatch {
    pub fn new(kind: MatchKind, rule_id: RuleId, text: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            rule_id,
            text: text.into(),
        }
    }

    /// Exception or page exemption; either one lets the load through.
    #[inline]
    pub fn is_whitelist(&self) -> bool {
        matches!(self.kind, MatchKind::Whitelist | MatchKind::WhitelistPage)
    }
}

impl fmt::Display for RuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} #{} {}", self.kind, self.rule_id, self.text)
    }
}

// =============================================================================
// Pattern Matcher
// =============================================================================

/// A compiled pool of rules.
pub trait PatternMatcher: Send + Sync {
    /// Best match for `url`, if any rule in the pool matches.
    fn matches_any(&self, url: &str) -> Option<RuleMatch>;
}

/// A pool that never matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPool;

impl PatternMatcher for EmptyPool {
    fn matches_any(&self, _url: &str) -> Option<RuleMatch> {
        None
    }
}

/// The three independently maintained rule pools.
#[derive(Clone)]
pub struct RulePools {
    /// Blocking filters
    pub block: Arc<dyn PatternMatcher>,
    /// Exception filters
    pub exception: Arc<dyn PatternMatcher>,
    /// Whole-page exemptions
    pub document_whitelist: Arc<dyn PatternMatcher>,
}

impl RulePools {
    pub fn new(
        block: Arc<dyn PatternMatcher>,
        exception: Arc<dyn PatternMatcher>,
        document_whitelist: Arc<dyn PatternMatcher>,
    ) -> Self {
        Self {
            block,
            exception,
            document_whitelist,
        }
    }

    /// Pools with no rules at all.
    pub fn empty() -> Self {
        Self::new(Arc::new(EmptyPool), Arc::new(EmptyPool), Arc::new(EmptyPool))
    }
}

impl Default for RulePools {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RulePools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RulePools").finish_non_exhaustive()
    }
}

// =============================================================================
// Hit Counting
// =============================================================================

/// Receives a notification every time a rule decides a load.
pub trait HitCounter: Send + Sync {
    fn increase_hit_count(&self, rule: &RuleMatch);
}

/// In-memory hit counters keyed by (kind, rule id).
#[derive(Debug, Default)]
pub struct HitCounts {
    counts: DashMap<(MatchKind, RuleId), AtomicU64>,
}

impl HitCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits recorded for a rule.
    pub fn hits(&self, kind: MatchKind, rule_id: RuleId) -> u64 {
        self.counts
            .get(&(kind, rule_id))
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Sum over all rules.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    pub fn reset(&self) {
        self.counts.clear();
    }
}

impl HitCounter for HitCounts {
    fn increase_hit_count(&self, rule: &RuleMatch) {
        self.counts
            .entry((rule.kind, rule.rule_id))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_counts() {
        let hits = HitCounts::new();
        let rule = RuleMatch::new(MatchKind::Block, 3, "||ads.example^");
        hits.increase_hit_count(&rule);
        hits.increase_hit_count(&rule);
        hits.increase_hit_count(&RuleMatch::new(MatchKind::Whitelist, 3, "@@||ads.example^"));

        assert_eq!(hits.hits(MatchKind::Block, 3), 2);
        assert_eq!(hits.hits(MatchKind::Whitelist, 3), 1);
        assert_eq!(hits.hits(MatchKind::Block, 4), 0);
        assert_eq!(hits.total(), 3);

        hits.reset();
        assert_eq!(hits.total(), 0);
    }

    #[test]
    fn test_empty_pools() {
        let pools = RulePools::empty();
        assert_eq!(pools.block.matches_any("https://a.example/"), None);
        assert_eq!(pools.document_whitelist.matches_any("https://a.example/"), None);
    }

    #[test]
    fn test_match_equality() {
        let a = RuleMatch::new(MatchKind::Block, 1, "ads");
        let b = RuleMatch::new(MatchKind::Block, 1, "ads");
        assert_eq!(a, b);
        assert!(!a.is_whitelist());
        assert_eq!(a.to_string(), "Block #1 ads");
    }
}
