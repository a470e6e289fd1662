//! Decision Cache
//!
//! Memoizes pattern-query results per URL. Entries live until the rule pools
//! or the configuration change; there is no TTL.

use dashmap::DashMap;

use crate::matcher::RuleMatch;

/// A computed pattern-query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedMatch {
    /// Neither the block nor the exception pool matched
    NoMatch,
    Matched(RuleMatch),
}

impl CachedMatch {
    pub fn into_option(self) -> Option<RuleMatch> {
        match self {
            Self::NoMatch => None,
            Self::Matched(m) => Some(m),
        }
    }
}

impl From<Option<RuleMatch>> for CachedMatch {
    fn from(m: Option<RuleMatch>) -> Self {
        m.map_or(Self::NoMatch, Self::Matched)
    }
}

/// Shared, multi-threaded URL -> match cache.
///
/// Entries are inserted whole. Two concurrent misses for the same URL may
/// both compute and store; the second insert replaces an equal value.
#[derive(Debug, Default)]
pub struct DecisionCache {
    inner: DashMap<Box<str>, CachedMatch>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for `url`, or `None` if not computed yet.
    #[inline]
    pub fn get(&self, url: &str) -> Option<CachedMatch> {
        self.inner.get(url).map(|entry| entry.value().clone())
    }

    #[inline]
    pub fn insert(&self, url: &str, result: CachedMatch) {
        self.inner.insert(url.into(), result);
    }

    /// Drop every entry. Must follow any change of the rule pools.
    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchKind;

    #[test]
    fn test_absent_differs_from_no_match() {
        let cache = DecisionCache::new();
        assert_eq!(cache.get("https://a.example/"), None);

        cache.insert("https://a.example/", CachedMatch::NoMatch);
        assert_eq!(cache.get("https://a.example/"), Some(CachedMatch::NoMatch));
    }

    #[test]
    fn test_insert_and_clear() {
        let cache = DecisionCache::new();
        let rule = RuleMatch::new(MatchKind::Block, 9, "/ads/");
        cache.insert("https://a.example/ads/1.png", CachedMatch::from(Some(rule.clone())));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("https://a.example/ads/1.png").and_then(CachedMatch::into_option),
            Some(rule)
        );

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("https://a.example/ads/1.png"), None);
    }

    #[test]
    fn test_concurrent_inserts_are_whole() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(DecisionCache::new());
        let rule = RuleMatch::new(MatchKind::Block, 1, "ads");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let rule = rule.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        let url = format!("https://a.example/{}", i % 10);
                        if cache.get(&url).is_none() {
                            cache.insert(&url, CachedMatch::Matched(rule.clone()));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
        for i in 0..10 {
            let url = format!("https://a.example/{}", i);
            assert_eq!(cache.get(&url), Some(CachedMatch::Matched(rule.clone())));
        }
    }
}
