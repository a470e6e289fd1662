//! Literal rule pools for replaying scenarios
//!
//! Rules are plain substrings. The first rule contained in the URL wins.

use std::sync::Arc;

use serde::Deserialize;

use bb_core::{MatchKind, PatternMatcher, RuleMatch, RulePools};

/// A pool of literal rules of one kind.
#[derive(Debug)]
pub struct LiteralPool {
    kind: MatchKind,
    rules: Vec<Arc<str>>,
}

impl LiteralPool {
    pub fn new<I, S>(kind: MatchKind, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .map(Arc::from)
            .collect();
        Self { kind, rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

impl PatternMatcher for LiteralPool {
    fn matches_any(&self, url: &str) -> Option<RuleMatch> {
        self.rules
            .iter()
            .position(|rule| url.contains(rule.as_ref()))
            .map(|idx| RuleMatch {
                kind: self.kind,
                rule_id: idx as u32,
                text: Arc::clone(&self.rules[idx]),
            })
    }
}

/// Rule lists as they appear in a scenario file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleLists {
    pub block: Vec<String>,
    pub exception: Vec<String>,
    pub document_whitelist: Vec<String>,
}

impl RuleLists {
    pub fn into_pools(self) -> RulePools {
        let block = LiteralPool::new(MatchKind::Block, &self.block);
        let exception = LiteralPool::new(MatchKind::Whitelist, &self.exception);
        let pages = LiteralPool::new(MatchKind::WhitelistPage, &self.document_whitelist);
        tracing::debug!(
            "Loaded {} blocking, {} exception and {} page rules",
            block.len(),
            exception.len(),
            pages.len()
        );
        RulePools::new(Arc::new(block), Arc::new(exception), Arc::new(pages))
    }

    /// Text of a rule by kind and id, for reports.
    pub fn text(&self, kind: MatchKind, rule_id: u32) -> Option<&str> {
        let list = match kind {
            MatchKind::Block => &self.block,
            MatchKind::Whitelist => &self.exception,
            MatchKind::WhitelistPage => &self.document_whitelist,
        };
        list.iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .nth(rule_id as usize)
    }
}
