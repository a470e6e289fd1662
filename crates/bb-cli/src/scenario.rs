//! Scenario files: a page tree, rule lists and the loads to replay
//!
//! ```json
//! {
//!   "page": { "location": "https://site.example/", "children": [
//!     { "id": "ad", "tag": "a", "href": "https://tracker.example/c", "children": [
//!       { "id": "banner", "tag": "img" } ] },
//!     { "id": "f", "tag": "iframe", "frame": { "location": "https://frame.example/" } } ] },
//!   "rules": { "block": ["tracker.example"] },
//!   "loads": [ { "kind": "image", "url": "https://img.example/b.png", "node": "banner" } ]
//! }
//! ```
//!
//! The top window and document are addressed as `window` and `document`; a
//! frame with id `f` exposes `f/window` and `f/document`.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

use bb_core::page::{NodeId, Page, PageBuilder};
use bb_core::{ResourceKind, TypeRegistry};

use crate::error::{CliError, Result};
use crate::rules::RuleLists;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub page: PageSpec,
    #[serde(default)]
    pub rules: RuleLists,
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    pub location: String,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub tag: String,
    #[serde(default)]
    pub href: Option<String>,
    /// Content of a frame element
    #[serde(default)]
    pub frame: Option<PageSpec>,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadSpec {
    pub kind: String,
    pub url: String,
    /// Requesting node; the top document when omitted
    #[serde(default)]
    pub node: Option<String>,
    /// Use the legacy `(context, window)` calling convention
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub mime: Option<String>,
}

/// A scenario with its page built and node ids resolved.
#[derive(Debug)]
pub struct LoadedScenario {
    pub page: Page,
    pub ids: HashMap<String, NodeId>,
    pub rules: RuleLists,
    pub loads: Vec<LoadSpec>,
}

impl LoadedScenario {
    pub fn node_id(&self, name: &str) -> Result<NodeId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| CliError::UnknownNode(name.to_string()))
    }
}

impl Scenario {
    pub fn from_file(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CliError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(self) -> Result<LoadedScenario> {
        let mut builder = PageBuilder::new(&self.page.location);
        let mut ids = HashMap::new();
        ids.insert("window".to_string(), builder.top_window());
        ids.insert("document".to_string(), builder.top_document());

        let document = builder.top_document();
        for child in &self.page.children {
            add_element(&mut builder, &mut ids, document, child)?;
        }

        Ok(LoadedScenario {
            page: builder.build(),
            ids,
            rules: self.rules,
            loads: self.loads,
        })
    }
}

fn add_element(
    builder: &mut PageBuilder,
    ids: &mut HashMap<String, NodeId>,
    parent: NodeId,
    spec: &ElementSpec,
) -> Result<()> {
    let id = match (&spec.frame, &spec.href) {
        (Some(frame), _) => {
            let (element, window) = builder.frame(parent, &frame.location);
            // Every window built by PageBuilder has a document
            let document = builder.document_of(window).unwrap_or(window);
            if let Some(name) = &spec.id {
                register(ids, format!("{}/window", name), window)?;
                register(ids, format!("{}/document", name), document)?;
            }
            for child in &frame.children {
                add_element(builder, ids, document, child)?;
            }
            element
        }
        (None, Some(href)) => builder.link(parent, &spec.tag, href),
        (None, None) => builder.element(parent, &spec.tag),
    };

    if let Some(name) = &spec.id {
        register(ids, name.clone(), id)?;
    }
    for child in &spec.children {
        add_element(builder, ids, id, child)?;
    }
    Ok(())
}

fn register(ids: &mut HashMap<String, NodeId>, name: String, id: NodeId) -> Result<()> {
    if ids.contains_key(&name) {
        return Err(CliError::DuplicateNode(name));
    }
    ids.insert(name, id);
    Ok(())
}

/// Resolve a kind given by name (`script`) or raw host code (`2`).
pub fn parse_kind(registry: &TypeRegistry, name: &str) -> Result<ResourceKind> {
    if let Ok(code) = name.parse::<u32>() {
        return Ok(ResourceKind(code));
    }
    registry
        .code_for(name)
        .ok_or_else(|| CliError::UnknownKind(name.to_string()))
}

#[cfg(test)]
mod tests {
    use bb_core::node::{HasHref, HasParent, WindowLike};

    use super::*;

    const SCENARIO: &str = r#"{
        "page": { "location": "https://site.example/", "children": [
            { "id": "ad", "tag": "a", "href": "https://tracker.example/c", "children": [
                { "id": "banner", "tag": "img" } ] },
            { "id": "f", "tag": "iframe", "frame": {
                "location": "https://frame.example/",
                "children": [ { "id": "inner", "tag": "script" } ] } } ] },
        "rules": { "block": ["tracker.example"] },
        "loads": [ { "kind": "image", "url": "https://img.example/b.png", "node": "banner" } ]
    }"#;

    #[test]
    fn test_builds_page_tree() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        let loaded = scenario.load().unwrap();

        let banner = loaded.page.node(loaded.node_id("banner").unwrap());
        let ad = loaded.page.node(loaded.node_id("ad").unwrap());
        assert_eq!(banner.parent_node(), Some(ad.clone()));
        assert_eq!(ad.href().as_deref(), Some("https://tracker.example/c"));

        let inner = loaded.page.node(loaded.node_id("inner").unwrap());
        let frame_window = loaded.page.node(loaded.node_id("f/window").unwrap());
        assert_eq!(inner.owner_window(), Some(frame_window));
        assert_eq!(inner.top_window(), Some(loaded.page.node(0)));

        assert_eq!(loaded.loads.len(), 1);
        assert_eq!(loaded.rules.block, vec!["tracker.example".to_string()]);
    }

    #[test]
    fn test_unknown_and_duplicate_nodes() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        let loaded = scenario.load().unwrap();
        assert!(matches!(loaded.node_id("missing"), Err(CliError::UnknownNode(_))));

        let dup: Scenario = serde_json::from_str(
            r#"{ "page": { "location": "https://a.example/", "children": [
                { "id": "x", "tag": "div" }, { "id": "x", "tag": "img" } ] } }"#,
        )
        .unwrap();
        assert!(matches!(dup.load(), Err(CliError::DuplicateNode(name)) if name == "x"));
    }

    #[test]
    fn test_demo_exception_rule_takes_effect() {
        use std::sync::Arc;

        use bb_core::events::NullSink;
        use bb_core::page::PageNode;
        use bb_core::{ContentPolicy, Decision, HitCounts, HostCall, MatchKind, PolicyConfig};

        let scenario: Scenario = serde_json::from_str(include_str!("../../../demos/scenario.json")).unwrap();
        let config: PolicyConfig = serde_json::from_str(include_str!("../../../demos/policy.json")).unwrap();
        let loaded = scenario.load().unwrap();
        let hits = Arc::new(HitCounts::new());
        let policy: ContentPolicy<PageNode> =
            ContentPolicy::new(&config, loaded.rules.clone().into_pools(), hits.clone(), Arc::new(NullSink));
        let img = || HostCall::node(loaded.page.node(loaded.node_id("promo-img").unwrap()));

        // Excepted image inside a blocked link
        assert_eq!(
            policy.should_load(ResourceKind::IMAGE, "https://img.example/photo.jpg", img()),
            Decision::Allow
        );
        assert_eq!(hits.hits(MatchKind::Whitelist, 0), 1);

        assert_eq!(
            policy.should_load(ResourceKind::IMAGE, "https://cdn.example/banners/top.png", img()),
            Decision::Block
        );
    }

    #[test]
    fn test_parse_kind() {
        let registry = TypeRegistry::new();
        assert_eq!(parse_kind(&registry, "Script").unwrap(), ResourceKind::SCRIPT);
        assert_eq!(parse_kind(&registry, "42").unwrap(), ResourceKind(42));
        assert!(matches!(parse_kind(&registry, "font"), Err(CliError::UnknownKind(_))));
    }
}
