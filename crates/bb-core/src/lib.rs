//! BetterBlocker Core Library
//!
//! This crate provides the content policy engine for the BetterBlocker content
//! blocker: the checkpoint a browser consults before every resource load.
//!
//! # Architecture
//!
//! The engine consumes compiled rule pools through the [`PatternMatcher`]
//! contract and never compiles filter text itself. Configuration is turned
//! into an immutable snapshot of lookup sets; pattern results are memoized
//! per URL. Side effects (annotations, hiding, object tabs) are emitted as
//! [`PolicyEvent`]s for the host to apply.
//!
//! # Modules
//!
//! - `types`: Resource kinds and the type registry
//! - `url`: Scheme extraction and normalization
//! - `config`: Policy configuration and derived sets
//! - `matcher`: Rule pool contract and hit counting
//! - `cache`: Per-URL decision cache
//! - `node`: Host capability traits
//! - `page`: In-memory page model implementing the host traits
//! - `events`: Side-effect channel
//! - `policy`: The decision engine

pub mod cache;
pub mod config;
pub mod events;
pub mod matcher;
pub mod node;
pub mod page;
pub mod policy;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use cache::{CachedMatch, DecisionCache};
pub use config::{ConfigSnapshot, PolicyConfig, PolicyFlags};
pub use events::{EventQueue, EventSink, PolicyEvent};
pub use matcher::{HitCounter, HitCounts, MatchKind, PatternMatcher, RuleMatch, RulePools};
pub use node::{HasHref, HasParent, HostNode, WindowLike};
pub use policy::{ContentPolicy, HostCall};
pub use types::{Decision, ResourceKind, TypeRegistry};
