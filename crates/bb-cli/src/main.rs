//! BetterBlocker CLI
//!
//! CLI tool for exercising the content policy engine against recorded pages.

mod error;
mod host;
mod logging;
mod rules;
mod scenario;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use bb_core::page::{PageBuilder, PageNode};
use bb_core::{
    ContentPolicy, Decision, EventQueue, HitCounts, HostCall, MatchKind, PolicyConfig,
    TypeRegistry,
};

use crate::error::{CliError, Result};
use crate::host::ReplayHost;
use crate::rules::RuleLists;
use crate::scenario::{parse_kind, Scenario};

#[derive(Parser)]
#[command(name = "bb-cli")]
#[command(about = "BetterBlocker content policy tools")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide a single load on a page
    Check {
        /// Location of the top-level page
        #[arg(long)]
        top: String,

        /// Resource kind (name or host code)
        #[arg(short, long, default_value = "script")]
        kind: String,

        /// URL being loaded
        #[arg(short, long)]
        url: String,

        /// Policy configuration (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Blocking rule (literal substring)
        #[arg(long)]
        block: Vec<String>,

        /// Exception rule (literal substring)
        #[arg(long)]
        exception: Vec<String>,

        /// Page whitelist rule (literal substring)
        #[arg(long)]
        page_whitelist: Vec<String>,
    },

    /// Replay the loads of a scenario file
    Replay {
        /// Scenario file (JSON)
        #[arg(short, long)]
        input: String,

        /// Policy configuration (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Delay before object tabs are offered
        #[arg(long, default_value_t = 0)]
        object_tab_delay_ms: u64,

        /// Withdraw object tabs still pending when the replay ends
        #[arg(long)]
        cancel_object_tabs: bool,
    },

    /// List registered resource kinds
    Kinds,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check {
            top,
            kind,
            url,
            config,
            block,
            exception,
            page_whitelist,
        } => {
            let rules = RuleLists {
                block,
                exception,
                document_whitelist: page_whitelist,
            };
            cmd_check(&top, &kind, &url, config.as_deref(), rules)
        }
        Commands::Replay {
            input,
            config,
            object_tab_delay_ms,
            cancel_object_tabs,
        } => {
            cmd_replay(
                &input,
                config.as_deref(),
                Duration::from_millis(object_tab_delay_ms),
                cancel_object_tabs,
            )
            .await
        }
        Commands::Kinds => {
            cmd_kinds();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&str>) -> Result<PolicyConfig> {
    let Some(path) = path else {
        return Ok(PolicyConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_string(),
        source,
    })
}

fn verdict(decision: Decision) -> &'static str {
    match decision {
        Decision::Allow => "ALLOW",
        Decision::Block => "BLOCK",
    }
}

fn cmd_check(top: &str, kind: &str, url: &str, config: Option<&str>, rules: RuleLists) -> Result<()> {
    let config = load_config(config)?;
    let events: Arc<EventQueue<PageNode>> = Arc::new(EventQueue::new());
    let hits = Arc::new(HitCounts::new());
    let policy: ContentPolicy<PageNode> =
        ContentPolicy::new(&config, rules.into_pools(), hits.clone(), events.clone());
    let kind = parse_kind(&policy.config().registry, kind)?;

    let mut builder = PageBuilder::new(top);
    let element = builder.element(builder.top_document(), "element");
    let page = builder.build();

    let decision = policy.should_load(kind, url, HostCall::node(page.node(element)));
    println!("{} {} {}", verdict(decision), kind, url);
    for event in events.drain() {
        println!("  {:?}", event);
    }
    if hits.total() > 0 {
        println!("  Rule hits: {}", hits.total());
    }

    Ok(())
}

async fn cmd_replay(
    input: &str,
    config: Option<&str>,
    object_tab_delay: Duration,
    cancel_object_tabs: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let scenario = Scenario::from_file(input)?.load()?;

    let events: Arc<EventQueue<PageNode>> = Arc::new(EventQueue::new());
    let hits = Arc::new(HitCounts::new());
    let policy: ContentPolicy<PageNode> = ContentPolicy::new(
        &config,
        scenario.rules.clone().into_pools(),
        hits.clone(),
        events.clone(),
    );
    let registry = policy.config().registry.clone();
    let mut host = ReplayHost::new(object_tab_delay);

    println!("Replaying {} loads on '{}'", scenario.loads.len(), input);
    let (mut allowed, mut blocked) = (0usize, 0usize);
    for load in &scenario.loads {
        let kind = parse_kind(&registry, &load.kind)?;
        let node = scenario.page.node(scenario.node_id(load.node.as_deref().unwrap_or("document"))?);
        let call = if load.legacy {
            HostCall::Legacy {
                context: Some(node),
                window: None,
            }
        } else {
            HostCall::Current {
                request_origin: None,
                node: Some(node),
                mime_guess: load.mime.as_deref(),
            }
        };

        let decision = policy.should_load(kind, &load.url, call);
        match decision {
            Decision::Allow => allowed += 1,
            Decision::Block => blocked += 1,
        }
        println!("  {} {:<11} {}", verdict(decision), kind, load.url);
        host.apply(events.drain());
    }

    let pending = host.scheduler_mut().pending();
    tracing::debug!("{} object tabs pending, {} nodes hidden", pending, host.hidden().len());
    if cancel_object_tabs {
        host.scheduler_mut().cancel_all();
    }
    let (annotations, hidden, tabs) = host.finish().await;

    println!();
    println!("Summary:");
    println!("  Allowed:     {}", allowed);
    println!("  Blocked:     {}", blocked);
    println!("  Cached URLs: {}", policy.cache().len());

    for (top, entries) in &annotations {
        println!("  Window #{}: {} annotated loads", top, entries.len());
        for entry in entries {
            let label = registry.label_for(entry.kind).unwrap_or("unknown");
            let rule = entry
                .matched
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            let node = entry.node.map(|id| format!("#{}", id)).unwrap_or_else(|| "-".to_string());
            println!("    [{}] {} {} ({})", label, node, entry.location, rule);
        }
    }
    for (node, collapsed) in &hidden {
        println!("  Hidden node #{}{}", node, if *collapsed { " (collapsed)" } else { "" });
    }
    for tab in &tabs {
        println!("  Object tab for node #{} (window #{}): {}", tab.node, tab.top, tab.location);
    }

    for (kind, list) in [
        (MatchKind::Block, &scenario.rules.block),
        (MatchKind::Whitelist, &scenario.rules.exception),
        (MatchKind::WhitelistPage, &scenario.rules.document_whitelist),
    ] {
        for rule_id in 0..list.len() as u32 {
            let count = hits.hits(kind, rule_id);
            if count > 0 {
                let text = scenario.rules.text(kind, rule_id).unwrap_or("?");
                println!("  Hits {:>4}  {:?} {}", count, kind, text);
            }
        }
    }

    Ok(())
}

fn cmd_kinds() {
    let registry = TypeRegistry::new();
    println!("Resource kinds:");
    for (name, kind) in registry.kinds() {
        println!(
            "  {:<12} {:>6}  {}",
            name,
            kind.code(),
            registry.label_for(kind).unwrap_or("")
        );
    }
}
