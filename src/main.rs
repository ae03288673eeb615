//! Demo binary: wires an in-memory store, seeds a sample project, and
//! dispatches one tool call through the registry.
//!
//! Not the tool surface itself — that's [`issuecore::tools`]. This is the
//! local harness a developer runs to see the whole stack connected.

use std::io::Read as _;
use std::sync::Arc;

use clap::Parser;
use issuecore::bulk::BulkEngine;
use issuecore::config::Config;
use issuecore::deletion::DeletionPlanner;
use issuecore::expand::TemplateExpander;
use issuecore::issues::IssueOps;
use issuecore::model::Project;
use issuecore::sequence::SequenceAllocator;
use issuecore::store::memory::MemoryStore;
use issuecore::store::StoreAdapter;
use issuecore::tools::{Context, ToolRegistry};

/// Run a single tool call against an in-memory, pre-seeded workspace.
#[derive(Parser, Debug)]
#[command(name = "issuecore", about = "Bulk-operation core for an issue-tracker workspace")]
struct Cli {
    /// Tool name, e.g. `bulk_create_issues`.
    tool: String,

    /// JSON input for the tool. Reads stdin if omitted.
    input: Option<String>,

    /// Project identifier to seed the demo workspace with.
    #[arg(long, env = "TRACKER_DEMO_PROJECT", default_value = "ENG")]
    project: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::new("memory://demo", "demo-workspace");

    let memory = MemoryStore::new();
    memory.seed_project(Project::new("proj_demo", &cli.project, "Demo Project"));
    let store: Arc<dyn StoreAdapter> = Arc::new(memory);

    let sequence = Arc::new(SequenceAllocator::new(store.clone()));
    let engine = Arc::new(BulkEngine::new());
    let issues = Arc::new(IssueOps::new(store.clone(), sequence.clone(), engine.clone(), config.default_priority));
    let deletion = Arc::new(DeletionPlanner::new(store.clone(), engine.clone()));
    let expander = Arc::new(TemplateExpander::new(store.clone(), sequence.clone()));

    let context = Context { store, sequence, engine, issues, deletion, expander };
    let registry = ToolRegistry::with_default_tools();

    let input = match cli.input {
        Some(raw) => raw,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).expect("failed to read stdin");
            buf
        }
    };
    let input: serde_json::Value = serde_json::from_str(&input).unwrap_or_else(|err| {
        eprintln!("invalid JSON input: {err}");
        std::process::exit(1);
    });

    match registry.dispatch(&context, &cli.tool, input).await {
        Ok(output) => println!("{}", serde_json::to_string_pretty(&output).unwrap()),
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.to_structured_json()).unwrap());
            std::process::exit(1);
        }
    }
}
