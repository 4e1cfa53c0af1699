//! callpath CLI - slice the call graph between chosen functions
//!
//! Orchestrates the full pipeline:
//!
//! 1. Selector parsing: `file`, `file::name`, `file::a|b|C.method`
//! 2. Graph build: bounded BFS from the sources, lazy per-file parsing
//! 3. Slice: forward-from-sources ∩ backward-from-targets
//! 4. Output: Graphviz text, the JSON interchange payload, or the layout
//!    engine's geometry
//!
//! Design philosophy follows the library: configuration mistakes fail fast
//! and loudly; broken files and unresolvable calls never abort a build -
//! run with --verbose to see what was skipped and why.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use owo_colors::OwoColorize;

use callpath::config::{CompilerSettings, ResolverOptions};
use callpath::error::Diagnostics;
use callpath::graph::{slice, BuildBounds, GraphBuilder};
use callpath::layout::{layout, Direction, LayoutOptions};
use callpath::render::{to_dot, GraphPayload, PayloadOptions};
use callpath::resolve::SymbolResolver;
use callpath::selector::expand_all;

/// Static call-path extraction for TypeScript codebases
///
/// Recovers the call graph from syntax alone and extracts the subgraph
/// connecting source functions to target functions.
///
/// Examples:
///   callpath src/cli.ts::main --to src/db.ts::query
///   callpath src/api.ts --to "src/core.ts::run|Engine.start" --format json
///   callpath src/a.ts::main --to src/c.ts --include-external --verbose
#[derive(Parser, Debug)]
#[command(name = "callpath")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Source selectors (traversal starts here)
    #[arg(value_name = "SOURCES", required = true)]
    sources: Vec<String>,

    /// Target selectors (the slice must reach these)
    #[arg(long = "to", value_name = "TARGETS", required = true)]
    targets: Vec<String>,

    /// Repository root the selectors resolve against
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Path to the project's tsconfig.json
    ///
    /// Defaults to <project>/tsconfig.json when present. Only baseUrl and
    /// paths matter to resolution; everything else is ignored.
    #[arg(long)]
    tsconfig: Option<PathBuf>,

    /// Maximum call depth explored from each source
    #[arg(long, default_value = "6")]
    depth: usize,

    /// Node budget per build; traversal stops at the cap
    #[arg(long, default_value = "400")]
    max_nodes: usize,

    /// Keep unresolved third-party imports as terminal <external> nodes
    #[arg(long)]
    include_external: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "dot")]
    format: Format,

    /// Layer direction for --format layout
    #[arg(long, value_enum, default_value = "top-to-bottom")]
    direction: Flow,

    /// Editor name embedded in the JSON payload for link construction
    #[arg(long)]
    editor: Option<String>,

    /// Inline source snippets into the JSON payload
    #[arg(long)]
    snippets: bool,

    /// Collapse these files in the layout output (repeatable)
    #[arg(long = "collapse", value_name = "FILE")]
    collapsed: Vec<String>,

    /// Report skipped files and unresolved call sites on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Graphviz digraph
    Dot,
    /// JSON interchange payload
    Json,
    /// Layout-engine geometry as JSON
    Layout,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Flow {
    TopToBottom,
    LeftToRight,
}

impl From<Flow> for Direction {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::TopToBottom => Direction::TopToBottom,
            Flow::LeftToRight => Direction::LeftToRight,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = cli
        .project
        .canonicalize()
        .with_context(|| format!("repository root {} not found", cli.project.display()))?;

    let (diagnostics, drain) = if cli.verbose {
        let (tx, rx) = channel();
        (Diagnostics::channel(tx), Some(rx))
    } else {
        (Diagnostics::disabled(), None)
    };

    let settings = CompilerSettings::load(&root, cli.tsconfig.as_deref(), &diagnostics);
    let options = ResolverOptions::new(root.clone())
        .with_settings(settings)
        .with_external(cli.include_external)
        .with_diagnostics(diagnostics);

    let mut resolver = SymbolResolver::new(options);

    let sources = expand_all(&cli.sources, &root, &mut resolver)?;
    let targets = expand_all(&cli.targets, &root, &mut resolver)?;

    let bounds = BuildBounds {
        max_depth: cli.depth,
        max_nodes: cli.max_nodes,
    };
    let full = GraphBuilder::new(&mut resolver, bounds).build(&sources)?;
    let sliced = slice(&full, &sources, &targets);

    flush_diagnostics(&drain);

    if cli.verbose {
        eprintln!(
            "{} {} nodes, {} edges ({} before slicing)",
            "graph:".bold(),
            sliced.node_count(),
            sliced.edge_count(),
            full.node_count()
        );
    }

    let payload_options = PayloadOptions {
        codeowners: None,
        repo_root: Some(root.display().to_string()),
        editor: cli.editor.clone(),
        with_snippets: cli.snippets,
    };
    let payload = GraphPayload::from_graph(&sliced, &sources, &targets, &root, &payload_options);

    match cli.format {
        Format::Dot => print!("{}", to_dot(&payload)),
        Format::Json => println!("{}", payload.to_json()?),
        Format::Layout => {
            let result = layout(
                &payload,
                &LayoutOptions {
                    direction: cli.direction.into(),
                    collapsed: cli.collapsed.iter().cloned().collect::<BTreeSet<_>>(),
                    previous_order: None,
                    owners: Default::default(),
                },
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn flush_diagnostics(drain: &Option<Receiver<String>>) {
    if let Some(rx) = drain {
        for message in rx.try_iter() {
            eprintln!("{} {}", "note:".yellow().bold(), message);
        }
    }
}
