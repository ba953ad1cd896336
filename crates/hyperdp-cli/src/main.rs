//! hyperdp CLI: inspect and optimize join trees written in YAML.

use clap::{Parser, Subcommand};
use hyperdp_core::config::EnumeratorConfig;
use hyperdp_core::relset::RelSet;
use hyperdp_planner::{
    parse_yaml_join_tree, CostEvaluator, DPhyp, EnumerationStats, EnumerationTrace, Hypergraph,
    LogTrace, ParsedJoinTree, PlanNode, RecordingTrace, Solution,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hyperdp")]
#[command(about = "Hypergraph join-order enumeration (DPhyp) over YAML join trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a join tree parses and yields a valid hypergraph
    Validate {
        /// Path to the join-tree YAML file
        #[arg(short, long)]
        tree: PathBuf,
    },

    /// Print the hyperedge of every join operator
    Hypergraph {
        /// Path to the join-tree YAML file
        #[arg(short, long)]
        tree: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Find the cheapest join order and print it (EXPLAIN)
    Explain {
        /// Path to the join-tree YAML file
        #[arg(short, long)]
        tree: PathBuf,

        /// Row count for relations that declare none
        #[arg(long)]
        default_rows: Option<u64>,

        /// List every csg/cmp pair the enumerator emitted
        #[arg(long)]
        pairs: bool,

        /// Report hyperedges to the trace log (overrides config)
        #[arg(long)]
        trace_edges: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { tree } => {
            if let Err(e) = validate_tree(&tree) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Hypergraph { tree, json } => {
            if let Err(e) = print_hypergraph(&tree, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Explain {
            tree,
            default_rows,
            pairs,
            trace_edges,
            json,
        } => {
            if let Err(e) = explain_tree(&tree, default_rows, pairs, trace_edges, json) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Environment config, replaced by the document's `config:` block, then CLI flags.
fn resolve_config(
    parsed: &ParsedJoinTree,
    base: EnumeratorConfig,
    trace_edges: bool,
) -> Result<EnumeratorConfig, hyperdp_core::Error> {
    let mut config = parsed.config_or(base);
    if trace_edges {
        config.trace_edges = true;
    }
    config.validate()?;
    Ok(config)
}

fn load(path: &PathBuf) -> Result<ParsedJoinTree, Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(path)?;
    Ok(parse_yaml_join_tree(&yaml_content)?)
}

fn validate_tree(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = resolve_config(&parsed, EnumeratorConfig::from_env(), false)?;
    let graph = Hypergraph::build(&parsed.tree, parsed.root, &config)?;
    println!(
        "✓ Join tree is valid ({} relations, {} joins)",
        graph.relation_count(),
        graph.operator_count()
    );
    Ok(())
}

fn print_hypergraph(path: &PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = resolve_config(&parsed, EnumeratorConfig::from_env(), false)?;
    let graph = Hypergraph::build(&parsed.tree, parsed.root, &config)?;
    let names = graph.relation_names(&parsed.tree);
    let members = |set: RelSet| -> Vec<&str> { set.iter().map(|i| names[i]).collect() };

    let mut rows = Vec::with_capacity(graph.operator_count());
    for (op, edge) in graph.hyperedges() {
        let kind = graph
            .operator_node(op)
            .and_then(|id| parsed.tree.get(id))
            .and_then(|n| n.as_join())
            .map(|j| j.kind.as_str())
            .unwrap_or("?");
        rows.push((op, kind, edge));
    }

    if json {
        let edges: Vec<_> = rows
            .iter()
            .map(|(op, kind, edge)| {
                serde_json::json!({
                    "op": op.get(),
                    "kind": kind,
                    "left": members(edge.left),
                    "right": members(edge.right),
                    "inert": edge.is_inert(),
                })
            })
            .collect();
        let doc = serde_json::json!({ "relations": names, "edges": edges });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Relations:");
    for (i, name) in names.iter().enumerate() {
        println!("  {}. {}", i, name);
    }
    println!();
    println!("Hyperedges:");
    for (op, kind, edge) in &rows {
        let note = if edge.is_inert() { "  (inert)" } else { "" };
        println!(
            "  {} {:<5} {} -- {}{}",
            op,
            kind,
            edge.left.display_with(&names),
            edge.right.display_with(&names),
            note
        );
    }
    Ok(())
}

struct Outcome {
    solution: Solution<Arc<PlanNode>>,
    stats: EnumerationStats,
}

/// Relation names in relation-index order.
fn leaf_names(parsed: &ParsedJoinTree) -> Result<Vec<String>, hyperdp_core::Error> {
    parsed
        .tree
        .leaves(parsed.root)?
        .into_iter()
        .map(|id| {
            let node = parsed.tree.node(id)?;
            Ok(node
                .as_relation()
                .map(|r| r.name.clone())
                .unwrap_or_default())
        })
        .collect()
}

fn optimize<T: EnumerationTrace>(
    parsed: &ParsedJoinTree,
    config: EnumeratorConfig,
    trace: T,
    evaluator: &mut CostEvaluator,
) -> Result<(Outcome, T), Box<dyn std::error::Error>> {
    let mut dp = DPhyp::with_trace(&parsed.tree, parsed.root, config, trace)?;
    let solution = dp.solve(evaluator)?;
    let stats = dp.stats();
    Ok((Outcome { solution, stats }, dp.into_trace()))
}

fn explain_tree(
    path: &PathBuf,
    default_rows: Option<u64>,
    pairs: bool,
    trace_edges: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = load(path)?;
    let config = resolve_config(&parsed, EnumeratorConfig::from_env(), trace_edges)?;
    let names = leaf_names(&parsed)?;
    let mut evaluator = match default_rows {
        Some(rows) => CostEvaluator::with_default_rows(rows),
        None => CostEvaluator::new(),
    };

    let (outcome, recorded) = if pairs {
        let (out, trace) = optimize(&parsed, config, RecordingTrace::new(), &mut evaluator)?;
        (out, Some(trace))
    } else {
        let trace = LogTrace::new(names.clone());
        let (out, _) = optimize(&parsed, config, trace, &mut evaluator)?;
        (out, None)
    };

    tracing::info!(
        csg_cmp_pairs = outcome.stats.csg_cmp_pairs,
        joins_evaluated = outcome.stats.joins_evaluated,
        plan_classes = outcome.stats.plan_classes,
        "enumeration finished"
    );

    if json {
        let doc = match &outcome.solution {
            Solution::Complete(plan) => serde_json::json!({
                "plan": plan,
                "stats": outcome.stats,
            }),
            Solution::Disconnected { components } => serde_json::json!({
                "components": components
                    .iter()
                    .map(|c| c.iter().map(|i| names[i].as_str()).collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
                "stats": outcome.stats,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Join Order");
    println!("==========");
    println!();
    match &outcome.solution {
        Solution::Complete(plan) => {
            print!("{}", plan);
            println!();
            println!("Estimated rows: {}", plan.rows());
            println!("Cost (C_out):   {}", plan.cost());
        }
        Solution::Disconnected { components } => {
            println!("No predicate path joins every relation.");
            println!("Connected components (cross join to combine):");
            for c in components {
                println!("  {}", c.display_with(&names));
            }
        }
    }
    println!();
    println!("Enumeration:");
    println!("  csg/cmp pairs:    {}", outcome.stats.csg_cmp_pairs);
    println!("  join evaluations: {}", outcome.stats.joins_evaluated);
    println!("  plan classes:     {}", outcome.stats.plan_classes);

    if let Some(trace) = &recorded {
        println!();
        for line in recorded_lines(trace, &names) {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Reported hyperedges (when edge tracing is on), then the pairs in
/// emission order.
fn recorded_lines(trace: &RecordingTrace, names: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    if !trace.edges.is_empty() {
        lines.push("Hyperedges:".to_string());
        for (op, edge) in &trace.edges {
            lines.push(format!(
                "  {} {} -- {}",
                op,
                edge.left.display_with(names),
                edge.right.display_with(names)
            ));
        }
        lines.push(String::new());
    }
    lines.push("Pairs:".to_string());
    for (i, (csg, cmp, op)) in trace.pairs.iter().enumerate() {
        lines.push(format!(
            "  {}. {} x {} via {}",
            i + 1,
            csg.display_with(names),
            cmp.display_with(names),
            op
        ));
    }
    lines
}
