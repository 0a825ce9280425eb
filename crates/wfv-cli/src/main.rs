use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wfv_core::verifier::{self, Severity};
use wfv_core::{parser, NormalizerConfig, RawGraph, WorkflowGraph};

/// wfv — workflow viewer graph engine CLI
///
/// Validate, normalize and query workflow graphs.
#[derive(Parser)]
#[command(name = "wfv", version, about, long_about = None)]
struct Cli {
    /// Suppress status messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable debug logging (overridden by WFV_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a graph for dangling references, cycles and id collisions
    Validate {
        /// Path to graph JSON
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical graph as JSON
    Normalize {
        /// Path to graph JSON
        file: PathBuf,
        /// Print only the SHA-256 fingerprint
        #[arg(long)]
        fingerprint: bool,
    },

    /// Print the topological level table
    Levels {
        /// Path to graph JSON
        file: PathBuf,
        /// Show labels instead of keys
        #[arg(long)]
        labels: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one node: relatives, inputs and outputs
    Node {
        /// Path to graph JSON
        file: PathBuf,
        /// Raw key or canonical id
        node: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List children consuming an output of a node
    Consumers {
        /// Path to graph JSON
        file: PathBuf,
        /// Raw key or canonical id of the producer
        node: String,
        /// Raw or canonical output id
        output: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical id of a string
    Hash {
        value: String,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CliConfig {
    #[serde(default)]
    normalizer: NormalizerConfig,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(msg) => process::exit(fail(msg)),
    };

    let exit_code = match cli.command {
        Commands::Validate { file, json } => cmd_validate(&file, &config, json, cli.quiet),
        Commands::Normalize { file, fingerprint } => cmd_normalize(&file, &config, fingerprint),
        Commands::Levels { file, labels, json } => cmd_levels(&file, &config, labels, json),
        Commands::Node { file, node, json } => cmd_node(&file, &config, &node, json),
        Commands::Consumers {
            file,
            node,
            output,
            json,
        } => cmd_consumers(&file, &config, &node, &output, json),
        Commands::Hash { value } => {
            println!("{}", config.canonicalizer().canonicalize(&value));
            0
        }
        Commands::Version => {
            println!(
                "wfv {} (wfv-core {})",
                env!("CARGO_PKG_VERSION"),
                wfv_core::VERSION
            );
            0
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("WFV_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "wfv=debug,wfv_core=debug,info"
        } else if quiet {
            "error"
        } else {
            "wfv_core=warn"
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<NormalizerConfig, String> {
    let Some(path) = path else {
        return Ok(NormalizerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
    let parsed: CliConfig = toml::from_str(&text)
        .map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
    parsed
        .normalizer
        .validate()
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(parsed.normalizer)
}

// ── Commands ──────────────────────────────────────────────

fn cmd_validate(file: &Path, config: &NormalizerConfig, json: bool, quiet: bool) -> i32 {
    let raw = match read_raw(file) {
        Ok(raw) => raw,
        Err(msg) => return fail(msg),
    };
    let result = verifier::verify(&raw, config);
    let errors = result.errors().len();
    let warnings = result.warnings().len();
    let valid = result.is_valid() && !(config.warnings_as_errors && warnings > 0);

    if json {
        let diagnostics: Vec<serde_json::Value> = result
            .diagnostics
            .iter()
            .map(|d| {
                serde_json::json!({
                    "severity": match d.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                    },
                    "kind": d.kind.to_string(),
                    "message": d.message,
                })
            })
            .collect();
        let output = serde_json::json!({
            "valid": valid,
            "nodes": raw.len(),
            "errors": errors,
            "warnings": warnings,
            "diagnostics": diagnostics,
        });
        print_json(&output);
    } else {
        for d in &result.diagnostics {
            match d.severity {
                Severity::Error => eprintln!("{}", d.to_string().red()),
                Severity::Warning if config.warnings_as_errors => {
                    eprintln!("{}", d.to_string().red())
                }
                Severity::Warning => eprintln!("{}", d.to_string().yellow()),
            }
        }
        if !quiet {
            if valid {
                println!(
                    "{} {} is valid ({} nodes, {} warning(s))",
                    "✓".green(),
                    file.display(),
                    raw.len(),
                    warnings
                );
            } else {
                println!(
                    "{} {} is invalid ({} error(s), {} warning(s))",
                    "✗".red(),
                    file.display(),
                    errors,
                    warnings
                );
            }
        }
    }

    if valid {
        0
    } else {
        1
    }
}

fn cmd_normalize(file: &Path, config: &NormalizerConfig, fingerprint: bool) -> i32 {
    let graph = match load_graph(file, config) {
        Ok(graph) => graph,
        Err(msg) => return fail(msg),
    };
    if fingerprint {
        return match graph.fingerprint() {
            Ok(hash) => {
                println!("{}", hash);
                0
            }
            Err(e) => fail(e),
        };
    }
    print_json(graph.normalized());
    0
}

fn cmd_levels(file: &Path, config: &NormalizerConfig, labels: bool, json: bool) -> i32 {
    let graph = match load_graph(file, config) {
        Ok(graph) => graph,
        Err(msg) => return fail(msg),
    };
    let levels = graph.get_nodes_topological_sort();

    if json {
        let rows: Vec<Vec<serde_json::Value>> = levels
            .iter()
            .map(|row| {
                row.iter()
                    .map(|id| {
                        serde_json::json!({
                            "id": id,
                            "key": graph.get_key(id).unwrap_or_default(),
                            "label": graph.get_label(id).unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .collect();
        print_json(&serde_json::json!({ "levels": rows }));
        return 0;
    }

    for (depth, row) in levels.iter().enumerate() {
        let names: Vec<String> = row
            .iter()
            .map(|id| {
                let name = if labels {
                    graph.get_label(id)
                } else {
                    graph.get_key(id)
                };
                name.unwrap_or_else(|_| id.clone())
            })
            .collect();
        println!("{} {}", format!("{:>3}", depth).dimmed(), names.join("  "));
    }
    0
}

fn cmd_node(file: &Path, config: &NormalizerConfig, node: &str, json: bool) -> i32 {
    let graph = match load_graph(file, config) {
        Ok(graph) => graph,
        Err(msg) => return fail(msg),
    };
    let node = match graph.resolve(node).and_then(|id| graph.get_node(&id)) {
        Ok(node) => node,
        Err(e) => return fail(e),
    };

    if json {
        print_json(&node);
        return 0;
    }

    let key_of = |id: &String| graph.get_key(id).unwrap_or_else(|_| id.clone());
    println!("{} {}", node.label.bold(), format!("({})", node.key).dimmed());
    println!("  id:       {}", node.id);
    println!("  level:    {}", node.level);
    println!(
        "  parents:  {}",
        node.parents.iter().map(key_of).collect::<Vec<_>>().join(", ")
    );
    println!(
        "  children: {}",
        node.children.iter().map(key_of).collect::<Vec<_>>().join(", ")
    );
    println!("  inputs:");
    for input in &node.inputs {
        match input.source() {
            Some(source) => println!(
                "    {} {} {}",
                input.name,
                "←".cyan(),
                graph.get_key(source).unwrap_or_else(|_| source.to_string())
            ),
            None => println!("    {}", input.name),
        }
    }
    println!("  outputs:");
    for (output_id, output) in node.outputs.iter() {
        let consumers = graph
            .get_children_with_input(&node.id, output_id)
            .unwrap_or_default();
        if consumers.is_empty() {
            println!("    {}", output.name);
        } else {
            println!(
                "    {} {} {}",
                output.name,
                "→".cyan(),
                consumers.iter().map(key_of).collect::<Vec<_>>().join(", ")
            );
        }
    }
    0
}

fn cmd_consumers(
    file: &Path,
    config: &NormalizerConfig,
    node: &str,
    output: &str,
    json: bool,
) -> i32 {
    let graph = match load_graph(file, config) {
        Ok(graph) => graph,
        Err(msg) => return fail(msg),
    };
    let node_id = match graph.resolve(node) {
        Ok(id) => id,
        Err(e) => return fail(e),
    };
    let output_id = match graph.get_outputs(&node_id) {
        Ok(outputs) if outputs.contains_key(output) => output.to_string(),
        Ok(_) => config.canonicalizer().canonicalize(output),
        Err(e) => return fail(e),
    };
    let consumers = match graph.get_children_with_input(&node_id, &output_id) {
        Ok(consumers) => consumers,
        Err(e) => return fail(e),
    };

    if json {
        let items: Vec<serde_json::Value> = consumers
            .iter()
            .map(|id| serde_json::json!({ "id": id, "key": graph.get_key(id).unwrap_or_default() }))
            .collect();
        print_json(&items);
    } else {
        for id in &consumers {
            println!("{}", graph.get_key(id).unwrap_or_else(|_| id.clone()));
        }
    }
    0
}

// ── Helpers ───────────────────────────────────────────────

fn read_raw(file: &Path) -> Result<RawGraph, String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    parser::parse_graph(&text).map_err(|e| format!("{}: {}", file.display(), e))
}

fn load_graph(file: &Path, config: &NormalizerConfig) -> Result<WorkflowGraph, String> {
    let raw = read_raw(file)?;
    WorkflowGraph::with_config(&raw, config).map_err(|e| format!("{}: {}", file.display(), e))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
    }
}

fn fail(err: impl std::fmt::Display) -> i32 {
    eprintln!("{} {}", "error:".red().bold(), err);
    2
}
