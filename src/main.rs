use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use waypoint_rs::waypoint::config::Config;
use waypoint_rs::waypoint::nodes::{FieldPrompter, PresetPrompter, StdinPrompter};
use waypoint_rs::waypoint::runtime::Runtime;
use waypoint_rs::waypoint::server;
use waypoint_rs::waypoint::workflow::graph::{CompiledGraph, RunOutcome};
use waypoint_rs::waypoint::workflow::presets;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model provider (openai, groq, gemini); defaults to MODEL_PROVIDER
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name; defaults to MODEL_NAME or the provider default
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct RunOptions {
    /// Print the full run outcome as JSON
    #[arg(long)]
    json: bool,

    /// Never prompt on the terminal for missing fields
    #[arg(long)]
    no_input: bool,

    /// Preset a field, e.g. --set city=Tokyo (repeatable)
    #[arg(long = "set", value_parser = parse_key_value)]
    fields: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan a trip: weather, attractions, costs and itinerary
    Plan {
        /// Travel request in any format
        query: String,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Route a research question to a specialist and save a summary
    Research {
        query: String,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Let the router decide between trip planning and research
    Ask {
        query: String,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Run a workflow by id or from a YAML file
    Run {
        /// Path to a workflow file
        #[arg(short, long, conflicts_with = "workflow")]
        file: Option<PathBuf>,

        /// Workflow id (bundled or in the workflows directory)
        #[arg(short, long)]
        workflow: Option<String>,

        /// Input to the workflow
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Print a workflow as a Mermaid diagram
    Graph {
        /// Workflow id
        #[arg(default_value = presets::ASSISTANT)]
        workflow: String,

        /// Path to a workflow file instead of an id
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// List available workflows
    Workflows,
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn prompter(options: &RunOptions) -> Arc<dyn FieldPrompter> {
    let values: HashMap<String, String> = options.fields.iter().cloned().collect();
    let preset = PresetPrompter::new(values);
    if options.no_input {
        Arc::new(preset)
    } else {
        Arc::new(preset.with_fallback(Arc::new(StdinPrompter::new())))
    }
}

async fn run_graph(graph: CompiledGraph, query: &str, options: &RunOptions) -> Result<()> {
    println!("Running workflow: {}", graph.name());
    let outcome = graph
        .invoke(query)
        .await
        .with_context(|| format!("workflow '{}' failed", graph.name()))?;
    report(&outcome, options.json)
}

fn report(outcome: &RunOutcome, as_json: bool) -> Result<()> {
    if as_json {
        let mut value = serde_json::to_value(outcome)?;
        value["artifact"] = serde_json::to_value(outcome.artifact())?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let artifact = outcome.artifact();
    println!("\n{}", artifact.to_markdown());
    println!("Path: {}", outcome.trail.join(" -> "));
    if let Some(path) = &artifact.path {
        println!("Saved to: {}", path);
    }
    for error in outcome.state.errors() {
        eprintln!(
            "warning: {} failed: {}",
            error["node"].as_str().unwrap_or("?"),
            error["error"].as_str().unwrap_or("")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    if matches!(args.command, Commands::Serve { .. }) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info,tower_http=debug".into()),
            )
            .init();
    } else {
        env_logger::init();
    }

    let config = Config::from_env().context("invalid configuration")?;
    let runtime = Runtime::new(config, args.provider.as_deref(), args.model.as_deref()).await?;

    match args.command {
        Commands::Plan { query, options } => {
            let graph = runtime.build(presets::TRAVEL_PLANNER, prompter(&options))?;
            run_graph(graph, &query, &options).await?;
        }
        Commands::Research { query, options } => {
            let graph = runtime.build(presets::RESEARCH_AGENT, prompter(&options))?;
            run_graph(graph, &query, &options).await?;
        }
        Commands::Ask { query, options } => {
            let graph = runtime.build(presets::ASSISTANT, prompter(&options))?;
            run_graph(graph, &query, &options).await?;
        }
        Commands::Run {
            file,
            workflow,
            input,
            options,
        } => {
            let graph = match (file, workflow) {
                (Some(path), _) => runtime.build_file(&path, prompter(&options))?,
                (None, Some(id)) => runtime.build(&id, prompter(&options))?,
                (None, None) => bail!("pass --file or --workflow"),
            };
            run_graph(graph, &input, &options).await?;
        }
        Commands::Graph { workflow, file } => {
            println!("{}", runtime.diagram(&workflow, file.as_deref())?);
        }
        Commands::Workflows => {
            for id in runtime.workflow_ids() {
                match runtime.definition(&id) {
                    Ok(def) => println!("{:<20} {}", id, def.description),
                    Err(e) => println!("{:<20} (invalid: {})", id, e),
                }
            }
        }
        Commands::Serve { port } => {
            server::serve(Arc::new(runtime), port).await?;
        }
    }

    Ok(())
}
