//! medie CLI - Command-line interface
//!
//! Usage:
//!   medie process [TEXT] [--file F] [--format json|mermaid|dot|table] [--entities F]
//!   medie batch <FILE>
//!   medie evaluate <GOLD.json>
//!   medie rules

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use medie_core::{AppConfig, Document, LoggingConfig, NerMethod};
use medie_extractor::metrics::{load_gold, Evaluator};
use medie_extractor::{Pipeline, PrecomputedEntities, RuleBasedRe};
use medie_graph::{entity_table, DotRenderer, GraphRenderer, MermaidRenderer};

#[derive(Parser, Debug)]
#[command(name = "medie")]
#[command(about = "Medical narrative entity and relation extraction")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Entity recognition method (gliner, standard)
    #[arg(long, global = true)]
    method: Option<NerMethod>,

    /// Proximity threshold in characters
    #[arg(long, global = true)]
    threshold: Option<usize>,

    /// Relation rule table (TOML)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract entities and relations from one narrative
    Process {
        /// Narrative text; read from --file or stdin when omitted
        text: Option<String>,

        /// Read the narrative from a file
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Use entities from a JSON file instead of running recognition
        #[arg(long)]
        entities: Option<PathBuf>,
    },
    /// Process one narrative per line, writing JSON lines
    Batch {
        /// Input file
        file: PathBuf,
    },
    /// Score extraction against a gold-annotated JSON file
    Evaluate {
        /// Gold samples
        gold: PathBuf,

        /// Match entities on exact span instead of text
        #[arg(long)]
        strict: bool,

        /// Print metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective relation rule table
    Rules,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Mermaid,
    Dot,
    Table,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Process {
            text,
            file,
            format,
            entities,
        } => {
            let text = read_input(text, file)?;
            let mut pipeline = Pipeline::from_config(&config)?;
            if let Some(path) = entities {
                let source = PrecomputedEntities::from_file(&path)
                    .with_context(|| format!("loading entities from {}", path.display()))?;
                pipeline = pipeline.with_entity_source(Box::new(source));
            }

            let document = pipeline.process(&text)?;
            println!("{}", render(&document, format)?);
        }
        Commands::Batch { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let pipeline = Arc::new(Pipeline::from_config(&config)?);
            run_batch(pipeline, &content).await?;
        }
        Commands::Evaluate { gold, strict, json } => {
            let samples = load_gold(&gold)?;
            let pipeline = Pipeline::from_config(&config)?;
            let evaluator = if strict {
                Evaluator::new().strict()
            } else {
                Evaluator::new()
            };

            let metrics = evaluator.evaluate_samples(&pipeline, &samples)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("{}", metrics.report());
            }
        }
        Commands::Rules => {
            let re = RuleBasedRe::from_config(&config.extraction)?;
            println!("{}", describe_rules(&re));
        }
    }

    Ok(())
}

/// File, then environment, then command-line flags
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(apply_flags(config, cli))
}

/// Command-line flags win over file and environment values
fn apply_flags(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(method) = cli.method {
        config.ner.method = method;
    }
    if let Some(threshold) = cli.threshold {
        config.extraction.char_threshold = threshold;
    }
    if let Some(rules) = &cli.rules {
        config.extraction.rules_path = Some(rules.clone());
    }
    config
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()));
    }

    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}

fn render(document: &Document, format: OutputFormat) -> anyhow::Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(document)?,
        OutputFormat::Mermaid => MermaidRenderer.render(document.entities(), document.relations()),
        OutputFormat::Dot => DotRenderer.render(document.entities(), document.relations()),
        OutputFormat::Table => {
            let mut out = entity_table(document.entities());
            out.push_str("\n\nRelations:");
            for triple in document.triples() {
                out.push_str(&format!(
                    "\n  {} -[{}]-> {}",
                    triple.subject, triple.predicate, triple.object
                ));
            }
            out
        }
    };
    Ok(out)
}

/// Process non-blank lines concurrently, printing results in input order
async fn run_batch(pipeline: Arc<Pipeline>, content: &str) -> anyhow::Result<()> {
    let handles: Vec<_> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let pipeline = Arc::clone(&pipeline);
            let line = line.to_string();
            (idx + 1, tokio::task::spawn_blocking(move || pipeline.process(&line)))
        })
        .collect();

    let total = handles.len();
    let mut failed = 0;
    for (line_no, handle) in handles {
        let record = match handle.await? {
            Ok(document) => serde_json::to_value(&document)?,
            Err(e) => {
                failed += 1;
                warn!(line = line_no, error = %e, "Narrative failed");
                json!({ "line": line_no, "error": e.to_string() })
            }
        };
        println!("{}", serde_json::to_string(&record)?);
    }

    info!(total, failed, "Batch finished");
    Ok(())
}

fn describe_rules(re: &RuleBasedRe) -> String {
    let mut lines = vec![format!("char_threshold = {}", re.char_threshold())];
    for rule in re.rules() {
        let join = |labels: &[medie_core::EntityLabel]| {
            labels
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        lines.push(format!(
            "{}: [{}] -> [{}] keywords: {}",
            rule.relation_type,
            join(&rule.source_types),
            join(&rule.target_types),
            rule.keywords.join(", ")
        ));
    }
    lines.join("\n")
}
